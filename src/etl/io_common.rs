// Primitives shared by the readers and writers.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::etl::*;

/// The VILLCODE field of the JSON files: a single code, or the list of
/// codes of a village that was split or merged.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VillCodeField {
    One(String),
    Many(Vec<String>),
}

impl VillCodeField {
    /// The non-empty codes, the representative one first.
    pub fn codes(&self) -> Vec<String> {
        let all: Vec<String> = match self {
            VillCodeField::One(s) => vec![s.trim().to_string()],
            VillCodeField::Many(l) => l.iter().map(|s| s.trim().to_string()).collect(),
        };
        all.into_iter().filter(|s| !s.is_empty()).collect()
    }

    pub fn from_codes(codes: &[String]) -> VillCodeField {
        match codes {
            [one] => VillCodeField::One(one.clone()),
            _ => VillCodeField::Many(codes.to_vec()),
        }
    }
}

impl Default for VillCodeField {
    fn default() -> Self {
        VillCodeField::One(String::new())
    }
}

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> EtlResult<T> {
    let p = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: p.clone() })?;
    debug!("read_json: read {} bytes from {:?}", contents.len(), p);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: p })
}

pub fn to_pretty_json<T: Serialize>(value: &T) -> EtlResult<String> {
    serde_json::to_string_pretty(value).context(SerializingJsonSnafu {})
}

/// Writes the value as indented JSON, replacing the file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> EtlResult<()> {
    let js = to_pretty_json(value)?;
    fs::write(path, js).context(WritingFileSnafu {
        path: path.display().to_string(),
    })
}

pub fn ensure_dir(path: &Path) -> EtlResult<()> {
    fs::create_dir_all(path).context(WritingFileSnafu {
        path: path.display().to_string(),
    })
}

/// The files of a directory with the given extension, sorted by path.
pub fn list_files(dir: &Path, extension: &str) -> EtlResult<Vec<PathBuf>> {
    let p = dir.display().to_string();
    let mut res: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).context(ReadingDirectorySnafu { path: p.clone() })? {
        let entry = entry.context(ReadingDirectorySnafu { path: p.clone() })?;
        let path = entry.path();
        let matches = path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if path.is_file() && matches {
            res.push(path);
        }
    }
    res.sort();
    Ok(res)
}

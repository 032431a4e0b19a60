// The manual override file: the villages that an operator placed by hand,
// and the ones still waiting for a code.

use std::path::Path;

use cunli_linkage::{ManualOverride, UnresolvedVillage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::etl::io_common::{read_json, write_json, VillCodeField};
use crate::etl::*;

pub const BLANK_NOTE: &str = "Please fill VILLCODE manually";

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub cunli_key: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub village: String,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub villcode: VillCodeField,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_tried: Option<String>,
    /// Fields added by the operator, kept as they are.
    #[serde(flatten)]
    pub extra: JSMap<String, JSValue>,
}

impl OverrideEntry {
    /// A blank entry, to be filled by the operator.
    pub fn blank(u: &UnresolvedVillage) -> OverrideEntry {
        OverrideEntry {
            cunli_key: u.cunli_key.to_string(),
            district: u.cunli_key.district.clone(),
            village: u.cunli_key.village.clone(),
            county: u.county.clone(),
            villcode: VillCodeField::default(),
            note: Some(BLANK_NOTE.to_string()),
            key_tried: u.key_tried.as_ref().map(|k| k.to_string()),
            extra: JSMap::new(),
        }
    }

    pub fn is_filled(&self) -> bool {
        !self.villcode.codes().is_empty()
    }

    pub fn to_override(&self) -> Option<ManualOverride> {
        let codes = self.villcode.codes();
        if codes.is_empty() {
            return None;
        }
        Some(ManualOverride {
            cunli_key: self.cunli_key.clone(),
            codes,
            county: self.county.clone().unwrap_or_default(),
            district: self.district.clone(),
            village: self.village.clone(),
            note: self.note.clone(),
        })
    }
}

/// Reads the override file. A missing file means no override.
pub fn read_override_entries(path: &Path) -> EtlResult<Vec<OverrideEntry>> {
    if !path.exists() {
        info!("read_override_entries: no file at {:?}", path);
        return Ok(vec![]);
    }
    let entries: Vec<OverrideEntry> = read_json(path)?;
    info!(
        "read_override_entries: {} entries, {} filled",
        entries.len(),
        entries.iter().filter(|e| e.is_filled()).count()
    );
    Ok(entries)
}

pub fn manual_overrides(entries: &[OverrideEntry]) -> Vec<ManualOverride> {
    entries.iter().filter_map(|e| e.to_override()).collect()
}

/// The new content of the override file: the filled entries as they are,
/// then one blank entry per village still without a code. Blank entries of
/// the previous file are kept for the villages that are still unresolved.
///
/// A key filled more than once keeps its last entry, at the place of the
/// first one.
pub fn merge_override_entries(
    existing: &[OverrideEntry],
    unresolved: &[UnresolvedVillage],
) -> Vec<OverrideEntry> {
    let mut res: Vec<OverrideEntry> = Vec::new();
    for e in existing.iter().filter(|e| e.is_filled()) {
        match res.iter_mut().find(|r| r.cunli_key == e.cunli_key) {
            Some(r) => {
                warn!(
                    "merge_override_entries: {} filled more than once, keeping the last entry",
                    e.cunli_key
                );
                *r = e.clone();
            }
            None => res.push(e.clone()),
        }
    }
    for u in unresolved.iter() {
        let key = u.cunli_key.to_string();
        if res.iter().any(|e| e.cunli_key == key) {
            continue;
        }
        let entry = match existing.iter().find(|e| e.cunli_key == key) {
            Some(e) => e.clone(),
            None => {
                debug!("merge_override_entries: new blank entry {}", key);
                OverrideEntry::blank(u)
            }
        };
        res.push(entry);
    }
    res
}

pub fn write_override_entries(path: &Path, entries: &[OverrideEntry]) -> EtlResult<()> {
    info!(
        "write_override_entries: {} entries to {:?}",
        entries.len(),
        path
    );
    write_json(path, &entries)
}

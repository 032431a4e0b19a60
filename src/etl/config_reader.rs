use std::path::{Path, PathBuf};

use cunli_linkage::LinkageRules;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::args::PathArgs;
use crate::etl::io_common::read_json;
use crate::etl::*;

pub const DEFAULT_RAW_DIRECTORY: &str = "raw";
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "docs/cunli_json";
pub const DEFAULT_MANUAL_MAPPING: &str = "missing_villcode_mapping.json";
pub const DEFAULT_COMBINED_CSV: &str = "cunli_combined_results.csv";
pub const DEFAULT_INCUMBENT_GAP_CSV: &str = "kmt_winners_vote_gaps.csv";
pub const DEFAULT_OTHER_GAP_CSV: &str = "non_kmt_winners_vote_gaps.csv";
pub const DEFAULT_SPREADSHEET_PREFIX: &str = "表5-";

/// The configuration file. All the fields are optional.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(rename = "rawDirectory")]
    pub raw_directory: Option<String>,
    #[serde(rename = "basecodePath")]
    pub basecode_path: Option<String>,
    #[serde(rename = "manualMappingPath")]
    pub manual_mapping_path: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "electionPath")]
    pub election_path: Option<String>,
    #[serde(rename = "combinedCsvPath")]
    pub combined_csv_path: Option<String>,
    #[serde(rename = "incumbentGapCsvPath")]
    pub incumbent_gap_csv_path: Option<String>,
    #[serde(rename = "otherGapCsvPath")]
    pub other_gap_csv_path: Option<String>,
    #[serde(rename = "incumbentParty")]
    pub incumbent_party: Option<String>,
    #[serde(rename = "spreadsheetPrefix")]
    pub spreadsheet_prefix: Option<String>,
}

pub fn read_config(path: &Path) -> EtlResult<PipelineConfig> {
    let config: PipelineConfig = read_json(path)?;
    info!("read_config: {:?}: {:?}", path, config);
    Ok(config)
}

/// The settings of a run, once the command line, the configuration file
/// and the defaults are combined.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PipelineSettings {
    pub raw_directory: PathBuf,
    pub basecode_path: Option<PathBuf>,
    pub manual_mapping_path: PathBuf,
    pub output_directory: PathBuf,
    pub election_path: Option<PathBuf>,
    pub combined_csv_path: PathBuf,
    pub incumbent_gap_csv_path: PathBuf,
    pub other_gap_csv_path: PathBuf,
    pub incumbent_party: Option<String>,
    pub spreadsheet_prefix: String,
}

impl PipelineSettings {
    /// Command line first, then the configuration file (relative to
    /// `config_root`), then the defaults.
    pub fn resolve(
        args: &PathArgs,
        config: &PipelineConfig,
        config_root: Option<&Path>,
    ) -> PipelineSettings {
        let pick = |arg: &Option<String>, conf: &Option<String>| -> Option<PathBuf> {
            match (arg, conf) {
                (Some(a), _) => Some(PathBuf::from(a)),
                (None, Some(c)) => {
                    let p = PathBuf::from(c);
                    match config_root {
                        Some(root) if p.is_relative() => Some(root.join(p)),
                        _ => Some(p),
                    }
                }
                (None, None) => None,
            }
        };
        let res = PipelineSettings {
            raw_directory: pick(&args.raw_directory, &config.raw_directory)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RAW_DIRECTORY)),
            basecode_path: pick(&args.basecode, &config.basecode_path),
            manual_mapping_path: pick(&args.manual_mapping, &config.manual_mapping_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANUAL_MAPPING)),
            output_directory: pick(&args.output_directory, &config.output_directory)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIRECTORY)),
            election_path: pick(&args.election, &config.election_path),
            combined_csv_path: pick(&args.combined_csv, &config.combined_csv_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_COMBINED_CSV)),
            incumbent_gap_csv_path: pick(&args.incumbent_gap_csv, &config.incumbent_gap_csv_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INCUMBENT_GAP_CSV)),
            other_gap_csv_path: pick(&args.other_gap_csv, &config.other_gap_csv_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OTHER_GAP_CSV)),
            incumbent_party: args
                .incumbent_party
                .clone()
                .or_else(|| config.incumbent_party.clone()),
            spreadsheet_prefix: config
                .spreadsheet_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_SPREADSHEET_PREFIX.to_string()),
        };
        debug!("PipelineSettings::resolve: {:?}", res);
        res
    }

    pub fn rules(&self) -> LinkageRules {
        let mut rules = LinkageRules::recall_2025();
        if let Some(party) = &self.incumbent_party {
            rules.incumbent_party = party.clone();
        }
        rules
    }
}

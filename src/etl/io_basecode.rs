// Reader for the village boundaries file (GeoJSON), of which only the
// feature properties are used.

use std::path::Path;

use cunli_linkage::{CodeRegistry, LinkageRules, VillageCode};
use log::info;
use serde::{Deserialize, Serialize};

use crate::etl::io_common::read_json;
use crate::etl::*;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct BasecodeFile {
    features: Vec<Feature>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
struct FeatureProperties {
    #[serde(rename = "VILLCODE", default)]
    villcode: Option<String>,
    #[serde(rename = "COUNTYCODE", default)]
    county_code: Option<String>,
    #[serde(rename = "TOWNCODE", default)]
    town_code: Option<String>,
    #[serde(rename = "COUNTYNAME", default)]
    county_name: Option<String>,
    #[serde(rename = "TOWNNAME", default)]
    town_name: Option<String>,
    #[serde(rename = "VILLNAME", default)]
    village_name: Option<String>,
}

impl FeatureProperties {
    fn village_code(self) -> Option<VillageCode> {
        let village_name = self.village_name.filter(|s| !s.is_empty())?;
        Some(VillageCode {
            code: self.villcode.unwrap_or_default(),
            county_code: self.county_code.unwrap_or_default(),
            district_code: self.town_code.unwrap_or_default(),
            county_name: self.county_name.unwrap_or_default(),
            district_name: self.town_name.unwrap_or_default(),
            village_name,
        })
    }
}

/// Reads the reference registry. A missing file is an error: no code can be
/// resolved without it.
pub fn read_registry(path: &Path, rules: &LinkageRules) -> EtlResult<CodeRegistry> {
    info!("read_registry: reading {:?}", path);
    let bf: BasecodeFile = read_json(path)?;
    let num_features = bf.features.len();
    let codes: Vec<VillageCode> = bf
        .features
        .into_iter()
        .filter_map(|f| f.properties.village_code())
        .collect();
    info!(
        "read_registry: {} features, {} with a village",
        num_features,
        codes.len()
    );
    Ok(CodeRegistry::from_codes(codes, rules))
}

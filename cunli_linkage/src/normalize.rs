use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::*;

// `(臺北市第3選舉區)`, `(基隆市選舉區)`
static CASE_COUNTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]+)(市|縣)(?:第\d+)?選舉區\)").unwrap());

static MAYOR_CASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+市)第\d+屆市長(\w+)罷免案").unwrap());

static LEGISLATOR_CASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"第\d+屆立法委員\(([^)]+)\)(\w+)罷免案").unwrap());

static ELECTION_ZONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"第(\d+)選區").unwrap());

/// Replaces the enumerated county names by their canonical variant.
/// Other names pass through unchanged. Applying it twice gives the same
/// result as applying it once.
pub fn normalize_county(name: &str, rules: &LinkageRules) -> String {
    let mut res = name.to_string();
    for (from, to) in rules.county_variants.iter() {
        if res.contains(from.as_str()) {
            res = res.replace(from.as_str(), to.as_str());
        }
    }
    res
}

/// The canonical form of a key, used to compare keys coming from
/// different datasets: the county table is applied, then the registry
/// character variant on the county and district.
pub fn canonical_key(key: &VillageKey, rules: &LinkageRules) -> VillageKey {
    let (from, to) = &rules.registry_variant;
    VillageKey {
        county: normalize_county(&key.county, rules).replace(from.as_str(), to.as_str()),
        district: key.district.replace(from.as_str(), to.as_str()),
        village: key.village.clone(),
    }
}

/// Finds the county (or city) named in a recall case label, e.g.
/// `…(臺北市第3選舉區)…` gives `臺北市`. The result is not normalized.
pub fn county_from_case_label(label: &str, rules: &LinkageRules) -> Option<String> {
    if let Some(caps) = CASE_COUNTY_RE.captures(label) {
        return Some(format!("{}{}", &caps[1], &caps[2]));
    }
    let exception = rules
        .label_exceptions
        .iter()
        .find(|(fragment, _)| label.contains(fragment.as_str()))
        .map(|(_, county)| county.clone());
    if exception.is_none() {
        debug!("county_from_case_label: no county in {:?}", label);
    }
    exception
}

/// The four registry keys of a village: exact names, and the variant
/// substituted in the county and/or the district.
pub fn registry_keys(
    county: &str,
    district: &str,
    village: &str,
    rules: &LinkageRules,
) -> Vec<VillageKey> {
    let (from, to) = &rules.registry_variant;
    let county_v = county.replace(from.as_str(), to.as_str());
    let district_v = district.replace(from.as_str(), to.as_str());
    vec![
        VillageKey::new(county, district, village),
        VillageKey::new(&county_v, &district_v, village),
        VillageKey::new(&county_v, district, village),
        VillageKey::new(county, &district_v, village),
    ]
}

/// A short name for a recall case label, for display.
pub fn case_display_name(label: &str) -> String {
    let name = label.replace("各投開票所投開票結果表", "");
    let name = name.trim();
    if name.contains("屆市長") {
        if let Some(caps) = MAYOR_CASE_RE.captures(name) {
            return format!("{}市長{}罷免案", &caps[1], &caps[2]);
        }
    } else if let Some(caps) = LEGISLATOR_CASE_RE.captures(name) {
        return format!("立委{}罷免案({})", &caps[2], &caps[1]);
    }
    name.to_string()
}

/// The zone number of an election zone name such as `臺北市第03選區`.
pub fn election_zone_number(zone: &str) -> Option<u32> {
    ELECTION_ZONE_RE
        .captures(zone)
        .and_then(|caps| caps[1].parse::<u32>().ok())
}

/// Splits a compound location name of the election dataset
/// (`county + district + village`) into its parts.
///
/// The county ends at the only `縣`, or else at the first `市`. The
/// district ends at the first `區`, `鎮` or `鄉` (tried in that order).
/// Returns None when no suffix is found at either stage.
pub fn split_location_name(name: &str) -> Option<VillageKey> {
    let (county, remaining) = if name.matches('縣').count() == 1 {
        let (c, r) = name.split_once('縣')?;
        (format!("{}縣", c), r)
    } else {
        let (c, r) = name.split_once('市')?;
        (format!("{}市", c), r)
    };

    for suffix in ['區', '鎮', '鄉'] {
        if let Some((d, v)) = remaining.split_once(suffix) {
            return Some(VillageKey {
                county,
                district: format!("{}{}", d, suffix),
                village: v.to_string(),
            });
        }
    }
    debug!("split_location_name: no district suffix in {:?}", name);
    None
}

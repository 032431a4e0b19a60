// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The tallies of a single polling station, as read from one row of a
/// recall spreadsheet.
#[derive(PartialEq, Debug, Clone)]
pub struct PollingRecord {
    /// The label of the recall case, derived from the spreadsheet name.
    pub recall_case: String,
    /// The district (區/鎮/鄉/市) the station belongs to. Rows that appear
    /// before any district row have none and are not grouped.
    pub district: Option<String>,
    pub village: String,
    pub polling_station: String,
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub invalid_votes: u64,
    pub total_voters: u64,
    pub ballots_not_cast: u64,
    pub ballots_issued: u64,
    pub unused_ballots: u64,
    pub eligible_voters: u64,
    /// Turnout in percent, as printed in the source.
    pub turnout_rate: f64,
}

impl PollingRecord {
    pub(crate) fn swap_agree_disagree(&mut self) {
        std::mem::swap(&mut self.agree_votes, &mut self.disagree_votes);
    }
}

/// The grouping key of the recall data: the literal district and village
/// strings of the source spreadsheets.
///
/// Its string form `district_village` is also the key of the manual
/// override file.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct CunliKey {
    pub district: String,
    pub village: String,
}

impl CunliKey {
    pub fn new(district: &str, village: &str) -> CunliKey {
        CunliKey {
            district: district.to_string(),
            village: village.to_string(),
        }
    }

    /// Parses the `district_village` form. Only the first two parts are
    /// significant.
    pub fn parse(s: &str) -> Option<CunliKey> {
        let mut parts = s.split('_');
        match (parts.next(), parts.next()) {
            (Some(d), Some(v)) if !d.is_empty() && !v.is_empty() => Some(CunliKey::new(d, v)),
            _ => None,
        }
    }
}

impl Display for CunliKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.district, self.village)
    }
}

/// A (county, district, village) name tuple, the key of the reference
/// registry and of the election dataset.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct VillageKey {
    pub county: String,
    pub district: String,
    pub village: String,
}

impl VillageKey {
    pub fn new(county: &str, district: &str, village: &str) -> VillageKey {
        VillageKey {
            county: county.to_string(),
            district: district.to_string(),
            village: village.to_string(),
        }
    }
}

impl Display for VillageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.county, self.district, self.village)
    }
}

/// An authoritative village identifier (VILLCODE) with the names and
/// parent codes the registry attaches to it.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VillageCode {
    pub code: String,
    pub county_code: String,
    pub district_code: String,
    pub county_name: String,
    pub district_name: String,
    pub village_name: String,
}

impl VillageCode {
    pub fn key(&self) -> VillageKey {
        VillageKey::new(&self.county_name, &self.district_name, &self.village_name)
    }
}

/// An operator-provided code for a village that automatic resolution
/// could not handle.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ManualOverride {
    /// The `district_village` key of the recall data.
    pub cunli_key: String,
    /// The forced codes. More than one code means that the village was
    /// split or merged administratively. The first code is the
    /// representative one.
    pub codes: Vec<String>,
    pub county: String,
    pub district: String,
    pub village: String,
    pub note: Option<String>,
}

// ******** Output data structures *********

/// Summed tallies of a group of polling records.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct VoteTotals {
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub invalid_votes: u64,
    pub total_voters: u64,
    pub ballots_not_cast: u64,
    pub ballots_issued: u64,
    pub unused_ballots: u64,
    pub eligible_voters: u64,
    /// total_voters / eligible_voters in percent, 2 decimals. 0.0 when
    /// there are no eligible voters.
    pub average_turnout_rate: f64,
}

impl VoteTotals {
    pub fn from_records<'a, I>(records: I) -> VoteTotals
    where
        I: IntoIterator<Item = &'a PollingRecord>,
    {
        let mut t = VoteTotals::default();
        for r in records {
            t.agree_votes += r.agree_votes;
            t.disagree_votes += r.disagree_votes;
            t.valid_votes += r.valid_votes;
            t.invalid_votes += r.invalid_votes;
            t.total_voters += r.total_voters;
            t.ballots_not_cast += r.ballots_not_cast;
            t.ballots_issued += r.ballots_issued;
            t.unused_ballots += r.unused_ballots;
            t.eligible_voters += r.eligible_voters;
        }
        t.average_turnout_rate = percentage(t.total_voters, t.eligible_voters);
        t
    }

    pub(crate) fn swap_agree_disagree(&mut self) {
        std::mem::swap(&mut self.agree_votes, &mut self.disagree_votes);
    }
}

/// numerator / denominator * 100, rounded to 2 decimal places.
/// A zero denominator gives 0.0.
pub fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let p = (numerator as f64) / (denominator as f64) * 100.0;
    (p * 100.0).round() / 100.0
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CodeSource {
    /// Forced by the manual override table.
    Manual,
    /// Found in the reference registry.
    Registry,
    /// Already present on a previously written record.
    Existing,
}

/// A village for which no code could be found.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UnresolvedVillage {
    pub cunli_key: CunliKey,
    /// The normalized county, if the recall case label named one.
    pub county: Option<String>,
    /// The registry key that was looked up, if any.
    pub key_tried: Option<VillageKey>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Resolution {
    /// No resolver was run for this village.
    NotAttempted,
    Resolved {
        code: VillageCode,
        /// All the codes associated with the village. Contains `code.code`
        /// first.
        associated: Vec<String>,
        source: CodeSource,
    },
    Unresolved(UnresolvedVillage),
}

impl Resolution {
    pub fn code(&self) -> Option<&VillageCode> {
        match self {
            Resolution::Resolved { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.code().is_some()
    }

    pub fn associated_codes(&self) -> &[String] {
        match self {
            Resolution::Resolved { associated, .. } => associated.as_slice(),
            _ => &[],
        }
    }
}

/// The recall results of one village, grouped from its polling records.
#[derive(PartialEq, Debug, Clone)]
pub struct AggregatedVillage {
    pub key: CunliKey,
    /// The normalized county named by the first record's recall case.
    pub county: Option<String>,
    pub resolution: Resolution,
    pub sums: VoteTotals,
    pub records: Vec<PollingRecord>,
    /// The note of the swap correction, when one was applied.
    pub correction: Option<String>,
}

impl AggregatedVillage {
    /// The distinct recall case labels, in record order.
    pub fn recall_cases(&self) -> Vec<&str> {
        let mut res: Vec<&str> = Vec::new();
        for r in self.records.iter() {
            if !res.contains(&r.recall_case.as_str()) {
                res.push(r.recall_case.as_str());
            }
        }
        res
    }

    /// The file identifier: the representative code when resolved,
    /// otherwise the raw `district_village` key.
    pub fn identifier(&self) -> String {
        match self.resolution.code() {
            Some(c) => c.code.clone(),
            None => self.key.to_string(),
        }
    }
}

/// Summary statistics of a single recall case over all its records.
#[derive(PartialEq, Debug, Clone)]
pub struct CaseSummary {
    pub label: String,
    pub display_name: String,
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub total_voters: u64,
    pub eligible_voters: u64,
    pub polling_stations: usize,
    pub villages: usize,
    pub districts: usize,
    pub village_codes: Vec<String>,
    pub cunli_keys: Vec<String>,
    pub agree_percentage: f64,
    pub disagree_percentage: f64,
    pub turnout_rate: f64,
}

/// Configuration errors. Data problems are never reported through this
/// type.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LinkageError {
    /// A manual override without any code.
    EmptyOverride(String),
}

impl Error for LinkageError {}

impl Display for LinkageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkageError::EmptyOverride(k) => write!(f, "manual override {} has no code", k),
        }
    }
}

// ********* Configuration **********

/// A known source error: the agree and disagree columns of one village
/// were swapped in the published spreadsheets.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SwapCorrection {
    pub code: String,
    /// The `district_village` key, used before a code is known.
    pub cunli_key: String,
    pub note: String,
}

/// How to pick the records of a village that belong to one election zone
/// when the village is covered by several recall cases.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CaseSelector {
    /// Keep the records whose case label contains the given text.
    LabelContains(String),
    /// The zone number `n` of the election zone (`…第0n選區`) must appear
    /// in the case label as `{label_prefix}第{n}選舉區`.
    ZoneNumber { label_prefix: String, max_zone: u32 },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ZoneRule {
    /// The county of the election entry, as printed in the election data.
    pub county: String,
    pub selector: CaseSelector,
}

#[derive(PartialEq, Debug, Clone)]
pub struct LinkageRules {
    /// Whole-name county substitutions (traditional → simplified variant).
    pub county_variants: Vec<(String, String)>,
    /// The character variant expanded when registering registry keys.
    pub registry_variant: (String, String),
    /// Recall case labels that name their county without the
    /// parenthesised zone: (label fragment, county).
    pub label_exceptions: Vec<(String, String)>,
    pub corrections: Vec<SwapCorrection>,
    pub zone_rules: Vec<ZoneRule>,
    /// Winners of this party are compared with the disagree votes.
    pub incumbent_party: String,
}

impl LinkageRules {
    /// The rules of the 2025 recall votes.
    pub fn recall_2025() -> LinkageRules {
        let pairs = |xs: &[(&str, &str)]| -> Vec<(String, String)> {
            xs.iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect()
        };
        LinkageRules {
            county_variants: pairs(&[
                ("臺北市", "台北市"),
                ("臺中市", "台中市"),
                ("臺東縣", "台東縣"),
                ("臺南市", "台南市"),
            ]),
            registry_variant: ("臺".to_string(), "台".to_string()),
            label_exceptions: pairs(&[("新竹市第11屆市長", "新竹市")]),
            // Reported by UDN: https://udn.com/news/story/124323/8903780
            corrections: vec![SwapCorrection {
                code: "65000040036".to_string(),
                cunli_key: "永和區_光復里".to_string(),
                note: "新北市永和區光復里: agree and disagree votes swapped at the source".to_string(),
            }],
            zone_rules: vec![
                ZoneRule {
                    county: "新竹市".to_string(),
                    selector: CaseSelector::LabelContains("鄭正鈐罷免案".to_string()),
                },
                ZoneRule {
                    county: "基隆市".to_string(),
                    selector: CaseSelector::LabelContains("基隆市選舉區".to_string()),
                },
                ZoneRule {
                    county: "臺北市".to_string(),
                    selector: CaseSelector::ZoneNumber {
                        label_prefix: "臺北市".to_string(),
                        max_zone: 8,
                    },
                },
            ],
            incumbent_party: "中國國民黨".to_string(),
        }
    }

    /// The correction matching a code or, failing that, a raw cunli key.
    pub fn correction_for(&self, code: Option<&str>, cunli_key: &str) -> Option<&SwapCorrection> {
        self.corrections
            .iter()
            .find(|c| Some(c.code.as_str()) == code || c.cunli_key == cunli_key)
    }
}

impl Default for LinkageRules {
    fn default() -> Self {
        LinkageRules::recall_2025()
    }
}

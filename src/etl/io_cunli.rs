// The per-village JSON documents and the summary files written next to
// them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cunli_linkage::*;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::etl::io_common::*;
use crate::etl::*;

pub const SUMMARY_FILE: &str = "summary.json";
pub const CUNLI_SUMMARY_FILE: &str = "cunli_summary.json";
pub const RECALL_CASES_FILE: &str = "recall_cases.json";
pub const STILL_MISSING_FILE: &str = "villages_still_missing.json";

/// Files of the output directory that are not village documents.
const RESERVED_FILES: [&str; 5] = [
    SUMMARY_FILE,
    CUNLI_SUMMARY_FILE,
    RECALL_CASES_FILE,
    STILL_MISSING_FILE,
    "villages_without_villcode.json",
];

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RecordDoc {
    pub recall_case: String,
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
    pub turnout_rate: f64,
}

impl From<&PollingRecord> for RecordDoc {
    fn from(r: &PollingRecord) -> Self {
        RecordDoc {
            recall_case: r.recall_case.clone(),
            district: r.district.clone(),
            village: r.village.clone(),
            polling_station: r.polling_station.clone(),
            agree_votes: r.agree_votes,
            disagree_votes: r.disagree_votes,
            valid_votes: r.valid_votes,
            invalid_votes: r.invalid_votes,
            total_voters: r.total_voters,
            ballots_not_cast: r.ballots_not_cast,
            ballots_issued: r.ballots_issued,
            unused_ballots: r.unused_ballots,
            eligible_voters: r.eligible_voters,
            turnout_rate: r.turnout_rate,
        }
    }
}

impl From<&RecordDoc> for PollingRecord {
    fn from(r: &RecordDoc) -> Self {
        PollingRecord {
            recall_case: r.recall_case.clone(),
            district: r.district.clone(),
            village: r.village.clone(),
            polling_station: r.polling_station.clone(),
            agree_votes: r.agree_votes,
            disagree_votes: r.disagree_votes,
            valid_votes: r.valid_votes,
            invalid_votes: r.invalid_votes,
            total_voters: r.total_voters,
            ballots_not_cast: r.ballots_not_cast,
            ballots_issued: r.ballots_issued,
            unused_ballots: r.unused_ballots,
            eligible_voters: r.eligible_voters,
            turnout_rate: r.turnout_rate,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SumFields {
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub invalid_votes: u64,
    pub total_voters: u64,
    pub ballots_not_cast: u64,
    pub ballots_issued: u64,
    pub unused_ballots: u64,
    pub eligible_voters: u64,
    pub average_turnout_rate: f64,
}

impl From<&VoteTotals> for SumFields {
    fn from(t: &VoteTotals) -> Self {
        SumFields {
            agree_votes: t.agree_votes,
            disagree_votes: t.disagree_votes,
            valid_votes: t.valid_votes,
            invalid_votes: t.invalid_votes,
            total_voters: t.total_voters,
            ballots_not_cast: t.ballots_not_cast,
            ballots_issued: t.ballots_issued,
            unused_ballots: t.unused_ballots,
            eligible_voters: t.eligible_voters,
            average_turnout_rate: t.average_turnout_rate,
        }
    }
}

impl From<&SumFields> for VoteTotals {
    fn from(s: &SumFields) -> Self {
        VoteTotals {
            agree_votes: s.agree_votes,
            disagree_votes: s.disagree_votes,
            valid_votes: s.valid_votes,
            invalid_votes: s.invalid_votes,
            total_voters: s.total_voters,
            ballots_not_cast: s.ballots_not_cast,
            ballots_issued: s.ballots_issued,
            unused_ballots: s.unused_ballots,
            eligible_voters: s.eligible_voters,
            average_turnout_rate: s.average_turnout_rate,
        }
    }
}

/// The document of one village: `<VILLCODE>.json`, or `<cunli>.json` when
/// the village has no code.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CunliDocument {
    pub cunli: String,
    pub total_records: usize,
    pub sum_fields: SumFields,
    pub records: Vec<RecordDoc>,
    #[serde(rename = "VILLCODE", default, skip_serializing_if = "Option::is_none")]
    pub villcode: Option<VillCodeField>,
    #[serde(rename = "COUNTYCODE", default, skip_serializing_if = "Option::is_none")]
    pub county_code: Option<String>,
    #[serde(rename = "TOWNCODE", default, skip_serializing_if = "Option::is_none")]
    pub town_code: Option<String>,
    #[serde(rename = "COUNTYNAME", default, skip_serializing_if = "Option::is_none")]
    pub county_name: Option<String>,
    #[serde(rename = "TOWNNAME", default, skip_serializing_if = "Option::is_none")]
    pub town_name: Option<String>,
    #[serde(rename = "VILLNAME", default, skip_serializing_if = "Option::is_none")]
    pub village_name: Option<String>,
}

impl CunliDocument {
    pub fn from_village(v: &AggregatedVillage) -> CunliDocument {
        let mut doc = CunliDocument {
            cunli: v.key.to_string(),
            total_records: v.records.len(),
            sum_fields: SumFields::from(&v.sums),
            records: v.records.iter().map(RecordDoc::from).collect(),
            villcode: None,
            county_code: None,
            town_code: None,
            county_name: None,
            town_name: None,
            village_name: None,
        };
        if let Some(c) = v.resolution.code() {
            doc.villcode = Some(VillCodeField::from_codes(v.resolution.associated_codes()));
            doc.county_code = Some(c.county_code.clone());
            doc.town_code = Some(c.district_code.clone());
            doc.county_name = Some(c.county_name.clone());
            doc.town_name = Some(c.district_name.clone());
            doc.village_name = Some(c.village_name.clone());
        }
        doc
    }

    /// The village described by the document. The sums are the ones of the
    /// document: the correction, if any, was applied when it was written.
    ///
    /// Returns None when the cunli key cannot be read.
    pub fn to_village(&self, rules: &LinkageRules) -> Option<AggregatedVillage> {
        let key = CunliKey::parse(&self.cunli)?;
        let records: Vec<PollingRecord> = self.records.iter().map(PollingRecord::from).collect();
        let county = records
            .first()
            .and_then(|r| county_from_case_label(&r.recall_case, rules))
            .map(|c| normalize_county(&c, rules));
        let codes = self.villcode.as_ref().map(|f| f.codes()).unwrap_or_default();
        let resolution = match (codes.first(), &self.county_name, &self.town_name, &self.village_name) {
            (Some(code), Some(county_name), Some(town_name), Some(village_name)) => {
                Resolution::Resolved {
                    code: VillageCode {
                        code: code.clone(),
                        county_code: self.county_code.clone().unwrap_or_default(),
                        district_code: self.town_code.clone().unwrap_or_default(),
                        county_name: county_name.clone(),
                        district_name: town_name.clone(),
                        village_name: village_name.clone(),
                    },
                    associated: codes.clone(),
                    source: CodeSource::Existing,
                }
            }
            _ => Resolution::NotAttempted,
        };
        let correction = rules
            .correction_for(codes.first().map(|s| s.as_str()), &self.cunli)
            .map(|c| c.note.clone());
        Some(AggregatedVillage {
            key,
            county,
            resolution,
            sums: VoteTotals::from(&self.sum_fields),
            records,
            correction,
        })
    }

    pub fn has_code(&self) -> bool {
        self.villcode
            .as_ref()
            .map(|f| !f.codes().is_empty())
            .unwrap_or(false)
    }

    /// Adds the identifiers of the village where the document has none.
    /// Existing fields are never replaced.
    pub fn fill_missing(&mut self, v: &AggregatedVillage) {
        let fresh = CunliDocument::from_village(v);
        if self.villcode.is_none() {
            self.villcode = fresh.villcode;
        }
        self.county_code = self.county_code.take().or(fresh.county_code);
        self.town_code = self.town_code.take().or(fresh.town_code);
        self.county_name = self.county_name.take().or(fresh.county_name);
        self.town_name = self.town_name.take().or(fresh.town_name);
        self.village_name = self.village_name.take().or(fresh.village_name);
        // The records change only when the correction was applied just now.
        self.sum_fields = fresh.sum_fields;
        self.records = fresh.records;
    }
}

pub fn document_path(dir: &Path, v: &AggregatedVillage) -> PathBuf {
    dir.join(format!("{}.json", v.identifier()))
}

pub fn write_village_documents(dir: &Path, villages: &[AggregatedVillage]) -> EtlResult<usize> {
    ensure_dir(dir)?;
    for v in villages.iter() {
        let p = document_path(dir, v);
        debug!("write_village_documents: {:?}", p);
        write_json(&p, &CunliDocument::from_village(v))?;
    }
    info!(
        "write_village_documents: {} documents in {:?}",
        villages.len(),
        dir
    );
    Ok(villages.len())
}

/// Reads the village documents of a directory, sorted by file name.
/// Files that are not village documents are skipped with a warning.
pub fn read_village_documents(dir: &Path) -> EtlResult<Vec<(PathBuf, CunliDocument)>> {
    let mut res: Vec<(PathBuf, CunliDocument)> = Vec::new();
    for p in list_files(dir, "json")? {
        let name = simplify_file_name(&p);
        if RESERVED_FILES.contains(&name.as_str()) {
            continue;
        }
        match read_json::<CunliDocument>(&p) {
            Ok(doc) => res.push((p, doc)),
            Err(e) => warn!("read_village_documents: skipping {:?}: {}", name, e),
        }
    }
    info!("read_village_documents: {} documents in {:?}", res.len(), dir);
    Ok(res)
}

// ******** Summary files ********

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSummary {
    pub total_files_processed: usize,
    pub total_records: usize,
    pub total_cunli: usize,
    pub villcode_files: usize,
    pub file_naming: String,
    pub villcode_list: Vec<String>,
    pub cunli_list: Vec<String>,
    pub note: String,
    pub manual_mappings_applied: usize,
}

impl ExtractSummary {
    pub fn new(
        files: usize,
        records: usize,
        villages: &[AggregatedVillage],
        manual_mappings: usize,
    ) -> ExtractSummary {
        let mut villcode_list: Vec<String> = villages
            .iter()
            .flat_map(|v| v.resolution.associated_codes().iter().cloned())
            .collect();
        villcode_list.sort();
        let mut cunli_list: Vec<String> = villages.iter().map(|v| v.key.to_string()).collect();
        cunli_list.sort();
        ExtractSummary {
            total_files_processed: files,
            total_records: records,
            total_cunli: villages.len(),
            villcode_files: villcode_list.len(),
            file_naming: "VILLCODE (where available), cunli name (fallback)".to_string(),
            villcode_list,
            cunli_list,
            note: "Files are named using official Taiwan VILLCODE for precise geographic identification"
                .to_string(),
            manual_mappings_applied: manual_mappings,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BriefSums {
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub invalid_votes: u64,
    pub total_voters: u64,
    pub eligible_voters: u64,
    pub average_turnout_rate: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CunliSummaryEntry {
    pub cunli: String,
    pub district: String,
    pub village: String,
    pub county: Option<String>,
    pub total_records: usize,
    pub sum_fields: BriefSums,
}

/// The resolved villages only, keyed by their representative code.
pub fn cunli_summary(villages: &[AggregatedVillage]) -> BTreeMap<String, CunliSummaryEntry> {
    let mut res: BTreeMap<String, CunliSummaryEntry> = BTreeMap::new();
    for v in villages.iter() {
        if let Some(c) = v.resolution.code() {
            res.insert(
                c.code.clone(),
                CunliSummaryEntry {
                    cunli: v.key.to_string(),
                    district: v.key.district.clone(),
                    village: v.key.village.clone(),
                    county: v.county.clone(),
                    total_records: v.records.len(),
                    sum_fields: BriefSums {
                        agree_votes: v.sums.agree_votes,
                        disagree_votes: v.sums.disagree_votes,
                        valid_votes: v.sums.valid_votes,
                        invalid_votes: v.sums.invalid_votes,
                        total_voters: v.sums.total_voters,
                        eligible_voters: v.sums.eligible_voters,
                        average_turnout_rate: v.sums.average_turnout_rate,
                    },
                },
            );
        }
    }
    res
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CaseDetail {
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

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RecallCasesDoc {
    /// The display names, sorted.
    pub cases: Vec<String>,
    /// The labels, sorted.
    pub original_cases: Vec<String>,
    /// Display name to label.
    pub case_mapping: BTreeMap<String, String>,
    pub total_cases: usize,
    /// Keyed by display name.
    pub case_details: BTreeMap<String, CaseDetail>,
}

impl RecallCasesDoc {
    pub fn new(summaries: &[CaseSummary]) -> RecallCasesDoc {
        let mut cases: Vec<String> = summaries.iter().map(|s| s.display_name.clone()).collect();
        cases.sort();
        let mut original_cases: Vec<String> = summaries.iter().map(|s| s.label.clone()).collect();
        original_cases.sort();
        let mut case_mapping: BTreeMap<String, String> = BTreeMap::new();
        let mut case_details: BTreeMap<String, CaseDetail> = BTreeMap::new();
        for s in summaries.iter() {
            case_mapping.insert(s.display_name.clone(), s.label.clone());
            case_details.insert(
                s.display_name.clone(),
                CaseDetail {
                    agree_votes: s.agree_votes,
                    disagree_votes: s.disagree_votes,
                    valid_votes: s.valid_votes,
                    total_voters: s.total_voters,
                    eligible_voters: s.eligible_voters,
                    polling_stations: s.polling_stations,
                    villages: s.villages,
                    districts: s.districts,
                    village_codes: s.village_codes.clone(),
                    cunli_keys: s.cunli_keys.clone(),
                    agree_percentage: s.agree_percentage,
                    disagree_percentage: s.disagree_percentage,
                    turnout_rate: s.turnout_rate,
                },
            );
        }
        RecallCasesDoc {
            cases,
            original_cases,
            case_mapping,
            total_cases: summaries.len(),
            case_details,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MissingVillage {
    pub cunli: String,
    pub county: Option<String>,
    pub district: String,
    pub village: String,
    pub key_tried: Option<String>,
}

impl From<&UnresolvedVillage> for MissingVillage {
    fn from(u: &UnresolvedVillage) -> Self {
        MissingVillage {
            cunli: u.cunli_key.to_string(),
            county: u.county.clone(),
            district: u.cunli_key.district.clone(),
            village: u.cunli_key.village.clone(),
            key_tried: u.key_tried.as_ref().map(|k| k.to_string()),
        }
    }
}

pub fn write_still_missing(dir: &Path, unresolved: &[UnresolvedVillage]) -> EtlResult<()> {
    let missing: Vec<MissingVillage> = unresolved.iter().map(MissingVillage::from).collect();
    write_json(&dir.join(STILL_MISSING_FILE), &missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASE: &str = "第11屆立法委員(新北市第12選舉區)某某罷免案";

    fn record(agree: u64, disagree: u64) -> PollingRecord {
        PollingRecord {
            recall_case: CASE.to_string(),
            district: Some("永和區".to_string()),
            village: "光復里".to_string(),
            polling_station: "1".to_string(),
            agree_votes: agree,
            disagree_votes: disagree,
            valid_votes: agree + disagree,
            invalid_votes: 0,
            total_voters: agree + disagree,
            ballots_not_cast: 0,
            ballots_issued: agree + disagree,
            unused_ballots: 0,
            eligible_voters: 1000,
            turnout_rate: 0.0,
        }
    }

    fn registry(rules: &LinkageRules) -> CodeRegistry {
        CodeRegistry::from_codes(
            vec![VillageCode {
                code: "65000040036".to_string(),
                county_code: "65000".to_string(),
                district_code: "65000040".to_string(),
                county_name: "新北市".to_string(),
                district_name: "永和區".to_string(),
                village_name: "光復里".to_string(),
            }],
            rules,
        )
    }

    #[test]
    fn document_fields() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let resolver = Resolver::new(&rules, &reg, &[]).unwrap();
        let out = aggregate_cunli(&[record(10, 30)], Some(&resolver), &rules);
        let doc = CunliDocument::from_village(&out.villages[0]);
        let js = serde_json::to_value(&doc).unwrap();
        assert_eq!(js["cunli"], "永和區_光復里");
        assert_eq!(js["VILLCODE"], "65000040036");
        assert_eq!(js["TOWNCODE"], "65000040");
        // Corrected.
        assert_eq!(js["sum_fields"]["agree_votes"], 30);
        assert_eq!(js["records"][0]["agree_votes"], 30);

        // Without a code, the identifier fields are absent.
        let out = aggregate_cunli(&[record(10, 30)], None, &rules);
        let js = serde_json::to_value(CunliDocument::from_village(&out.villages[0])).unwrap();
        assert!(js.get("VILLCODE").is_none());
    }

    #[test]
    fn reading_back_does_not_correct_twice() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let resolver = Resolver::new(&rules, &reg, &[]).unwrap();
        let out = aggregate_cunli(&[record(10, 30)], Some(&resolver), &rules);
        let doc = CunliDocument::from_village(&out.villages[0]);
        let mut v = doc.to_village(&rules).unwrap();
        assert_eq!(v.sums.agree_votes, 30);
        assert!(v.correction.is_some());
        assert_eq!(v.resolution.code().unwrap().code, "65000040036");

        let again = resolver.resolve(&v.key, CASE);
        v.attach(again, &rules);
        assert_eq!(v.sums.agree_votes, 30);
        assert_eq!(v.records[0].agree_votes, 30);
    }

    #[test]
    fn fill_missing_keeps_existing_fields() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let resolver = Resolver::new(&rules, &reg, &[]).unwrap();
        let out = aggregate_cunli(&[record(10, 30)], Some(&resolver), &rules);
        let mut doc = CunliDocument {
            county_name: Some("新北市(舊)".to_string()),
            villcode: None,
            county_code: None,
            town_code: None,
            town_name: None,
            village_name: None,
            ..CunliDocument::from_village(&out.villages[0])
        };
        doc.fill_missing(&out.villages[0]);
        assert!(doc.has_code());
        assert_eq!(doc.county_name.as_deref(), Some("新北市(舊)"));
        assert_eq!(doc.town_name.as_deref(), Some("永和區"));
    }

    #[test]
    fn reads_documents_and_skips_summaries() {
        let rules = LinkageRules::recall_2025();
        let dir = tempfile::tempdir().unwrap();
        let out = aggregate_cunli(&[record(10, 30)], None, &rules);
        write_village_documents(dir.path(), &out.villages).unwrap();
        write_json(
            &dir.path().join(SUMMARY_FILE),
            &ExtractSummary::new(1, 1, &out.villages, 0),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let docs = read_village_documents(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(simplify_file_name(&docs[0].0), "永和區_光復里.json");
        assert_eq!(docs[0].1.cunli, "永和區_光復里");
    }

    #[test]
    fn summaries() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let resolver = Resolver::new(&rules, &reg, &[]).unwrap();
        let mut other = record(1, 2);
        other.village = "不存在里".to_string();
        let records = vec![record(10, 30), other];
        let out = aggregate_cunli(&records, Some(&resolver), &rules);

        let s = ExtractSummary::new(1, 2, &out.villages, 0);
        assert_eq!(s.total_cunli, 2);
        assert_eq!(s.villcode_list, vec!["65000040036".to_string()]);
        assert_eq!(
            s.cunli_list,
            vec!["永和區_不存在里".to_string(), "永和區_光復里".to_string()]
        );

        let cs = cunli_summary(&out.villages);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs["65000040036"].county.as_deref(), Some("新北市"));

        let cases = RecallCasesDoc::new(&summarize_recall_cases(&records, Some(&resolver)));
        assert_eq!(cases.total_cases, 1);
        assert_eq!(cases.cases, vec!["立委某某罷免案(新北市第12選舉區)".to_string()]);
        assert_eq!(
            cases.case_mapping["立委某某罷免案(新北市第12選舉區)"],
            CASE.to_string()
        );

        let missing: Vec<MissingVillage> = out.unresolved.iter().map(MissingVillage::from).collect();
        assert_eq!(missing[0].key_tried.as_deref(), Some("新北市_永和區_不存在里"));
    }
}

use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};

use crate::config::*;
use crate::normalize::*;
use crate::resolve::Resolver;

/// The result of aggregating a batch of polling records.
#[derive(PartialEq, Debug, Clone)]
pub struct AggregationOutcome {
    /// One entry per village, in order of first appearance.
    pub villages: Vec<AggregatedVillage>,
    /// The villages the resolver could not place, in the same order.
    pub unresolved: Vec<UnresolvedVillage>,
    /// Records without a district, which could not be grouped.
    pub ungrouped_records: usize,
}

/// Groups records by their literal (district, village) strings, keeping
/// the order of first appearance and the order of the records inside
/// each group.
pub fn group_by_cunli(records: &[PollingRecord]) -> (Vec<(CunliKey, Vec<PollingRecord>)>, usize) {
    let mut groups: Vec<(CunliKey, Vec<PollingRecord>)> = Vec::new();
    let mut index: HashMap<CunliKey, usize> = HashMap::new();
    let mut ungrouped: usize = 0;
    for r in records.iter() {
        let district = match r.district.as_deref() {
            Some(d) if !d.is_empty() && !r.village.is_empty() => d,
            _ => {
                ungrouped += 1;
                continue;
            }
        };
        let key = CunliKey::new(district, &r.village);
        match index.get(&key) {
            Some(idx) => groups[*idx].1.push(r.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![r.clone()]));
            }
        }
    }
    (groups, ungrouped)
}

/// Groups the records by village, sums them and attaches the resolver's
/// answer. Without a resolver, the villages stay `NotAttempted`.
pub fn aggregate_cunli(
    records: &[PollingRecord],
    resolver: Option<&Resolver>,
    rules: &LinkageRules,
) -> AggregationOutcome {
    let (groups, ungrouped) = group_by_cunli(records);
    info!(
        "aggregate_cunli: {} records in {} villages ({} without district)",
        records.len(),
        groups.len(),
        ungrouped
    );

    let mut villages: Vec<AggregatedVillage> = Vec::new();
    let mut unresolved: Vec<UnresolvedVillage> = Vec::new();
    for (key, group) in groups {
        let first_case = group
            .first()
            .map(|r| r.recall_case.clone())
            .unwrap_or_default();
        let county = county_from_case_label(&first_case, rules).map(|c| normalize_county(&c, rules));
        let resolution = match resolver {
            Some(res) => res.resolve(&key, &first_case),
            None => Resolution::NotAttempted,
        };
        if let Resolution::Unresolved(u) = &resolution {
            unresolved.push(u.clone());
        }
        let mut v = AggregatedVillage {
            key,
            county,
            resolution: Resolution::NotAttempted,
            sums: VoteTotals::from_records(group.iter()),
            records: group,
            correction: None,
        };
        v.attach(resolution, rules);
        villages.push(v);
    }
    if !unresolved.is_empty() {
        warn!(
            "aggregate_cunli: {} villages without a code",
            unresolved.len()
        );
    }
    AggregationOutcome {
        villages,
        unresolved,
        ungrouped_records: ungrouped,
    }
}

impl AggregatedVillage {
    /// Attaches a resolution to the village. A code that is already
    /// present is never replaced. The swap correction is applied at most
    /// once, as soon as either the code or the raw key matches.
    pub fn attach(&mut self, resolution: Resolution, rules: &LinkageRules) {
        if !self.resolution.is_resolved() {
            self.resolution = resolution;
        } else if resolution.code().map(|c| &c.code) != self.resolution.code().map(|c| &c.code) {
            debug!(
                "attach: {}: keeping existing code {:?}",
                self.key,
                self.resolution.code().map(|c| &c.code)
            );
        }
        self.apply_correction(rules);
    }

    fn apply_correction(&mut self, rules: &LinkageRules) {
        if self.correction.is_some() {
            return;
        }
        let code = self.resolution.code().map(|c| c.code.clone());
        if let Some(c) = rules.correction_for(code.as_deref(), &self.key.to_string()) {
            info!("Applying data correction for {} ({})", self.key, c.note);
            self.sums.swap_agree_disagree();
            for r in self.records.iter_mut() {
                r.swap_agree_disagree();
            }
            self.correction = Some(c.note.clone());
        }
    }
}

/// Per-case statistics over the raw records.
///
/// The records are taken as extracted: no correction applies here.
pub fn summarize_recall_cases(
    records: &[PollingRecord],
    resolver: Option<&Resolver>,
) -> Vec<CaseSummary> {
    let labels: BTreeSet<&str> = records.iter().map(|r| r.recall_case.as_str()).collect();
    let mut res: Vec<CaseSummary> = Vec::new();
    for label in labels {
        let case_records: Vec<&PollingRecord> = records
            .iter()
            .filter(|r| r.recall_case == label)
            .collect();
        let keys: BTreeSet<CunliKey> = case_records
            .iter()
            .filter_map(|r| match r.district.as_deref() {
                Some(d) if !d.is_empty() && !r.village.is_empty() => Some(CunliKey::new(d, &r.village)),
                _ => None,
            })
            .collect();
        let districts: BTreeSet<&str> = keys.iter().map(|k| k.district.as_str()).collect();
        let mut codes: BTreeSet<String> = BTreeSet::new();
        if let Some(resolver) = resolver {
            // One lookup per village, not per polling station.
            for key in keys.iter() {
                let resolution = resolver.resolve(key, label);
                codes.extend(resolution.associated_codes().iter().cloned());
            }
        }
        let villages: BTreeSet<String> = keys.iter().map(|k| k.to_string()).collect();
        let t = VoteTotals::from_records(case_records.iter().copied());
        res.push(CaseSummary {
            label: label.to_string(),
            display_name: case_display_name(label),
            agree_votes: t.agree_votes,
            disagree_votes: t.disagree_votes,
            valid_votes: t.valid_votes,
            total_voters: t.total_voters,
            eligible_voters: t.eligible_voters,
            polling_stations: case_records.len(),
            villages: villages.len(),
            districts: districts.len(),
            village_codes: codes.into_iter().collect(),
            cunli_keys: villages.into_iter().collect(),
            agree_percentage: percentage(t.agree_votes, t.valid_votes),
            disagree_percentage: percentage(t.disagree_votes, t.valid_votes),
            turnout_rate: t.average_turnout_rate,
        });
    }
    res
}

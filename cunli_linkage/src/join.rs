use log::{debug, info, warn};
use std::collections::HashMap;

use crate::config::*;
use crate::normalize::*;

/// The votes of one candidate in one village.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateVotes {
    /// The ballot number.
    pub number: String,
    pub name: String,
    pub party: String,
    pub votes: u64,
}

/// One village of the legislative election results.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionEntry {
    /// The key of the entry in the election dataset.
    pub id: String,
    /// The compound location name, `county + district + village`.
    pub name: String,
    pub zone: String,
    pub zone_code: String,
    pub total_votes: u64,
    pub eligible_voters: u64,
    /// In ballot order.
    pub candidates: Vec<CandidateVotes>,
}

/// The recall tallies attached to a joined village.
#[derive(PartialEq, Debug, Clone)]
pub struct RecallTotals {
    pub agree_votes: u64,
    pub disagree_votes: u64,
    pub valid_votes: u64,
    pub invalid_votes: u64,
    pub eligible_voters: u64,
    pub turnout_rate: f64,
    pub recall_case: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct JoinedResult {
    pub code: VillageCode,
    pub election_zone: String,
    pub election_zone_code: String,
    pub total_election_votes: u64,
    pub eligible_voters_election: u64,
    pub winner: Option<CandidateVotes>,
    pub recall: RecallTotals,
    pub candidates: Vec<CandidateVotes>,
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct JoinOutcome {
    /// In the order of the election entries.
    pub results: Vec<JoinedResult>,
    /// Entries whose location name could not be split.
    pub unparsed: Vec<String>,
    /// Entries without a matching recall village.
    pub unmatched: usize,
}

/// The candidate with the strictly greatest number of votes. On a tie,
/// the first candidate in the list wins. A candidate needs at least one
/// vote to win.
pub fn select_winner(candidates: &[CandidateVotes]) -> Option<&CandidateVotes> {
    let mut winner: Option<&CandidateVotes> = None;
    for c in candidates.iter() {
        let best = winner.map(|w| w.votes).unwrap_or(0);
        if c.votes > best {
            winner = Some(c);
        }
    }
    winner
}

/// For a village covered by several recall cases, the records of the
/// case that matches the election zone.
///
/// Returns None when the village has a single case, when the county has
/// no rule, or when the rule matches nothing.
pub fn select_case_records<'a>(
    village: &'a AggregatedVillage,
    county: &str,
    election_zone: &str,
    rules: &LinkageRules,
) -> Option<Vec<&'a PollingRecord>> {
    if village.recall_cases().len() <= 1 {
        return None;
    }
    let county_c = normalize_county(county, rules);
    let rule = rules
        .zone_rules
        .iter()
        .find(|r| normalize_county(&r.county, rules) == county_c)?;

    let matched: Vec<&PollingRecord> = match &rule.selector {
        CaseSelector::LabelContains(text) => village
            .records
            .iter()
            .filter(|r| r.recall_case.contains(text.as_str()))
            .collect(),
        CaseSelector::ZoneNumber {
            label_prefix,
            max_zone,
        } => match election_zone_number(election_zone) {
            Some(n) if (1..=*max_zone).contains(&n) => {
                let pattern = format!("{}第{}選舉區", label_prefix, n);
                village
                    .records
                    .iter()
                    .filter(|r| r.recall_case.contains(pattern.as_str()))
                    .collect()
            }
            _ => vec![],
        },
    };
    debug!(
        "select_case_records: {} zone {:?}: {} of {} records",
        village.key,
        election_zone,
        matched.len(),
        village.records.len()
    );
    if matched.is_empty() {
        None
    } else {
        Some(matched)
    }
}

fn recall_totals(
    village: &AggregatedVillage,
    county: &str,
    zone: &str,
    rules: &LinkageRules,
) -> RecallTotals {
    match select_case_records(village, county, zone, rules) {
        Some(records) => {
            let t = VoteTotals::from_records(records.iter().copied());
            RecallTotals {
                agree_votes: t.agree_votes,
                disagree_votes: t.disagree_votes,
                valid_votes: t.valid_votes,
                invalid_votes: t.invalid_votes,
                eligible_voters: t.eligible_voters,
                turnout_rate: t.average_turnout_rate,
                recall_case: records[0].recall_case.clone(),
            }
        }
        None => RecallTotals {
            agree_votes: village.sums.agree_votes,
            disagree_votes: village.sums.disagree_votes,
            valid_votes: village.sums.valid_votes,
            invalid_votes: village.sums.invalid_votes,
            eligible_voters: village.sums.eligible_voters,
            turnout_rate: village.sums.average_turnout_rate,
            recall_case: village
                .records
                .first()
                .map(|r| r.recall_case.clone())
                .unwrap_or_default(),
        },
    }
}

/// Inner join of the election entries with the resolved recall
/// villages, on the canonical (county, district, village) names of the
/// village codes.
pub fn join_election(
    villages: &[AggregatedVillage],
    entries: &[ElectionEntry],
    rules: &LinkageRules,
) -> JoinOutcome {
    let mut by_key: HashMap<VillageKey, &AggregatedVillage> = HashMap::new();
    for v in villages.iter() {
        if let Some(code) = v.resolution.code() {
            let k = canonical_key(&code.key(), rules);
            if by_key.contains_key(&k) {
                warn!("join_election: duplicate village {}, keeping the first one", k);
                continue;
            }
            by_key.insert(k, v);
        }
    }
    info!(
        "join_election: {} resolved villages, {} election entries",
        by_key.len(),
        entries.len()
    );

    let mut outcome = JoinOutcome::default();
    for e in entries.iter() {
        let key = match split_location_name(&e.name) {
            Some(k) => k,
            None => {
                outcome.unparsed.push(e.name.clone());
                continue;
            }
        };
        let village = match by_key.get(&canonical_key(&key, rules)) {
            Some(v) => *v,
            None => {
                outcome.unmatched += 1;
                continue;
            }
        };
        // Checked when building the index.
        let code = match village.resolution.code() {
            Some(c) => c.clone(),
            None => continue,
        };
        let recall = recall_totals(village, &key.county, &e.zone, rules);
        outcome.results.push(JoinedResult {
            code,
            election_zone: e.zone.clone(),
            election_zone_code: e.zone_code.clone(),
            total_election_votes: e.total_votes,
            eligible_voters_election: e.eligible_voters,
            winner: select_winner(&e.candidates).cloned(),
            recall,
            candidates: e.candidates.clone(),
        });
    }
    if !outcome.unparsed.is_empty() {
        warn!(
            "join_election: {} entries with an unrecognized location name",
            outcome.unparsed.len()
        );
    }
    info!(
        "join_election: {} joined, {} without recall data",
        outcome.results.len(),
        outcome.unmatched
    );
    outcome
}

use log::info;

use crate::config::LinkageRules;
use crate::join::JoinedResult;

/// The recall tally a winner's votes are compared with.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ComparedWith {
    /// For winners of the incumbent party: the votes against the recall.
    DisagreeVotes,
    /// For every other winner: the votes for the recall.
    AgreeVotes,
}

impl ComparedWith {
    pub fn column_name(&self) -> &'static str {
        match self {
            ComparedWith::DisagreeVotes => "recall_disagree_votes",
            ComparedWith::AgreeVotes => "recall_agree_votes",
        }
    }
}

/// The fields of a combined row that the gap analysis reads.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GapInput {
    pub code: String,
    pub county_name: String,
    pub district_name: String,
    pub village_name: String,
    pub election_zone: String,
    pub winner_name: String,
    pub winner_party: String,
    pub winner_votes: u64,
    pub recall_agree_votes: u64,
    pub recall_disagree_votes: u64,
    pub recall_valid_votes: u64,
    pub recall_eligible_voters: u64,
    pub eligible_voters_election: u64,
}

impl From<&JoinedResult> for GapInput {
    fn from(r: &JoinedResult) -> Self {
        GapInput {
            code: r.code.code.clone(),
            county_name: r.code.county_name.clone(),
            district_name: r.code.district_name.clone(),
            village_name: r.code.village_name.clone(),
            election_zone: r.election_zone.clone(),
            winner_name: r.winner.as_ref().map(|w| w.name.clone()).unwrap_or_default(),
            winner_party: r.winner.as_ref().map(|w| w.party.clone()).unwrap_or_default(),
            winner_votes: r.winner.as_ref().map(|w| w.votes).unwrap_or(0),
            recall_agree_votes: r.recall.agree_votes,
            recall_disagree_votes: r.recall.disagree_votes,
            recall_valid_votes: r.recall.valid_votes,
            recall_eligible_voters: r.recall.eligible_voters,
            eligible_voters_election: r.eligible_voters_election,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GapRow {
    pub input: GapInput,
    pub compared_with: ComparedWith,
    /// Winner votes minus the compared tally. Negative when the recall
    /// tally is larger.
    pub gap: i64,
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct GapStats {
    pub count: usize,
    pub largest: Option<i64>,
    pub smallest: Option<i64>,
    pub mean: Option<f64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct GapReport {
    /// Winners of the incumbent party, by decreasing gap.
    pub incumbent: Vec<GapRow>,
    /// All the other winners, by decreasing gap.
    pub others: Vec<GapRow>,
}

pub fn compute_gap(input: &GapInput, incumbent_party: &str) -> (ComparedWith, i64) {
    let winner = input.winner_votes as i64;
    if input.winner_party == incumbent_party {
        (
            ComparedWith::DisagreeVotes,
            winner - input.recall_disagree_votes as i64,
        )
    } else {
        (
            ComparedWith::AgreeVotes,
            winner - input.recall_agree_votes as i64,
        )
    }
}

/// Splits the rows by the winner's party and sorts each group by
/// decreasing gap. Rows with equal gaps keep their input order.
pub fn analyze_gaps(inputs: &[GapInput], rules: &LinkageRules) -> GapReport {
    let mut report = GapReport::default();
    for input in inputs.iter() {
        let (compared_with, gap) = compute_gap(input, &rules.incumbent_party);
        let row = GapRow {
            input: input.clone(),
            compared_with,
            gap,
        };
        match compared_with {
            ComparedWith::DisagreeVotes => report.incumbent.push(row),
            ComparedWith::AgreeVotes => report.others.push(row),
        }
    }
    report.incumbent.sort_by(|a, b| b.gap.cmp(&a.gap));
    report.others.sort_by(|a, b| b.gap.cmp(&a.gap));
    info!(
        "analyze_gaps: {} incumbent-party winners, {} others",
        report.incumbent.len(),
        report.others.len()
    );
    report
}

pub fn gap_stats(rows: &[GapRow]) -> GapStats {
    if rows.is_empty() {
        return GapStats::default();
    }
    let sum: i64 = rows.iter().map(|r| r.gap).sum();
    GapStats {
        count: rows.len(),
        largest: rows.iter().map(|r| r.gap).max(),
        smallest: rows.iter().map(|r| r.gap).min(),
        mean: Some(sum as f64 / rows.len() as f64),
    }
}

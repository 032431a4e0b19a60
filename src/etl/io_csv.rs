// CSV exports: the combined recall and election table, and the gap tables.

use std::path::Path;

use cunli_linkage::{GapInput, GapRow, JoinedResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::etl::*;

pub const COMBINED_BASE_COLUMNS: [&str; 18] = [
    "VILLCODE",
    "COUNTYNAME",
    "TOWNNAME",
    "VILLNAME",
    "election_zone",
    "election_zone_code",
    "total_election_votes",
    "eligible_voters_election",
    "winner_name",
    "winner_party",
    "winner_votes",
    "recall_agree_votes",
    "recall_disagree_votes",
    "recall_valid_votes",
    "recall_invalid_votes",
    "recall_eligible_voters",
    "recall_turnout_rate",
    "recall_case",
];

pub fn combined_header(num_candidates: usize) -> Vec<String> {
    let mut res: Vec<String> = COMBINED_BASE_COLUMNS.iter().map(|s| s.to_string()).collect();
    for i in 1..=num_candidates {
        for field in ["name", "party", "votes", "number"] {
            res.push(format!("candidate_{}_{}", i, field));
        }
    }
    res
}

fn combined_line(r: &JoinedResult, num_candidates: usize) -> Vec<String> {
    let (winner_name, winner_party, winner_votes) = match &r.winner {
        Some(w) => (w.name.clone(), w.party.clone(), w.votes.to_string()),
        None => (String::new(), String::new(), String::new()),
    };
    let mut line: Vec<String> = vec![
        r.code.code.clone(),
        r.code.county_name.clone(),
        r.code.district_name.clone(),
        r.code.village_name.clone(),
        r.election_zone.clone(),
        r.election_zone_code.clone(),
        r.total_election_votes.to_string(),
        r.eligible_voters_election.to_string(),
        winner_name,
        winner_party,
        winner_votes,
        r.recall.agree_votes.to_string(),
        r.recall.disagree_votes.to_string(),
        r.recall.valid_votes.to_string(),
        r.recall.invalid_votes.to_string(),
        r.recall.eligible_voters.to_string(),
        r.recall.turnout_rate.to_string(),
        r.recall.recall_case.clone(),
    ];
    for i in 0..num_candidates {
        match r.candidates.get(i) {
            Some(c) => {
                line.push(c.name.clone());
                line.push(c.party.clone());
                line.push(c.votes.to_string());
                line.push(c.number.clone());
            }
            None => line.extend(std::iter::repeat(String::new()).take(4)),
        }
    }
    line
}

pub fn write_combined(path: &Path, results: &[JoinedResult]) -> EtlResult<()> {
    let p = path.display().to_string();
    let num_candidates = results.iter().map(|r| r.candidates.len()).max().unwrap_or(0);
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path: p.clone() })?;
    wtr.write_record(combined_header(num_candidates))
        .context(CsvWriteSnafu { path: p.clone() })?;
    for r in results.iter() {
        wtr.write_record(combined_line(r, num_candidates))
            .context(CsvWriteSnafu { path: p.clone() })?;
    }
    wtr.flush().context(WritingFileSnafu { path: p.clone() })?;
    info!("write_combined: {} rows to {:?}", results.len(), p);
    Ok(())
}

/// The columns of the combined table that the gap analysis reads. The
/// other columns are ignored.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct CombinedLine {
    #[serde(rename = "VILLCODE")]
    villcode: String,
    #[serde(rename = "COUNTYNAME")]
    county_name: String,
    #[serde(rename = "TOWNNAME")]
    town_name: String,
    #[serde(rename = "VILLNAME")]
    village_name: String,
    election_zone: String,
    winner_name: String,
    winner_party: String,
    winner_votes: Option<u64>,
    recall_agree_votes: u64,
    recall_disagree_votes: u64,
    recall_valid_votes: u64,
    recall_eligible_voters: u64,
    eligible_voters_election: u64,
}

impl From<CombinedLine> for GapInput {
    fn from(l: CombinedLine) -> Self {
        GapInput {
            code: l.villcode,
            county_name: l.county_name,
            district_name: l.town_name,
            village_name: l.village_name,
            election_zone: l.election_zone,
            winner_name: l.winner_name,
            winner_party: l.winner_party,
            winner_votes: l.winner_votes.unwrap_or(0),
            recall_agree_votes: l.recall_agree_votes,
            recall_disagree_votes: l.recall_disagree_votes,
            recall_valid_votes: l.recall_valid_votes,
            recall_eligible_voters: l.recall_eligible_voters,
            eligible_voters_election: l.eligible_voters_election,
        }
    }
}

pub fn read_combined(path: &Path) -> EtlResult<Vec<GapInput>> {
    let p = path.display().to_string();
    let mut rdr = csv::Reader::from_path(path).context(CsvOpenSnafu { path: p.clone() })?;
    let mut res: Vec<GapInput> = Vec::new();
    for (idx, line_r) in rdr.deserialize::<CombinedLine>().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {
            path: p.clone(),
            lineno,
        })?;
        debug!("read_combined: {:?} {:?}", lineno, line.villcode);
        res.push(GapInput::from(line));
    }
    info!("read_combined: {} rows from {:?}", res.len(), p);
    Ok(res)
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct GapLine {
    #[serde(rename = "VILLCODE")]
    villcode: String,
    #[serde(rename = "COUNTYNAME")]
    county_name: String,
    #[serde(rename = "TOWNNAME")]
    town_name: String,
    #[serde(rename = "VILLNAME")]
    village_name: String,
    election_zone: String,
    winner_name: String,
    winner_party: String,
    winner_votes: u64,
    recall_agree_votes: u64,
    recall_disagree_votes: u64,
    compared_with: String,
    gap: i64,
    recall_valid_votes: u64,
    recall_eligible_voters: u64,
    eligible_voters_election: u64,
}

impl From<&GapRow> for GapLine {
    fn from(r: &GapRow) -> Self {
        let i = &r.input;
        GapLine {
            villcode: i.code.clone(),
            county_name: i.county_name.clone(),
            town_name: i.district_name.clone(),
            village_name: i.village_name.clone(),
            election_zone: i.election_zone.clone(),
            winner_name: i.winner_name.clone(),
            winner_party: i.winner_party.clone(),
            winner_votes: i.winner_votes,
            recall_agree_votes: i.recall_agree_votes,
            recall_disagree_votes: i.recall_disagree_votes,
            compared_with: r.compared_with.column_name().to_string(),
            gap: r.gap,
            recall_valid_votes: i.recall_valid_votes,
            recall_eligible_voters: i.recall_eligible_voters,
            eligible_voters_election: i.eligible_voters_election,
        }
    }
}

pub const GAP_COLUMNS: [&str; 15] = [
    "VILLCODE",
    "COUNTYNAME",
    "TOWNNAME",
    "VILLNAME",
    "election_zone",
    "winner_name",
    "winner_party",
    "winner_votes",
    "recall_agree_votes",
    "recall_disagree_votes",
    "compared_with",
    "gap",
    "recall_valid_votes",
    "recall_eligible_voters",
    "eligible_voters_election",
];

/// Writes a gap table. The header is written even when there is no row.
pub fn write_gaps(path: &Path, rows: &[GapRow]) -> EtlResult<()> {
    let p = path.display().to_string();
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .context(CsvWriteSnafu { path: p.clone() })?;
    wtr.write_record(GAP_COLUMNS)
        .context(CsvWriteSnafu { path: p.clone() })?;
    for r in rows.iter() {
        wtr.serialize(GapLine::from(r))
            .context(CsvWriteSnafu { path: p.clone() })?;
    }
    wtr.flush().context(WritingFileSnafu { path: p.clone() })?;
    info!("write_gaps: {} rows to {:?}", rows.len(), p);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(code: &str, winner: Option<CandidateVotes>, candidates: Vec<CandidateVotes>) -> JoinedResult {
        JoinedResult {
            code: VillageCode {
                code: code.to_string(),
                county_code: "63000".to_string(),
                district_code: "63000050".to_string(),
                county_name: "臺北市".to_string(),
                district_name: "中正區".to_string(),
                village_name: "建國里".to_string(),
            },
            election_zone: "臺北市第08選區".to_string(),
            election_zone_code: "z8".to_string(),
            total_election_votes: 900,
            eligible_voters_election: 1200,
            winner,
            recall: RecallTotals {
                agree_votes: 300,
                disagree_votes: 450,
                valid_votes: 750,
                invalid_votes: 5,
                eligible_voters: 1100,
                turnout_rate: 68.64,
                recall_case: "第11屆立法委員(臺北市第8選舉區)賴士葆罷免案".to_string(),
            },
            candidates,
        }
    }

    fn candidate(no: &str, party: &str, votes: u64) -> CandidateVotes {
        CandidateVotes {
            number: no.to_string(),
            name: format!("候選人{}", no),
            party: party.to_string(),
            votes,
        }
    }

    #[test]
    fn combined_header_columns() {
        let h = combined_header(2);
        assert_eq!(h.len(), 18 + 8);
        assert_eq!(h[18], "candidate_1_name");
        assert_eq!(h[21], "candidate_1_number");
        assert_eq!(h[25], "candidate_2_number");
    }

    #[test]
    fn combined_table_feeds_the_gap_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("combined.csv");
        let a = candidate("1", "中國國民黨", 500);
        let rows = vec![
            joined("63000050001", Some(a.clone()), vec![a, candidate("2", "民主進步黨", 400)]),
            joined("63000050002", None, vec![]),
        ];
        write_combined(&p, &rows).unwrap();

        let text = std::fs::read_to_string(&p).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("VILLCODE,COUNTYNAME,TOWNNAME,VILLNAME,election_zone"));
        assert!(lines[0].ends_with("candidate_2_votes,candidate_2_number"));
        assert!(lines[2].ends_with(",,,,,,,,"));

        let inputs = read_combined(&p).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].winner_votes, 500);
        assert_eq!(inputs[0].recall_disagree_votes, 450);
        assert_eq!(inputs[1].winner_party, "");
        assert_eq!(inputs[1].winner_votes, 0);
    }

    #[test]
    fn gap_table_columns() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("gaps.csv");
        let rules = LinkageRules::recall_2025();
        let a = candidate("1", "中國國民黨", 500);
        let inputs = vec![GapInput::from(&joined("63000050001", Some(a.clone()), vec![a]))];
        let report = analyze_gaps(&inputs, &rules);
        write_gaps(&p, &report.incumbent).unwrap();
        let text = std::fs::read_to_string(&p).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "VILLCODE,COUNTYNAME,TOWNNAME,VILLNAME,election_zone,winner_name,winner_party,\
             winner_votes,recall_agree_votes,recall_disagree_votes,compared_with,gap,\
             recall_valid_votes,recall_eligible_voters,eligible_voters_election"
        );
        assert!(lines[1].contains(",recall_disagree_votes,50,"));

        write_gaps(&p, &report.others).unwrap();
        let text = std::fs::read_to_string(&p).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("VILLCODE,COUNTYNAME"));
    }
}

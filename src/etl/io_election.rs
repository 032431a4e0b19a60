// Reader for the village results of the legislative election.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use cunli_linkage::{CandidateVotes, ElectionEntry};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use crate::etl::io_common::read_json;
use crate::etl::*;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct CandidateDoc {
    name: String,
    #[serde(default)]
    party: String,
    #[serde(default)]
    votes: u64,
    /// The ballot number, written as a number or a string.
    #[serde(default)]
    no: JSValue,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct ElectionDoc {
    name: String,
    #[serde(default)]
    zone: String,
    #[serde(rename = "zoneCode", default)]
    zone_code: String,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    votes_all: u64,
    #[serde(default)]
    votes: BTreeMap<String, CandidateDoc>,
}

fn ballot_number(no: &JSValue) -> String {
    match no {
        JSValue::String(s) => s.trim().to_string(),
        JSValue::Null => String::new(),
        x => x.to_string(),
    }
}

/// Ballot order: numeric ballot numbers first, in increasing order.
fn ballot_order(a: &(String, CandidateVotes), b: &(String, CandidateVotes)) -> Ordering {
    let na = a.1.number.parse::<u64>().ok();
    let nb = b.1.number.parse::<u64>().ok();
    match (na, nb) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.0.cmp(&b.0))
}

impl ElectionDoc {
    fn into_entry(self, id: String) -> ElectionEntry {
        let mut candidates: Vec<(String, CandidateVotes)> = self
            .votes
            .into_iter()
            .map(|(cid, c)| {
                (
                    cid,
                    CandidateVotes {
                        number: ballot_number(&c.no),
                        name: c.name,
                        party: c.party,
                        votes: c.votes,
                    },
                )
            })
            .collect();
        candidates.sort_by(ballot_order);
        ElectionEntry {
            id,
            name: self.name,
            zone: self.zone,
            zone_code: self.zone_code,
            total_votes: self.total,
            eligible_voters: self.votes_all,
            candidates: candidates.into_iter().map(|(_, c)| c).collect(),
        }
    }
}

/// Reads the election dataset. The entries come sorted by their key and
/// the candidates in ballot order.
pub fn read_election(path: &Path) -> EtlResult<Vec<ElectionEntry>> {
    let docs: BTreeMap<String, ElectionDoc> = read_json(path)?;
    let entries: Vec<ElectionEntry> = docs
        .into_iter()
        .map(|(id, doc)| doc.into_entry(id))
        .collect();
    info!("read_election: {} entries from {:?}", entries.len(), path);
    Ok(entries)
}

// Reader for the recall spreadsheets of the Central Election Commission.

use std::path::Path;

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use cunli_linkage::PollingRecord;
use log::{debug, info, warn};
use snafu::prelude::*;

use crate::etl::io_common::file_stem;
use crate::etl::*;

/// The first cell of the header row.
pub const HEADER_LABEL: &str = "行政區別";
/// The header row is looked for in the first rows only.
const HEADER_SEARCH_ROWS: usize = 10;
/// Number of rows between the header row and the first data row.
const DATA_OFFSET: usize = 5;

/// The label of the recall case: the name of the file without the
/// extension and the table prefix.
pub fn recall_case_label(path: &Path, prefix: &str) -> String {
    let stem = file_stem(path);
    if prefix.is_empty() {
        stem
    } else {
        stem.replace(prefix, "")
    }
}

pub fn read_recall_workbook(path: &Path, prefix: &str) -> EtlResult<Vec<PollingRecord>> {
    let p = path.display().to_string();
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path: p.clone() })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path: p.clone() })?
        .context(OpeningExcelSnafu { path: p.clone() })?;

    let label = recall_case_label(path, prefix);
    let rows = sheet_rows(&wrange);
    match parse_recall_rows(&rows, &label) {
        Some(records) => {
            info!("read_recall_workbook: {:?}: {} records", p, records.len());
            Ok(records)
        }
        None => {
            warn!("read_recall_workbook: could not find the header in {:?}", p);
            Ok(vec![])
        }
    }
}

/// The rows of the sheet, padded so that the indices are the ones of the
/// sheet and not of the used range.
fn sheet_rows(range: &Range<DataType>) -> Vec<Vec<DataType>> {
    let (row0, col0) = range.start().unwrap_or((0, 0));
    let mut res: Vec<Vec<DataType>> = vec![Vec::new(); row0 as usize];
    for row in range.rows() {
        let mut r: Vec<DataType> = vec![DataType::Empty; col0 as usize];
        r.extend(row.iter().cloned());
        res.push(r);
    }
    res
}

/// Reads the polling records of a sheet. Returns None when the header row
/// is missing.
///
/// Rows with a number that cannot be read are skipped.
pub fn parse_recall_rows(rows: &[Vec<DataType>], recall_case: &str) -> Option<Vec<PollingRecord>> {
    let header_idx = rows
        .iter()
        .take(HEADER_SEARCH_ROWS)
        .position(|r| read_text(r.first()).as_deref() == Some(HEADER_LABEL))?;
    debug!("parse_recall_rows: header at row {}", header_idx);

    let mut res: Vec<PollingRecord> = Vec::new();
    let mut current_district: Option<String> = None;
    for (idx, row) in rows.iter().enumerate().skip(header_idx + DATA_OFFSET) {
        let c0 = row.first();
        if is_present(c0) && !is_present(row.get(1)) {
            current_district = read_text(c0);
            continue;
        }
        if !(is_present(row.get(1)) && is_present(row.get(2))) {
            continue;
        }
        match read_record(row, recall_case, &current_district) {
            Some(r) => res.push(r),
            None => debug!("parse_recall_rows: skipping row {}: {:?}", idx, row),
        }
    }
    Some(res)
}

fn read_record(
    row: &[DataType],
    recall_case: &str,
    district: &Option<String>,
) -> Option<PollingRecord> {
    let count = |idx: usize| read_count(row.get(idx));
    Some(PollingRecord {
        recall_case: recall_case.to_string(),
        district: district.clone(),
        village: read_text(row.get(1))?,
        polling_station: read_text(row.get(2))?,
        agree_votes: count(3)?,
        disagree_votes: count(4)?,
        valid_votes: count(5)?,
        invalid_votes: count(6)?,
        total_voters: count(7)?,
        ballots_not_cast: count(8)?,
        ballots_issued: count(9)?,
        unused_ballots: count(10)?,
        eligible_voters: count(11)?,
        turnout_rate: read_rate(row.get(12))?,
    })
}

fn is_present(cell: Option<&DataType>) -> bool {
    !matches!(cell, None | Some(DataType::Empty))
}

fn read_text(cell: Option<&DataType>) -> Option<String> {
    match cell? {
        DataType::String(s) => Some(s.trim().to_string()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        DataType::Float(f) => Some(f.to_string()),
        DataType::Empty => None,
        x => Some(x.to_string().trim().to_string()),
    }
}

/// A vote count. Empty cells count as 0.
fn read_count(cell: Option<&DataType>) -> Option<u64> {
    match cell {
        None | Some(DataType::Empty) => Some(0),
        Some(DataType::Int(i)) if *i >= 0 => Some(*i as u64),
        Some(DataType::Float(f)) if f.is_finite() && *f >= 0.0 => Some(f.trunc() as u64),
        Some(DataType::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// A turnout, possibly written with a `%` suffix.
fn read_rate(cell: Option<&DataType>) -> Option<f64> {
    match cell {
        None | Some(DataType::Empty) => Some(0.0),
        Some(DataType::Float(f)) => Some(*f),
        Some(DataType::Int(i)) => Some(*i as f64),
        Some(DataType::String(s)) => s.replace('%', "").trim().parse::<f64>().ok(),
        _ => None,
    }
}

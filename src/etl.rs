use log::{debug, info, warn};

use cunli_linkage::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::etl::config_reader::*;
use crate::etl::io_basecode::read_registry;
use crate::etl::io_common::*;
use crate::etl::io_csv::*;
use crate::etl::io_cunli::*;
use crate::etl::io_election::read_election;
use crate::etl::io_overrides::*;
use crate::etl::io_recall::read_recall_workbook;

pub mod config_reader;
mod io_basecode;
mod io_common;
mod io_csv;
mod io_cunli;
mod io_election;
mod io_overrides;
mod io_recall;

#[derive(Debug, Snafu)]
pub enum EtlError {
    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Workbook {path} has no sheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Error reading {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading directory {path}"))]
    ReadingDirectory {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Invalid manual override file"))]
    Linkage { source: LinkageError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type EtlResult<T> = Result<T, EtlError>;
pub type BEtlResult<T> = Result<T, Box<EtlError>>;

fn required_path<'a>(p: &'a Option<PathBuf>, what: &str) -> EtlResult<&'a PathBuf> {
    match p {
        Some(x) => Ok(x),
        None => whatever!("No {} was provided (command line or configuration file)", what),
    }
}

/// Compares a computed summary with a reference file. Both sides go through
/// the same JSON printer so that only the content matters.
fn check_reference(computed: &JSValue, reference_path: &Path) -> EtlResult<()> {
    let reference: JSValue = read_json(reference_path)?;
    let pretty_ref = to_pretty_json(&reference)?;
    let pretty_computed = to_pretty_json(computed)?;
    if pretty_ref != pretty_computed {
        warn!("Found differences with the reference summary");
        print_diff(pretty_ref.as_str(), pretty_computed.as_str(), "\n");
        whatever!("Difference detected between calculated summary and reference summary")
    }
    info!("check_reference: summary matches {:?}", reference_path);
    Ok(())
}

fn read_all_records(raw_directory: &Path, prefix: &str) -> EtlResult<(usize, Vec<PollingRecord>)> {
    let files = list_files(raw_directory, "xlsx")?;
    info!("Found {} spreadsheets in {:?}", files.len(), raw_directory);
    let mut num_files: usize = 0;
    let mut records: Vec<PollingRecord> = Vec::new();
    for p in files.iter() {
        match read_recall_workbook(p, prefix) {
            Ok(mut rs) => {
                num_files += 1;
                records.append(&mut rs);
            }
            Err(e) => warn!("Skipping {:?}: {}", simplify_file_name(p), e),
        }
    }
    info!("Extracted {} records from {} files", records.len(), num_files);
    Ok((num_files, records))
}

/// Writes the village documents and the summary files of an extract run.
///
/// `num_mappings` is the number of villages of the override file that carry
/// a code, whether or not they appear in the records.
pub fn write_extract_outputs(
    dir: &Path,
    num_files: usize,
    records: &[PollingRecord],
    outcome: &AggregationOutcome,
    cases: &[CaseSummary],
    num_mappings: usize,
) -> EtlResult<ExtractSummary> {
    write_village_documents(dir, &outcome.villages)?;
    let summary = ExtractSummary::new(num_files, records.len(), &outcome.villages, num_mappings);
    write_json(&dir.join(SUMMARY_FILE), &summary)?;
    write_json(&dir.join(CUNLI_SUMMARY_FILE), &cunli_summary(&outcome.villages))?;
    write_json(&dir.join(RECALL_CASES_FILE), &RecallCasesDoc::new(cases))?;
    write_still_missing(dir, &outcome.unresolved)?;
    Ok(summary)
}

pub fn run_extract(settings: &PipelineSettings, reference: Option<&str>) -> BEtlResult<()> {
    let rules = settings.rules();
    let (num_files, records) =
        read_all_records(&settings.raw_directory, &settings.spreadsheet_prefix)?;

    let registry = match &settings.basecode_path {
        Some(p) => Some(read_registry(p, &rules)?),
        None => {
            warn!("No basecode file: the villages will not be resolved");
            None
        }
    };
    let entries = read_override_entries(&settings.manual_mapping_path)?;
    let overrides = manual_overrides(&entries);
    let num_mappings = overrides
        .iter()
        .map(|o| o.cunli_key.as_str())
        .collect::<BTreeSet<&str>>()
        .len();
    let resolver = match &registry {
        Some(reg) => Some(Resolver::new(&rules, reg, &overrides).context(LinkageSnafu)?),
        None => None,
    };

    let outcome = aggregate_cunli(&records, resolver.as_ref(), &rules);
    let cases = summarize_recall_cases(&records, resolver.as_ref());
    let summary = write_extract_outputs(
        &settings.output_directory,
        num_files,
        &records,
        &outcome,
        &cases,
        num_mappings,
    )?;
    info!(
        "extract: {} villages ({} codes, {} unresolved, {} records without district), {} recall cases",
        summary.total_cunli,
        summary.villcode_files,
        outcome.unresolved.len(),
        outcome.ungrouped_records,
        cases.len()
    );

    if resolver.is_some() {
        let merged = merge_override_entries(&entries, &outcome.unresolved);
        write_override_entries(&settings.manual_mapping_path, &merged)?;
    }

    if let Some(ref_p) = reference {
        let computed = serde_json::to_value(&summary).context(SerializingJsonSnafu {})?;
        check_reference(&computed, Path::new(ref_p))?;
    }
    Ok(())
}

/// Adds the codes to the village documents that have none. Documents with a
/// code are left untouched, so that running it twice changes nothing.
pub fn run_refresh_codes(settings: &PipelineSettings) -> BEtlResult<()> {
    let rules = settings.rules();
    let basecode = required_path(&settings.basecode_path, "basecode file")?;
    let registry = read_registry(basecode, &rules)?;
    let entries = read_override_entries(&settings.manual_mapping_path)?;
    let resolver = Resolver::new(&rules, &registry, &manual_overrides(&entries))
        .context(LinkageSnafu)?;

    let docs = read_village_documents(&settings.output_directory)?;
    let mut num_updated: usize = 0;
    let mut villages: Vec<AggregatedVillage> = Vec::new();
    let mut unresolved: Vec<UnresolvedVillage> = Vec::new();
    for (p, mut doc) in docs {
        let mut v = match doc.to_village(&rules) {
            Some(v) => v,
            None => {
                warn!("refresh_codes: cannot read the key {:?} of {:?}", doc.cunli, p);
                continue;
            }
        };
        if !doc.has_code() {
            let first_case = v
                .records
                .first()
                .map(|r| r.recall_case.clone())
                .unwrap_or_default();
            let resolution = resolver.resolve(&v.key, &first_case);
            if let Resolution::Unresolved(u) = &resolution {
                unresolved.push(u.clone());
            }
            v.attach(resolution, &rules);
            if v.resolution.is_resolved() {
                debug!("refresh_codes: {} -> {}", v.key, v.identifier());
                doc.fill_missing(&v);
                write_json(&p, &doc)?;
                num_updated += 1;
            }
        }
        villages.push(v);
    }
    write_json(
        &settings.output_directory.join(CUNLI_SUMMARY_FILE),
        &cunli_summary(&villages),
    )?;
    write_still_missing(&settings.output_directory, &unresolved)?;
    info!(
        "refresh_codes: {} documents, {} updated, {} still without code",
        villages.len(),
        num_updated,
        unresolved.len()
    );
    Ok(())
}

pub fn run_combine(settings: &PipelineSettings) -> BEtlResult<()> {
    let rules = settings.rules();
    let election_p = required_path(&settings.election_path, "election file")?;
    let entries = read_election(election_p)?;
    let villages: Vec<AggregatedVillage> = read_village_documents(&settings.output_directory)?
        .iter()
        .filter_map(|(_, doc)| doc.to_village(&rules))
        .collect();

    let outcome = join_election(&villages, &entries, &rules);
    if !outcome.unparsed.is_empty() {
        warn!(
            "combine: {} election entries with an unreadable name: {:?}",
            outcome.unparsed.len(),
            outcome.unparsed
        );
    }
    write_combined(&settings.combined_csv_path, &outcome.results)?;
    info!(
        "combine: {} joined rows, {} entries without recall data",
        outcome.results.len(),
        outcome.unmatched
    );
    Ok(())
}

fn print_gap_summary(title: &str, rows: &[GapRow]) {
    let stats = gap_stats(rows);
    println!("{}: {} villages", title, stats.count);
    if let (Some(largest), Some(smallest), Some(mean)) = (stats.largest, stats.smallest, stats.mean)
    {
        println!("  largest gap: {}", largest);
        println!("  smallest gap: {}", smallest);
        println!("  mean gap: {:.1}", mean);
        println!("  top 5:");
        for r in rows.iter().take(5) {
            let i = &r.input;
            println!(
                "    {} {}{}{} {} ({}): {}",
                i.code, i.county_name, i.district_name, i.village_name, i.winner_name, i.winner_party, r.gap
            );
        }
    }
}

pub fn run_gaps(settings: &PipelineSettings) -> BEtlResult<()> {
    let rules = settings.rules();
    let inputs = read_combined(&settings.combined_csv_path)?;
    let report = analyze_gaps(&inputs, &rules);
    write_gaps(&settings.incumbent_gap_csv_path, &report.incumbent)?;
    write_gaps(&settings.other_gap_csv_path, &report.others)?;
    info!(
        "gaps: {} rows, {} incumbent-party winners, {} others",
        inputs.len(),
        report.incumbent.len(),
        report.others.len()
    );
    print_gap_summary(
        &format!("Winners of {} (winner votes - disagree votes)", rules.incumbent_party),
        &report.incumbent,
    );
    print_gap_summary("Other winners (winner votes - agree votes)", &report.others);
    Ok(())
}

pub fn run_all(settings: &PipelineSettings, reference: Option<&str>) -> BEtlResult<()> {
    run_extract(settings, reference)?;
    run_combine(settings)?;
    run_gaps(settings)
}

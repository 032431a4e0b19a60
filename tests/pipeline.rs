use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value as JSValue};

const TP8: &str = "第11屆立法委員(臺北市第8選舉區)賴士葆罷免案";

fn cunli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cunli"))
        .args(args)
        .output()
        .unwrap()
}

fn assert_success(out: &Output) {
    assert!(
        out.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
}

fn write_json(path: &Path, js: &JSValue) {
    fs::write(path, serde_json::to_string_pretty(js).unwrap()).unwrap();
}

fn read_json(path: &Path) -> JSValue {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn record(village: &str, station: &str, agree: u64, disagree: u64) -> JSValue {
    json!({
        "recall_case": TP8,
        "district": "中正區",
        "village": village,
        "polling_station": station,
        "agree_votes": agree,
        "disagree_votes": disagree,
        "valid_votes": agree + disagree,
        "invalid_votes": 10,
        "total_voters": agree + disagree + 10,
        "ballots_not_cast": 0,
        "ballots_issued": agree + disagree + 10,
        "unused_ballots": 100,
        "eligible_voters": 11000,
        "turnout_rate": 60.0
    })
}

/// A village document as written by an extract run without a registry.
fn village_doc(village: &str, records: Vec<JSValue>) -> JSValue {
    let sum = |f: &str| -> u64 { records.iter().map(|r| r[f].as_u64().unwrap()).sum() };
    json!({
        "cunli": format!("中正區_{}", village),
        "total_records": records.len(),
        "sum_fields": {
            "agree_votes": sum("agree_votes"),
            "disagree_votes": sum("disagree_votes"),
            "valid_votes": sum("valid_votes"),
            "invalid_votes": sum("invalid_votes"),
            "total_voters": sum("total_voters"),
            "ballots_not_cast": sum("ballots_not_cast"),
            "ballots_issued": sum("ballots_issued"),
            "unused_ballots": sum("unused_ballots"),
            "eligible_voters": sum("eligible_voters"),
            "average_turnout_rate": 60.0
        },
        "records": records
    })
}

fn basecode() -> JSValue {
    json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {
                "VILLCODE": "63000050001", "COUNTYCODE": "63000", "TOWNCODE": "63000050",
                "COUNTYNAME": "臺北市", "TOWNNAME": "中正區", "VILLNAME": "建國里"}},
            {"type": "Feature", "properties": {
                "VILLCODE": "63000050002", "COUNTYCODE": "63000", "TOWNCODE": "63000050",
                "COUNTYNAME": "臺北市", "TOWNNAME": "中正區", "VILLNAME": "光復里"}},
            {"type": "Feature", "properties": {"VILLCODE": "x", "VILLNAME": null}}
        ]
    })
}

fn election() -> JSValue {
    json!({
        "63000050001": {
            "name": "臺北市中正區建國里", "zone": "臺北市第08選區", "zoneCode": "63000-08",
            "total": 8000, "votes_all": 12000,
            "votes": {
                "1": {"name": "賴士葆", "party": "中國國民黨", "votes": 5000, "no": 1},
                "2": {"name": "吳沛憶", "party": "民主進步黨", "votes": 3000, "no": 2}
            }
        },
        "63000050002": {
            "name": "臺北市中正區光復里", "zone": "臺北市第08選區", "zoneCode": "63000-08",
            "total": 900, "votes_all": 1500,
            "votes": {
                "1": {"name": "賴士葆", "party": "中國國民黨", "votes": 300, "no": 1},
                "2": {"name": "吳沛憶", "party": "民主進步黨", "votes": 600, "no": 2}
            }
        },
        "63000050003": {
            "name": "臺北市中正區無人里", "zone": "臺北市第08選區", "zoneCode": "63000-08",
            "total": 10, "votes_all": 20, "votes": {}
        }
    })
}

fn setup(root: &Path) -> String {
    fs::create_dir_all(root.join("raw")).unwrap();
    write_json(&root.join("basecode.json"), &basecode());
    write_json(&root.join("election.json"), &election());
    let config = root.join("config.json");
    write_json(
        &config,
        &json!({
            "rawDirectory": "raw",
            "basecodePath": "basecode.json",
            "manualMappingPath": "mapping.json",
            "outputDirectory": "out",
            "electionPath": "election.json",
            "combinedCsvPath": "combined.csv",
            "incumbentGapCsvPath": "kmt.csv",
            "otherGapCsvPath": "others.csv"
        }),
    );
    config.display().to_string()
}

#[test]
fn extract_without_spreadsheets() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let out = cunli(&["extract", "--config", &config]);
    assert_success(&out);

    let summary = read_json(&dir.path().join("out").join("summary.json"));
    assert_eq!(summary["total_files_processed"], json!(0));
    assert_eq!(summary["total_records"], json!(0));
    assert_eq!(summary["villcode_list"], json!([]));
    let cases = read_json(&dir.path().join("out").join("recall_cases.json"));
    assert_eq!(cases["total_cases"], json!(0));
    assert_eq!(read_json(&dir.path().join("mapping.json")), json!([]));

    // The same summary passes the reference check, a different one fails.
    let reference = dir.path().join("reference.json");
    write_json(&reference, &summary);
    let out = cunli(&["extract", "--config", &config, "--reference", &reference.display().to_string()]);
    assert_success(&out);
    let mut other = summary.clone();
    other["total_records"] = json!(12);
    write_json(&reference, &other);
    let out = cunli(&["extract", "--config", &config, "--reference", &reference.display().to_string()]);
    assert!(!out.status.success());
}

#[test]
fn unreadable_spreadsheet_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    fs::write(dir.path().join("raw").join("表5-x.xlsx"), "not a workbook").unwrap();
    let out = cunli(&["extract", "--config", &config]);
    assert_success(&out);
    let summary = read_json(&dir.path().join("out").join("summary.json"));
    assert_eq!(summary["total_files_processed"], json!(0));
    assert_eq!(summary["total_records"], json!(0));
}

#[test]
fn repeated_override_keeps_the_last_entry() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let entry = |code: &str| {
        json!({"cunli_key": "中正區_建國里", "district": "中正區", "village": "建國里",
               "county": "臺北市", "villcode": code, "note": "by hand"})
    };
    let mapping = dir.path().join("mapping.json");
    write_json(&mapping, &json!([entry("63000050001"), entry("63000050002")]));

    let out = cunli(&["extract", "--config", &config]);
    assert_success(&out);
    let rewritten = read_json(&mapping);
    assert_eq!(rewritten.as_array().unwrap().len(), 1);
    assert_eq!(rewritten[0]["villcode"], json!("63000050002"));
    // Counted even though no record of this run belongs to the village.
    let summary = read_json(&dir.path().join("out").join("summary.json"));
    assert_eq!(summary["manual_mappings_applied"], json!(1));
}

#[test]
fn refresh_combine_and_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = setup(root);
    let out_dir = root.join("out");
    fs::create_dir_all(&out_dir).unwrap();
    write_json(
        &out_dir.join("中正區_建國里.json"),
        &village_doc("建國里", vec![record("建國里", "1", 1000, 2500), record("建國里", "2", 500, 2000)]),
    );
    write_json(
        &out_dir.join("中正區_光復里.json"),
        &village_doc("光復里", vec![record("光復里", "3", 400, 100)]),
    );
    write_json(
        &out_dir.join("中正區_消失里.json"),
        &village_doc("消失里", vec![record("消失里", "4", 1, 1)]),
    );

    assert_success(&cunli(&["refresh-codes", "--config", &config]));
    let doc = read_json(&out_dir.join("中正區_建國里.json"));
    assert_eq!(doc["VILLCODE"], json!("63000050001"));
    assert_eq!(doc["TOWNCODE"], json!("63000050"));
    assert_eq!(doc["sum_fields"]["disagree_votes"], json!(4500));
    let missing = read_json(&out_dir.join("villages_still_missing.json"));
    assert_eq!(missing.as_array().unwrap().len(), 1);
    assert_eq!(missing[0]["cunli"], json!("中正區_消失里"));
    let summary = read_json(&out_dir.join("cunli_summary.json"));
    assert_eq!(summary["63000050001"]["cunli"], json!("中正區_建國里"));

    // A second pass changes nothing.
    let before = fs::read_to_string(out_dir.join("中正區_建國里.json")).unwrap();
    assert_success(&cunli(&["refresh-codes", "--config", &config]));
    let after = fs::read_to_string(out_dir.join("中正區_建國里.json")).unwrap();
    assert_eq!(before, after);

    assert_success(&cunli(&["combine", "--config", &config]));
    let combined = fs::read_to_string(root.join("combined.csv")).unwrap();
    let lines: Vec<&str> = combined.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("candidate_2_name,candidate_2_party,candidate_2_votes,candidate_2_number"));
    assert!(lines[1].starts_with("63000050001,臺北市,中正區,建國里,臺北市第08選區,63000-08,8000,12000,賴士葆,中國國民黨,5000,1500,4500,"));
    assert!(lines[2].starts_with("63000050002,"));

    assert_success(&cunli(&["gaps", "--config", &config]));
    let kmt = fs::read_to_string(root.join("kmt.csv")).unwrap();
    let kmt_lines: Vec<&str> = kmt.lines().collect();
    assert_eq!(kmt_lines.len(), 2);
    assert!(kmt_lines[1].contains(",5000,1500,4500,recall_disagree_votes,500,"));
    let others = fs::read_to_string(root.join("others.csv")).unwrap();
    let other_lines: Vec<&str> = others.lines().collect();
    assert_eq!(other_lines.len(), 2);
    assert!(other_lines[1].contains(",600,400,100,recall_agree_votes,200,"));
}

#[test]
fn command_line_overrides_the_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let other_out = dir.path().join("elsewhere");
    let out = cunli(&[
        "extract",
        "--config",
        &config,
        "--output-directory",
        &other_out.display().to_string(),
    ]);
    assert_success(&out);
    assert!(other_out.join("summary.json").exists());
    assert!(!dir.path().join("out").join("summary.json").exists());
}

#[test]
fn missing_inputs_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("out")).unwrap();
    let out_dir = root.join("out").display().to_string();

    // No election dataset for combine.
    let out = cunli(&["combine", "--output-directory", &out_dir]);
    assert!(!out.status.success());

    // A basecode path that does not exist.
    let missing = root.join("nope.json").display().to_string();
    let out = cunli(&["refresh-codes", "--output-directory", &out_dir, "--basecode", &missing]);
    assert!(!out.status.success());

    // A raw directory that does not exist.
    let raw = root.join("no_raw").display().to_string();
    let out = cunli(&["extract", "--raw-directory", &raw, "--output-directory", &out_dir]);
    assert!(!out.status.success());
}

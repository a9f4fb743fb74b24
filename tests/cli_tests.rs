mod common;
use common::*;

use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_import_then_lookup() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("geo.db");
    let db_arg = db.to_str().unwrap();
    let input = dump(&[
        "70.95.73.73,SI,Nepal,DuBuquemouth,-84.875,7.206,7823011346",
        "70.95.73.73,SI,Nepal,DuBuquemouth,1.0,2.0,1",
        "bad,line",
    ]);

    let (stdout, stderr, exit_code) = run_geoimport_with_input(
        &["import", "--database", db_arg, "--summary", "json", "--workers", "2"],
        input.as_bytes(),
    );
    assert_eq!(exit_code, 0, "import should succeed, stderr: {stderr}");

    let summary: serde_json::Value = serde_json::from_str(&stdout).expect("summary is JSON");
    assert_eq!(summary["valid"], 1);
    assert_eq!(summary["invalid"], 2);
    assert_eq!(summary["lines_total"], 3);
    assert_eq!(summary["rejections"]["duplicate_ip"], 1);
    assert_eq!(summary["rejections"]["field_count"], 1);
    assert!(summary["elapsed"].is_f64());

    let (stdout, stderr, exit_code) =
        run_geoimport_with_input(&["lookup", "70.95.73.73", "--database", db_arg], b"");
    assert_eq!(exit_code, 0, "lookup should succeed, stderr: {stderr}");
    let record: serde_json::Value = serde_json::from_str(&stdout).expect("record is JSON");
    assert_eq!(record["ip"], "70.95.73.73");
    assert_eq!(record["country_code"], "SI");
    assert_eq!(record["latitude"], "-84.875");
    assert_eq!(record["mystery_value"], "7823011346");
}

#[test]
fn test_truncate_replaces_previous_import() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("geo.db");
    let db_arg = db.to_str().unwrap();
    let input = unique_dump(30);

    for _ in 0..2 {
        let (_stdout, stderr, exit_code) = run_geoimport_with_input(
            &["import", "--database", db_arg, "--truncate", "--summary", "json"],
            input.as_bytes(),
        );
        assert_eq!(exit_code, 0, "stderr: {stderr}");
    }

    let store = geoimport::SqliteStore::open(&db, geoimport::SqliteOptions::default()).unwrap();
    assert_eq!(store.count().unwrap(), 30);
}

#[test]
fn test_text_summary_and_file_input() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("geo.db");
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(unique_dump(5).as_bytes()).unwrap();
    file.flush().unwrap();

    let (stdout, stderr, exit_code) = run_geoimport_with_input(
        &[
            "import",
            file.path().to_str().unwrap(),
            "--database",
            db.to_str().unwrap(),
        ],
        b"",
    );
    assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert!(
        stdout.starts_with("Imported 5 valid records, rejected 0 invalid"),
        "unexpected summary: {stdout}"
    );
}

#[test]
fn test_dry_run_needs_no_database() {
    let (stdout, stderr, exit_code) = run_geoimport_with_input(
        &["import", "--dry-run", "--summary", "json"],
        unique_dump(10).as_bytes(),
    );
    assert_eq!(exit_code, 0, "stderr: {stderr}");
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["valid"], 10);
    assert_eq!(summary["records_persisted"], 10);
}

#[test]
fn test_missing_database_is_an_error() {
    let (_stdout, stderr, exit_code) =
        run_geoimport_with_input(&["import"], unique_dump(1).as_bytes());
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("no database given"), "stderr: {stderr}");
}

#[test]
fn test_empty_input_is_fatal() {
    let (_stdout, stderr, exit_code) = run_geoimport_with_input(&["import", "--dry-run"], b"");
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("no header line"), "stderr: {stderr}");
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let (_stdout, stderr, exit_code) = run_geoimport_with_input(
        &["import", "--dry-run", "--batch-size", "0"],
        unique_dump(1).as_bytes(),
    );
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("batch size must be greater than 0"), "stderr: {stderr}");
}

#[test]
fn test_huge_batch_size_is_rejected() {
    let (_stdout, stderr, exit_code) = run_geoimport_with_input(
        &["import", "--dry-run", "--batch-size", "1000000000"],
        unique_dump(1).as_bytes(),
    );
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("batch size too high"), "stderr: {stderr}");
}

#[test]
fn test_lookup_rejects_malformed_ip() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("geo.db");
    let (_stdout, stderr, exit_code) = run_geoimport_with_input(
        &["lookup", "1.2.3.04", "--database", db.to_str().unwrap()],
        b"",
    );
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("not a valid IPv4 address"), "stderr: {stderr}");
}

#[test]
fn test_lookup_unknown_ip() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("geo.db");
    let db_arg = db.to_str().unwrap();
    run_geoimport_with_input(&["import", "--database", db_arg], unique_dump(3).as_bytes());

    let (_stdout, stderr, exit_code) =
        run_geoimport_with_input(&["lookup", "192.168.1.1", "--database", db_arg], b"");
    assert_eq!(exit_code, 1);
    assert!(stderr.contains("no record found"), "stderr: {stderr}");
}

#[test]
fn test_config_file_defaults_and_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("from-config.db");
    let config_path = dir.path().join("geoimport.ini");
    std::fs::write(
        &config_path,
        format!(
            "defaults = --summary json --batch-size 2\n\n[database]\npath = {}\n",
            db.display()
        ),
    )
    .unwrap();

    // Run without --ignore-config, so spawn directly.
    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_geoimport"))
        .args(["import", "--config-file", config_path.to_str().unwrap()])
        .env_remove("GEOIMPORT_DATABASE")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(unique_dump(5).as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["batches_persisted"], 3);
    assert!(db.exists());
}

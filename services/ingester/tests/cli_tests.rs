//! Tests for the ingester binary.
//!
//! Each test runs the compiled binary against the in-memory store, so no
//! database is needed.

use std::process::{Command, Output};
use test_utils::{temp_test_dir, write_wave_tables};

fn ingester(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ingester"))
        .args(args)
        .env_remove("DATABASE_URL")
        .env_remove("INGESTER_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run ingester")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_wave_cycle_dry_run() {
    let dir = temp_test_dir();
    let (tab01, tab41) = write_wave_tables(dir.path(), 2, 14).unwrap();

    let output = ingester(&[
        "--memory",
        "wave",
        "--tab01",
        tab01.to_str().unwrap(),
        "--tab41",
        tab41.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let report = stdout(&output);
    assert!(report.contains("wave cycle"), "{}", report);
    assert!(report.contains("28 forecast rows"), "{}", report);
    assert!(report.contains("24 archive rows"), "{}", report);
}

#[test]
fn test_missing_wave_file_fails_with_path() {
    let output = ingester(&[
        "--memory",
        "wave",
        "--tab01",
        "/nonexistent/tab01.csv",
        "--tab41",
        "/nonexistent/tab41.csv",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("/nonexistent/tab01.csv"));
}

// ============================================================================
// Queries and arguments
// ============================================================================

#[test]
fn test_query_on_empty_store_reports_not_found() {
    let output = ingester(&[
        "--memory",
        "query",
        "bbox",
        "wave",
        "forecast",
        "--min-lat",
        "24",
        "--max-lat",
        "25",
        "--min-lon",
        "54",
        "--max-lon",
        "55",
        "--start",
        "2025-08-10",
        "--end",
        "2025-08-11",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No stations"), "{}", stderr(&output));
}

#[test]
fn test_name_and_point_are_exclusive() {
    let output = ingester(&[
        "--memory",
        "query",
        "station",
        "wind",
        "forecast",
        "--name",
        "wind_station_1",
        "--lat",
        "24",
        "--start",
        "2025-08-10",
        "--end",
        "2025-08-11",
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unknown_domain_rejected() {
    let output = ingester(&["--memory", "purge", "tide", "stations"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_database_url_required_without_memory() {
    let output = ingester(&["migrate"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No database URL"), "{}", stderr(&output));
}

//! File-backed tests for the wave table reader.

use grid_source::{read_gridded, read_wave_tables, GriddedVariables, SourceError, TabularOptions};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ============================================================================
// Wave table tests
// ============================================================================

#[test]
fn test_reads_paired_files() {
    let tab01 = write_csv(
        "Time,Long,Lat,Tp\n\
         [],[deg],[deg],[s]\n\
         2025/08/10 00:00:00,54.50001,24.25,7.0\n\
         2025/08/10 03:00:00,54.50001,24.25,7.5\n",
    );
    // Coordinates written with different trailing digits still join.
    let tab41 = write_csv(
        "Time,Long,Lat,Hs,Tr,Dir\n\
         [],[deg],[deg],[m],[s],[deg]\n\
         2025/08/10 00:00:00,54.49999,24.25,1.0,5.0,300\n\
         2025/08/10 03:00:00,54.49999,24.25,1.5,5.5,305\n",
    );

    let ds = read_wave_tables(tab01.path(), tab41.path(), &TabularOptions::default()).unwrap();
    assert_eq!(ds.len(), 2);
    assert_eq!(ds.field_index("Hs").unwrap(), 1);
    assert_eq!(ds.records[1].values, vec![7.5, 1.5, 5.5, 305.0]);
    assert!(ds.source.contains(" + "));
}

#[test]
fn test_units_row_can_be_kept() {
    let tab01 = write_csv("Time,Long,Lat,Tp\n2025/08/10 00:00:00,1.0,2.0,7.0\n");
    let tab41 = write_csv("Time,Long,Lat,Hs,Tr,Dir\n2025/08/10 00:00:00,1.0,2.0,1.0,5.0,300\n");

    let options = TabularOptions {
        skip_units_row: false,
        ..TabularOptions::default()
    };
    let ds = read_wave_tables(tab01.path(), tab41.path(), &options).unwrap();
    assert_eq!(ds.len(), 1);
}

#[test]
fn test_missing_file_is_io_error() {
    let tab41 = write_csv("Time,Long,Lat,Hs,Tr,Dir\n");
    let err = read_wave_tables(
        Path::new("/nonexistent/tab01.csv"),
        tab41.path(),
        &TabularOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SourceError::Io { .. }));
}

#[test]
fn test_options_deserialize_with_defaults() {
    let options: TabularOptions = serde_yaml::from_str("time_format: \"%Y-%m-%d %H:%M\"").unwrap();
    assert_eq!(options.time_format, "%Y-%m-%d %H:%M");
    assert_eq!(options.lon_column, "Long");
}

// ============================================================================
// Gridded reader tests
// ============================================================================

#[test]
fn test_gridded_missing_file_fails() {
    let result = read_gridded(Path::new("/nonexistent/wrfout.nc"), &GriddedVariables::default());
    assert!(result.is_err());
}

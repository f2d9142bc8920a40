//! Integration tests for CSV file export

use std::fs;

use geo_types::point;
use layer_csv::{CsvWriterOptions, write_csv_file};
use layer_shared::{Feature, VectorLayer};
use tempfile::TempDir;

#[test]
fn test_write_csv_file_for_region() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("IA_FullState.csv");

    let layer = VectorLayer::new(
        (0..3)
            .map(|i| {
                let x = f64::from(i) * 5.0;
                Feature::new(point!(x: x, y: 100.0).into())
                    .with_property("elevation", 300.0 + f64::from(i))
                    .with_property("TWI", f64::from(i) / 2.0)
            })
            .collect(),
    );

    write_csv_file(&path, &layer, &CsvWriterOptions::default()).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "geometry,TWI,elevation");
    assert_eq!(lines[3], "POINT(10 100),1,302");
}

#[test]
fn test_write_empty_layer_writes_header_only() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.csv");

    write_csv_file(&path, &VectorLayer::default(), &CsvWriterOptions::default()).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "geometry\n");
}

//! Integration tests for `GeoJSON` file reading and writing

use std::fs;

use geo_types::{Geometry, point};
use layer_geojson::{
    Feature, GeoJsonWriterOptions, SpatialFormatReadError, VectorLayer, read_geojson_file,
    write_geojson_file,
};
use tempfile::TempDir;

#[test]
fn test_write_then_read_point_layer() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("USGS_LPC_IA_FullState_2009.geojson");

    let layer = VectorLayer::new(vec![
        Feature::new(point!(x: -10424171.9, y: 5165494.7).into())
            .with_property("elevation", 312.0)
            .with_property("TWI", 1.25),
        Feature::new(point!(x: -10424166.9, y: 5165494.7).into())
            .with_property("elevation", 311.5)
            .with_property("TWI", 1.5),
    ])
    .with_crs("EPSG:3857");

    write_geojson_file(&path, &layer, &GeoJsonWriterOptions::new().with_pretty_print(true))
        .unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("\"FeatureCollection\""));
    assert!(contents.contains("EPSG::3857"));

    let read_back = read_geojson_file(&path).unwrap();
    assert_eq!(read_back.len(), 2);
    assert_eq!(read_back.column("TWI"), vec![Some(1.25), Some(1.5)]);
    assert!(matches!(read_back.features[0].geometry, Geometry::Point(_)));
}

#[test]
fn test_read_missing_file_reports_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.geojson");

    let err = read_geojson_file(&path).unwrap_err();
    match err {
        SpatialFormatReadError::Io { context, .. } => {
            assert!(context.unwrap().ends_with("missing.geojson"));
        },
        other => panic!("Expected Io error, got {other}"),
    }
}

//! `GeoJSON` parsing into [`VectorLayer`] values.

use std::collections::BTreeMap;
use std::convert::TryInto;
use std::path::Path;

use geo_types::Geometry;
use geojson::{Feature as GeoJsonFeature, GeoJson, Geometry as GeoJsonGeometry, JsonObject};
use layer_shared::{Feature, SourcePosition, SpatialFormatReadError, SpatialFormatResult, VectorLayer};

/// Parse raw bytes into a [`VectorLayer`].
///
/// Only numeric properties are kept; string and nested values are ignored. Features
/// without a geometry are skipped since every downstream step needs one.
///
/// # Errors
///
/// Returns [`SpatialFormatReadError::Parse`] when the bytes are neither a `GeoJSON`
/// document nor a newline-delimited sequence of documents.
pub fn parse_geojson_bytes(
    bytes: &[u8],
    context: impl Into<String>,
) -> SpatialFormatResult<VectorLayer> {
    let context = context.into();
    let reader = std::io::Cursor::new(bytes);

    let features = match GeoJson::from_reader(reader) {
        Ok(geojson) => geojson_to_features(geojson, &context)?,
        Err(primary_err) => {
            let primary_err_message = primary_err.to_string();
            match parse_geojson_sequence(bytes, &context) {
                Ok(features) => features,
                Err(sequence_err) => {
                    return Err(combine_errors(&primary_err_message, &sequence_err, context));
                },
            }
        },
    };

    Ok(VectorLayer::new(features))
}

/// Read a `GeoJSON` file from disk into a [`VectorLayer`].
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or a parse error as for
/// [`parse_geojson_bytes`].
pub fn read_geojson_file(path: impl AsRef<Path>) -> SpatialFormatResult<VectorLayer> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| SpatialFormatReadError::Io {
        source,
        context: Some(path.display().to_string()),
    })?;
    parse_geojson_bytes(&bytes, path.display().to_string())
}

fn geojson_to_features(geojson: GeoJson, context: &str) -> SpatialFormatResult<Vec<Feature>> {
    match geojson {
        GeoJson::FeatureCollection(collection) => {
            let mut features = Vec::with_capacity(collection.features.len());
            for (idx, feature) in collection.features.into_iter().enumerate() {
                if let Some(feature) = convert_feature(feature, idx, context)? {
                    features.push(feature);
                }
            }
            Ok(features)
        },
        GeoJson::Feature(feature) => Ok(convert_feature(feature, 0, context)?.into_iter().collect()),
        GeoJson::Geometry(geometry) => Ok(vec![Feature::new(convert_geometry(
            geometry, 0, context,
        )?)]),
    }
}

fn convert_feature(
    feature: GeoJsonFeature,
    idx: usize,
    context: &str,
) -> SpatialFormatResult<Option<Feature>> {
    let Some(geometry) = feature.geometry else {
        return Ok(None);
    };
    let geometry = convert_geometry(geometry, idx, context)?;
    let properties = numeric_properties(feature.properties.unwrap_or_default());

    Ok(Some(Feature {
        geometry,
        properties,
    }))
}

fn numeric_properties(properties: JsonObject) -> BTreeMap<String, f64> {
    properties
        .into_iter()
        .filter_map(|(name, value)| value.as_f64().map(|v| (name, v)))
        .collect()
}

fn convert_geometry(
    geometry: GeoJsonGeometry,
    idx: usize,
    context: &str,
) -> SpatialFormatResult<Geometry<f64>> {
    geometry
        .try_into()
        .map_err(|err| SpatialFormatReadError::Parse {
            message: format!("Failed to convert GeoJSON geometry: {err}"),
            position: Some(SourcePosition {
                feature: Some(idx as u64 + 1),
                ..SourcePosition::default()
            }),
            context: Some(context.to_string()),
        })
}

fn parse_geojson_sequence(bytes: &[u8], context: &str) -> SpatialFormatResult<Vec<Feature>> {
    let mut features = Vec::new();
    for (line_idx, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line_number = (line_idx + 1) as u64;
        let line = match std::str::from_utf8(raw_line) {
            Ok(line) => line.trim(),
            Err(err) => {
                return Err(SpatialFormatReadError::Parse {
                    message: format!("GeoJSON line is not valid UTF-8: {err}"),
                    position: Some(SourcePosition {
                        line: Some(line_number),
                        ..SourcePosition::default()
                    }),
                    context: Some(context.to_string()),
                });
            },
        };

        if line.is_empty() {
            continue;
        }

        let geojson = line
            .parse::<GeoJson>()
            .map_err(|err| SpatialFormatReadError::Parse {
                message: format!("Failed to parse GeoJSON feature: {err}"),
                position: Some(SourcePosition {
                    line: Some(line_number),
                    ..SourcePosition::default()
                }),
                context: Some(context.to_string()),
            })?;

        features.append(&mut geojson_to_features(geojson, context)?);
    }

    if features.is_empty() {
        Err(SpatialFormatReadError::Parse {
            message: "No GeoJSON features found".to_string(),
            position: None,
            context: Some(context.to_string()),
        })
    } else {
        Ok(features)
    }
}

fn combine_errors(
    collection_err: &str,
    sequence_err: &SpatialFormatReadError,
    context: String,
) -> SpatialFormatReadError {
    let message = format!(
        "Failed to parse GeoJSON as FeatureCollection ({collection_err}); \
         also failed to parse as GeoJSON sequence: {sequence_err}"
    );
    SpatialFormatReadError::Parse {
        message,
        position: None,
        context: Some(context),
    }
}

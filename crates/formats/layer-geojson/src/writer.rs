//! `GeoJSON` writer for [`VectorLayer`] values.
//!
//! Non-finite attribute values (`NaN`, `±Inf`) have no JSON representation and are
//! written as `null`, so a degenerate index value never appears as a valid number.

use std::fs::File;
use std::io::{BufWriter, Write as IoWrite};
use std::path::Path;

use geojson::{Feature as GeoJsonFeature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use layer_shared::VectorLayer;

/// Options for `GeoJSON` writing
#[derive(Debug, Clone)]
pub struct GeoJsonWriterOptions {
    /// Pretty-print the output (default: false)
    pub pretty_print: bool,
    /// Emit the legacy `crs` member when the layer declares an EPSG code (default: true)
    pub write_crs: bool,
}

impl Default for GeoJsonWriterOptions {
    fn default() -> Self {
        Self {
            pretty_print: false,
            write_crs: true,
        }
    }
}

impl GeoJsonWriterOptions {
    /// Create new writer options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    #[must_use]
    pub fn with_pretty_print(mut self, pretty_print: bool) -> Self {
        self.pretty_print = pretty_print;
        self
    }

    /// Set whether to write the `crs` member
    #[must_use]
    pub fn with_crs_member(mut self, write_crs: bool) -> Self {
        self.write_crs = write_crs;
        self
    }
}

/// Write a layer as a `GeoJSON` `FeatureCollection`.
///
/// # Errors
///
/// Returns an error if writing to the output fails.
pub fn write_geojson<W: IoWrite>(
    writer: &mut W,
    layer: &VectorLayer,
    options: &GeoJsonWriterOptions,
) -> std::io::Result<()> {
    let geojson = to_geojson(layer, options);
    if options.pretty_print {
        serde_json::to_writer_pretty(&mut *writer, &geojson)?;
    } else {
        serde_json::to_writer(&mut *writer, &geojson)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write a layer to a new file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_geojson_file(
    path: impl AsRef<Path>,
    layer: &VectorLayer,
    options: &GeoJsonWriterOptions,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_geojson(&mut writer, layer, options)?;
    writer.flush()
}

/// Write a layer to an in-memory buffer.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn write_geojson_to_bytes(
    layer: &VectorLayer,
    options: &GeoJsonWriterOptions,
) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_geojson(&mut buffer, layer, options)?;
    Ok(buffer)
}

fn to_geojson(layer: &VectorLayer, options: &GeoJsonWriterOptions) -> GeoJson {
    let features = layer
        .features
        .iter()
        .map(|feature| {
            let properties: JsonObject = feature
                .properties
                .iter()
                .map(|(name, value)| (name.clone(), JsonValue::from(*value)))
                .collect();
            GeoJsonFeature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(
                    &feature.geometry,
                ))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = if options.write_crs {
        layer.crs.as_deref().and_then(crs_member)
    } else {
        None
    };

    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    })
}

fn crs_member(crs: &str) -> Option<JsonObject> {
    let code = crs.strip_prefix("EPSG:")?;
    let mut member = JsonObject::new();
    member.insert(
        "crs".to_string(),
        serde_json::json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{code}") }
        }),
    );
    Some(member)
}

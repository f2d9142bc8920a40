//! `GeoJSON` support for vector layers.
//!
//! The parser turns polygonizer output (a `FeatureCollection`, a single feature, or a
//! newline-delimited sequence) into a [`VectorLayer`] holding the numeric attributes.
//! The writer serializes a layer back out as a `FeatureCollection`.

pub mod parser;
pub mod writer;

pub use parser::{parse_geojson_bytes, read_geojson_file};
pub use writer::{GeoJsonWriterOptions, write_geojson, write_geojson_file, write_geojson_to_bytes};

pub use layer_shared::{Feature, SpatialFormatReadError, VectorLayer};

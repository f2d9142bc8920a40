//! Typed model of a PDAL pipeline job description.
//!
//! A pipeline is an ordered list of [`Stage`] values. Serialized with
//! [`BoundPipeline::job_json`] it becomes the JSON array PDAL reads from
//! `pdal pipeline --stdin`. Slots that are filled per request are `Option`s: `None`
//! while the stage belongs to a template, `Some` once it has been bound.

use std::path::PathBuf;

use serde::Serialize;

/// `readers.ept`: streams points from an Entwine Point Tile dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EptReader {
    pub tag: String,
    /// PDAL bounds string, `([minx, maxx], [miny, maxy])`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<String>,
    /// URL of the dataset's `ept.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// `filters.range`: keeps points whose dimensions satisfy `limits`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeFilter {
    pub tag: String,
    pub limits: String,
}

/// `filters.reprojection`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reprojection {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_srs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_srs: Option<String>,
}

/// `writers.las`: persists the filtered points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LasWriter {
    pub tag: String,
    pub inputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// `writers.gdal`: rasterizes the points into an elevation surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GdalWriter {
    pub tag: String,
    pub inputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub gdalopts: String,
    pub nodata: f64,
    pub output_type: String,
    pub resolution: f64,
    pub window_size: u32,
}

/// One stage of a pipeline, tagged with its PDAL stage type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Stage {
    #[serde(rename = "readers.ept")]
    ReadersEpt(EptReader),
    #[serde(rename = "filters.range")]
    FiltersRange(RangeFilter),
    #[serde(rename = "filters.reprojection")]
    FiltersReprojection(Reprojection),
    #[serde(rename = "writers.las")]
    WritersLas(LasWriter),
    #[serde(rename = "writers.gdal")]
    WritersGdal(GdalWriter),
}

impl Stage {
    /// The PDAL stage type, e.g. `"readers.ept"`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::ReadersEpt(_) => "readers.ept",
            Stage::FiltersRange(_) => "filters.range",
            Stage::FiltersReprojection(_) => "filters.reprojection",
            Stage::WritersLas(_) => "writers.las",
            Stage::WritersGdal(_) => "writers.gdal",
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Stage::ReadersEpt(s) => &s.tag,
            Stage::FiltersRange(s) => &s.tag,
            Stage::FiltersReprojection(s) => &s.tag,
            Stage::WritersLas(s) => &s.tag,
            Stage::WritersGdal(s) => &s.tag,
        }
    }

    /// Names of the slots that are still unfilled.
    #[must_use]
    pub fn unbound_slots(&self) -> Vec<&'static str> {
        let mut slots = Vec::new();
        match self {
            Stage::ReadersEpt(s) => {
                if s.bounds.is_none() {
                    slots.push("bounds");
                }
                if s.filename.is_none() {
                    slots.push("filename");
                }
            },
            Stage::FiltersReprojection(s) => {
                if s.in_srs.is_none() {
                    slots.push("in_srs");
                }
                if s.out_srs.is_none() {
                    slots.push("out_srs");
                }
            },
            Stage::WritersLas(LasWriter { filename, .. })
            | Stage::WritersGdal(GdalWriter { filename, .. }) => {
                if filename.is_none() {
                    slots.push("filename");
                }
            },
            Stage::FiltersRange(_) => {},
        }
        slots
    }
}

/// A pipeline with every slot filled for one region.
///
/// Single use: it names the artifacts one execution will produce.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundPipeline {
    /// Partition identifier the job reads from.
    pub region: String,
    pub stages: Vec<Stage>,
    /// Where `writers.las` puts the filtered points.
    pub point_path: PathBuf,
    /// Where `writers.gdal` puts the elevation raster.
    pub raster_path: PathBuf,
}

impl BoundPipeline {
    /// Serialize the stages as the JSON array PDAL expects.
    ///
    /// Field order follows the stage definitions, so equal pipelines always produce
    /// byte-identical output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn job_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.stages)
    }
}

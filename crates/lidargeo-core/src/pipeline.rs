//! Builds PDAL pipeline jobs for a region.
//!
//! A [`PipelineTemplate`] holds the fixed five-stage pipeline with its per-request
//! slots unbound. [`PipelineTemplate::bind`] fills those slots for one region and
//! returns a [`BoundPipeline`] ready for a [`PipelineExecutor`].
//!
//! [`PipelineExecutor`]: lidargeo_core_common::PipelineExecutor

use std::path::Path;

use lidargeo_core_common::{
    BoundPipeline, EptReader, GdalWriter, LasWriter, RangeFilter, Reprojection, Stage,
};

use crate::error::PipelineError;
use crate::types::BoundingBox;
use crate::utils::region_stem;

const READER_TAG: &str = "readdata";
const RANGE_TAG: &str = "nonoise";
const REPROJECTION_TAG: &str = "reprojectUTM";
const LAS_TAG: &str = "writerslas";
const GDAL_TAG: &str = "writersgdal";

/// Tunable parameters of the pipeline template.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Raster cell size (default: 5)
    pub resolution: f64,
    /// IDW search window in cells (default: 6)
    pub window_size: u32,
    /// Raster no-data value (default: -9999)
    pub nodata: f64,
    /// `filters.range` expression removing noise and non-ground classes
    pub classification_limits: String,
    /// Raster interpolation (default: `idw`)
    pub output_type: String,
    /// GDAL creation options for the raster
    pub gdalopts: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            resolution: 5.0,
            window_size: 6,
            nodata: -9999.0,
            classification_limits: "Classification![2:7], Classification![9:9]".to_string(),
            output_type: "idw".to_string(),
            gdalopts: "tiled=yes,compress=deflate".to_string(),
        }
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    #[must_use]
    pub fn with_window_size(mut self, window_size: u32) -> Self {
        self.window_size = window_size;
        self
    }

    #[must_use]
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self
    }

    #[must_use]
    pub fn with_classification_limits(mut self, limits: impl Into<String>) -> Self {
        self.classification_limits = limits.into();
        self
    }
}

/// Per-request values bound into the template.
#[derive(Debug, Clone)]
pub struct BindParams<'a> {
    /// Partition id, with trailing `/`
    pub region: &'a str,
    pub bounds: &'a BoundingBox,
    /// Target EPSG code, used for both source and output reference
    pub crs: u32,
    /// URL of the partition's metadata document
    pub source_url: &'a str,
    /// Directory receiving the `.laz` and `.tif` artifacts
    pub work_dir: &'a Path,
}

/// The five-stage pipeline with its per-request slots unbound.
#[derive(Debug, Clone)]
pub struct PipelineTemplate {
    stages: Vec<Stage>,
}

impl PipelineTemplate {
    /// Creates the template: read, drop noise classes, reproject, write points, rasterize.
    #[must_use]
    pub fn new(settings: &PipelineSettings) -> Self {
        let stages = vec![
            Stage::ReadersEpt(EptReader {
                tag: READER_TAG.to_string(),
                bounds: None,
                filename: None,
            }),
            Stage::FiltersRange(RangeFilter {
                tag: RANGE_TAG.to_string(),
                limits: settings.classification_limits.clone(),
            }),
            Stage::FiltersReprojection(Reprojection {
                tag: REPROJECTION_TAG.to_string(),
                in_srs: None,
                out_srs: None,
            }),
            Stage::WritersLas(LasWriter {
                tag: LAS_TAG.to_string(),
                inputs: vec![REPROJECTION_TAG.to_string()],
                filename: None,
            }),
            Stage::WritersGdal(GdalWriter {
                tag: GDAL_TAG.to_string(),
                inputs: vec![LAS_TAG.to_string()],
                filename: None,
                gdalopts: settings.gdalopts.clone(),
                nodata: settings.nodata,
                output_type: settings.output_type.clone(),
                resolution: settings.resolution,
                window_size: settings.window_size,
            }),
        ];
        Self { stages }
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Fills every slot for one region.
    ///
    /// The template is not modified, so binding the same parameters twice yields
    /// identical jobs.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnboundSlot`] if a slot is still empty afterwards.
    pub fn bind(&self, params: &BindParams<'_>) -> Result<BoundPipeline, PipelineError> {
        let stem = region_stem(params.region);
        let point_path = params.work_dir.join(format!("{stem}.laz"));
        let raster_path = params.work_dir.join(format!("{stem}.tif"));
        let srs = format!("EPSG:{}", params.crs);

        let stages: Vec<Stage> = self
            .stages
            .iter()
            .cloned()
            .map(|stage| match stage {
                Stage::ReadersEpt(reader) => Stage::ReadersEpt(EptReader {
                    bounds: Some(params.bounds.to_string()),
                    filename: Some(params.source_url.to_string()),
                    ..reader
                }),
                Stage::FiltersReprojection(reprojection) => {
                    Stage::FiltersReprojection(Reprojection {
                        in_srs: Some(srs.clone()),
                        out_srs: Some(srs.clone()),
                        ..reprojection
                    })
                },
                Stage::WritersLas(writer) => Stage::WritersLas(LasWriter {
                    filename: Some(path_string(&point_path)),
                    ..writer
                }),
                Stage::WritersGdal(writer) => Stage::WritersGdal(GdalWriter {
                    filename: Some(path_string(&raster_path)),
                    ..writer
                }),
                other @ Stage::FiltersRange(_) => other,
            })
            .collect();

        if let Some((stage, slot)) = stages
            .iter()
            .find_map(|s| s.unbound_slots().first().map(|slot| (s.tag().to_string(), *slot)))
        {
            return Err(PipelineError::UnboundSlot {
                stage,
                slot: slot.to_string(),
            });
        }

        Ok(BoundPipeline {
            region: params.region.to_string(),
            stages,
            point_path,
            raster_path,
        })
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

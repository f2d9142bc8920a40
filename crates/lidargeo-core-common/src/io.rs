//! Traits at the boundary with the external point-cloud and raster engines.
//!
//! The core never decodes point clouds or traces polygons itself. It hands a job to a
//! [`PipelineExecutor`] and a raster to a [`RasterPolygonizer`], and works with what
//! they return.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use layer_shared::VectorLayer;

use crate::error::ExecutionError;
use crate::stages::BoundPipeline;

/// Files produced by one successful pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineArtifacts {
    /// Filtered, reprojected points (`.laz`)
    pub point_path: PathBuf,
    /// Elevation raster (`.tif`)
    pub raster_path: PathBuf,
}

/// Runs a bound pipeline job.
///
/// Implementations must not retry; failures go back to the caller for per-region
/// handling.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    /// Executes the job and returns the produced artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] if the engine reports no valid input or fails.
    async fn execute(&self, job: &BoundPipeline) -> Result<PipelineArtifacts, ExecutionError>;
}

/// Converts a raster into polygons, one feature per run of equal cell values.
///
/// Every returned feature carries an `elevation` attribute holding the cell value.
#[async_trait]
pub trait RasterPolygonizer: Send + Sync {
    /// Polygonizes `raster`, persisting the polygons at `output` when the converter
    /// writes files.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] if the converter fails or its output cannot be read.
    async fn polygonize(&self, raster: &Path, output: &Path)
    -> Result<VectorLayer, ExecutionError>;
}

//! Common types and traits shared across `lidargeo` crates.
//!
//! This crate holds the pipeline job model and the traits at the boundary with the
//! external point-cloud and raster engines, so that `lidargeo-core` and test doubles
//! can both depend on them without a cycle.

pub mod error;
pub mod io;
pub mod stages;

// Re-export commonly used types
pub use error::ExecutionError;
pub use io::{PipelineArtifacts, PipelineExecutor, RasterPolygonizer};
pub use stages::{
    BoundPipeline, EptReader, GdalWriter, LasWriter, RangeFilter, Reprojection, Stage,
};

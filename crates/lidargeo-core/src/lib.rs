//! `lidargeo-core` is the core library of `lidargeo`, turning airborne lidar from the public
//! USGS Entwine Point Tile archive into elevation and topographic wetness layers.
//!
//! This crate includes:
//! - **Metadata Index**: Concurrent listing and parsing of partition `ept.json` documents.
//! - **Region Resolution**: Selecting the partitions whose extent contains a bounding box.
//! - **Pipeline Builder**: The five-stage PDAL job, bound per region.
//! - **Terrain Derivation**: Polygonizing the elevation raster and computing TWI per cell.
//! - **Orchestration**: Running many regions with per-region failure isolation.
//!
//! The `operations` module exposes the entry points used by the CLI.

pub mod config;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod operations;
pub mod orchestrator;
pub mod pipeline;
pub mod region;
pub mod render;
pub mod terrain;
pub mod types;
pub mod utils;

pub use config::{ArchiveConfig, FetchFailurePolicy, RunOptions};
pub use error::{LidarGeoError, Result};
pub use metadata::MetadataIndex;
pub use orchestrator::{Orchestrator, RegionFailure, RegionLayer, ResultSet};
pub use terrain::{DataQuality, DeriveOptions, DerivedLayer, TerrainDeriver};
pub use types::{BoundingBox, PartitionDescriptor};

pub use layer_shared::{Feature, VectorLayer};
pub use lidargeo_core_common::{
    BoundPipeline, ExecutionError, PipelineArtifacts, PipelineExecutor, RasterPolygonizer,
};

//! Errors reported by the external execution engines.

use std::path::PathBuf;

use layer_shared::SpatialFormatReadError;
use thiserror::Error;

/// Failure of one region's pipeline run or raster conversion.
///
/// These are isolated per region by the orchestrator: the region is skipped and the
/// batch continues.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The engine found no points to rasterize inside the requested bounds.
    #[error("no points in bounds for region '{region}': {message}")]
    NoPoints {
        /// Partition identifier
        region: String,
        /// Engine diagnostic
        message: String,
    },

    /// The engine exited unsuccessfully.
    #[error("{program} failed for region '{region}' (exit code {code:?}): {stderr}")]
    Failed {
        /// Program that was run
        program: String,
        /// Partition identifier
        region: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The engine could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that was run
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The engine reported success but an expected output file is missing.
    #[error("expected output '{path}' was not produced")]
    MissingArtifact {
        /// Missing file
        path: PathBuf,
    },

    /// The converter's output could not be decoded into a layer.
    #[error("failed to read converted layer: {0}")]
    Conversion(#[from] SpatialFormatReadError),

    /// The job description could not be serialized.
    #[error("invalid job description: {0}")]
    Job(#[from] serde_json::Error),
}

impl ExecutionError {
    /// Returns `true` when the failure means the requested area simply has no data.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoPoints { .. })
    }
}

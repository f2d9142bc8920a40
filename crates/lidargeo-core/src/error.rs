//! Custom error types for `lidargeo` operations.
//!
//! This module provides structured error handling using `thiserror`. Each stage of a
//! run has its own error enum so callers can tell a fatal indexing failure apart from
//! a region that can simply be skipped.

use std::path::PathBuf;
use std::time::Duration;

use lidargeo_core_common::ExecutionError;
use thiserror::Error;

/// Main error type for `lidargeo` operations.
///
/// This is the root error type that encompasses all domain-specific errors.
/// It uses `#[error(transparent)]` to delegate display formatting to the
/// underlying error variants.
#[derive(Debug, Error)]
pub enum LidarGeoError {
    /// Archive listing and metadata errors
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Pipeline construction and execution errors
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Terrain derivation errors
    #[error(transparent)]
    Derivation(#[from] DerivationError),

    /// I/O errors (export and work directory writes)
    #[error(transparent)]
    Io(#[from] IoError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while listing the archive and indexing partition metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The archive listing itself failed.
    #[error("Failed to list partitions in the archive: {source}")]
    Listing {
        /// The underlying store error
        #[source]
        source: object_store::Error,
    },

    /// A metadata request failed at the network layer.
    #[error("Failed to fetch metadata for '{region}': {source}")]
    Network {
        /// Partition identifier
        region: String,
        /// The underlying store error
        #[source]
        source: object_store::Error,
    },

    /// A metadata request did not complete in time.
    #[error("Timed out after {timeout:?} fetching metadata for '{region}'")]
    Timeout {
        /// Partition identifier
        region: String,
        /// The configured per-request timeout
        timeout: Duration,
    },

    /// A metadata document is not valid EPT JSON.
    #[error("Malformed metadata document for '{region}': {message}")]
    Parse {
        /// Partition identifier
        region: String,
        /// Description of the parse failure
        message: String,
    },

    /// A schema dimension declares a type outside `unsigned`/`signed`/`float`.
    #[error("Unrecognised schema type '{kind}' for dimension '{dimension}' in '{region}'")]
    UnsupportedSchemaType {
        /// Partition identifier
        region: String,
        /// Dimension name
        dimension: String,
        /// The unrecognised type
        kind: String,
    },

    /// No partition with the requested identifier exists in the index.
    #[error("Partition '{region}' not found in the archive index")]
    UnknownPartition {
        /// Partition identifier
        region: String,
    },
}

/// Errors raised while building or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A template slot was left unfilled after binding.
    #[error("Stage '{stage}' has unbound parameter '{slot}'")]
    UnboundSlot {
        /// Stage tag
        stage: String,
        /// Parameter name
        slot: String,
    },

    /// The external engine failed for one region.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Errors raised while deriving the terrain layer.
#[derive(Debug, Error)]
pub enum DerivationError {
    /// Some features produced a non-finite wetness index.
    #[error("{count} feature(s) in '{region}' have a non-finite TWI (elevation <= 0 or zero area)")]
    NonFiniteTwi {
        /// Partition identifier
        region: String,
        /// Number of affected features
        count: usize,
    },

    /// A polygon feature lacks the `elevation` attribute.
    #[error("Feature {index} has no 'elevation' attribute")]
    MissingElevation {
        /// Zero-based feature index
        index: usize,
    },

    /// Rendering the preview image failed.
    #[error("Failed to render '{path}': {message}")]
    Render {
        /// Output image path
        path: PathBuf,
        /// Description of the failure
        message: String,
    },
}

/// I/O related errors.
///
/// These errors occur while writing exports and run artifacts.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to write to a file
    #[error("Failed to write {format} file '{path}': {source}")]
    Write {
        /// The format being written
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Configuration errors.
///
/// These errors occur when options or configuration are invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// The bounds string could not be parsed
    #[error("Invalid bounds '{input}': {message}")]
    InvalidBounds {
        /// The text that was supplied
        input: String,
        /// Why it's invalid
        message: String,
    },

    /// The object store client could not be built
    #[error("Failed to configure archive store: {source}")]
    Store {
        /// The underlying store error
        #[source]
        source: object_store::Error,
    },
}

/// Type alias for Results using `LidarGeoError`.
pub type Result<T> = std::result::Result<T, LidarGeoError>;

impl From<ExecutionError> for LidarGeoError {
    fn from(err: ExecutionError) -> Self {
        Self::Pipeline(PipelineError::Execution(err))
    }
}

impl LidarGeoError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Metadata(e) => e.user_message(),
            Self::Pipeline(e) => format!("Pipeline error: {e}"),
            Self::Derivation(e) => format!("Derivation error: {e}"),
            Self::Io(e) => e.to_string(),
            Self::Config(e) => format!("Configuration error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    ///
    /// Returns helpful suggestions on how to fix or work around the error.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Metadata(e) => e.recovery_suggestion(),
            Self::Pipeline(PipelineError::Execution(ExecutionError::Spawn { program, .. })) => {
                Some(format!("Check that '{program}' is installed and on PATH."))
            },
            Self::Pipeline(PipelineError::Execution(ExecutionError::NoPoints { .. })) => Some(
                "Try a larger bounding box or a different region; this one has no ground points."
                    .to_string(),
            ),
            Self::Derivation(DerivationError::NonFiniteTwi { .. }) => Some(
                "Run without --strict-twi to keep non-finite values flagged in the output."
                    .to_string(),
            ),
            Self::Config(ConfigError::InvalidBounds { .. }) => Some(
                "Bounds must look like \"([minx, maxx], [miny, maxy])\" with min <= max."
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Returns `true` if this error only affects a single region.
    ///
    /// The orchestrator skips such regions instead of aborting the run.
    #[must_use]
    pub fn is_region_local(&self) -> bool {
        matches!(self, Self::Pipeline(_) | Self::Derivation(_))
    }
}

impl MetadataError {
    fn user_message(&self) -> String {
        match self {
            Self::Network { region, .. } | Self::Timeout { region, .. } => {
                format!("Could not reach the archive while indexing '{region}': {self}")
            },
            _ => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => Some(
                "Retry, raise --fetch-timeout-secs, or pass --skip-unreachable to index the \
                 reachable partitions only."
                    .to_string(),
            ),
            Self::UnknownPartition { .. } => {
                Some("Run 'lidargeo regions' to list partitions covering your bounds.".to_string())
            },
            _ => None,
        }
    }
}

/// Extension trait for adding I/O context to errors.
///
/// Wraps an error with the file and format being written.
pub trait IoErrorExt<T> {
    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            LidarGeoError::Io(IoError::Write {
                format: format.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }
}

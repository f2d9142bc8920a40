//! Types shared by the layer format crates.
//!
//! [`VectorLayer`] is the in-memory feature table that flows between the polygonizer,
//! the terrain derivation steps, and the exporters. The error types describe failures
//! while decoding a layer from an external source.

use std::error::Error as StdError;
use std::fmt;

mod layer;

pub use layer::{Feature, VectorLayer};

/// A position within a source document, such as a line of newline-delimited `GeoJSON`.
///
/// All indices are 1-based where possible to align with human expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number in the source (1-based)
    pub line: Option<u64>,
    /// Feature index within the document (1-based)
    pub feature: Option<u64>,
    /// Byte offset from the start of the source
    pub byte_offset: Option<u64>,
}

impl SourcePosition {
    /// Returns true when the position does not contain any location metadata.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line.is_none() && self.feature.is_none() && self.byte_offset.is_none()
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(line) = self.line {
            parts.push(format!("line {line}"));
        }
        if let Some(feature) = self.feature {
            parts.push(format!("feature {feature}"));
        }
        if let Some(byte) = self.byte_offset {
            parts.push(format!("byte {byte}"));
        }

        if parts.is_empty() {
            write!(f, "unknown position")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Errors that can occur when reading a vector layer from an external source.
#[derive(Debug)]
pub enum SpatialFormatReadError {
    /// An underlying I/O failure occurred.
    Io {
        /// The originating error.
        source: std::io::Error,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
    /// Parsing failed for the input source.
    Parse {
        /// Human readable description of the failure.
        message: String,
        /// Optional position describing where the failure occurred.
        position: Option<SourcePosition>,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
}

impl SpatialFormatReadError {
    fn fmt_context(context: Option<&str>) -> String {
        context
            .map(|c| format!(" while reading {c}"))
            .unwrap_or_default()
    }

    fn fmt_position(position: Option<&SourcePosition>) -> String {
        position.map(|pos| format!(" at {pos}")).unwrap_or_default()
    }
}

impl fmt::Display for SpatialFormatReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialFormatReadError::Io { source, context } => {
                write!(
                    f,
                    "I/O error{}: {source}",
                    Self::fmt_context(context.as_deref())
                )
            },
            SpatialFormatReadError::Parse {
                message,
                position,
                context,
            } => write!(
                f,
                "Parse error{}{}: {message}",
                Self::fmt_context(context.as_deref()),
                Self::fmt_position(position.as_ref())
            ),
        }
    }
}

impl StdError for SpatialFormatReadError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SpatialFormatReadError::Io { source, .. } => Some(source),
            SpatialFormatReadError::Parse { .. } => None,
        }
    }
}

/// Result type alias that uses [`SpatialFormatReadError`].
pub type SpatialFormatResult<T> = Result<T, SpatialFormatReadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_source_position() {
        let pos = SourcePosition {
            line: Some(10),
            feature: Some(3),
            ..SourcePosition::default()
        };

        assert_eq!(pos.to_string(), "line 10, feature 3");
        assert!(SourcePosition::default().is_empty());
    }

    #[test]
    fn display_parse_error_with_context() {
        let error = SpatialFormatReadError::Parse {
            message: "expected FeatureCollection".to_string(),
            position: Some(SourcePosition {
                line: Some(5),
                ..Default::default()
            }),
            context: Some("IA_FullState.shp".to_string()),
        };

        assert_eq!(
            error.to_string(),
            "Parse error while reading IA_FullState.shp at line 5: expected FeatureCollection"
        );
    }

    #[test]
    fn io_error_keeps_source_and_context() {
        let error = SpatialFormatReadError::Io {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            context: Some("IA_FullState.geojson".to_string()),
        };

        assert_eq!(
            error.to_string(),
            "I/O error while reading IA_FullState.geojson: no such file"
        );
        assert!(error.source().is_some());
    }
}

//! Data types for archive partitions and user requests.
//!
//! Everything here is immutable once constructed. Partition metadata is parsed into
//! typed fields up front by [`crate::metadata`]; nothing is looked up lazily.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// A 2D query box in the caller's coordinate reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a bounding box, checking that each interval is ordered and finite.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBounds`] if a value is not finite or a minimum
    /// exceeds its maximum.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<Self, ConfigError> {
        let bbox = Self {
            min_x,
            max_x,
            min_y,
            max_y,
        };
        if ![min_x, max_x, min_y, max_y].iter().all(|v| v.is_finite()) {
            return Err(ConfigError::InvalidBounds {
                input: bbox.to_string(),
                message: "all values must be finite".to_string(),
            });
        }
        if min_x > max_x || min_y > max_y {
            return Err(ConfigError::InvalidBounds {
                input: bbox.to_string(),
                message: "minimum exceeds maximum".to_string(),
            });
        }
        Ok(bbox)
    }
}

/// Parses the tuple form `([minx, maxx], [miny, maxy])`.
///
/// Parentheses and brackets are optional; exactly four comma-separated numbers are
/// required.
impl FromStr for BoundingBox {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: String| ConfigError::InvalidBounds {
            input: s.to_string(),
            message,
        };

        let cleaned: String = s
            .chars()
            .filter(|c| !matches!(c, '(' | ')' | '[' | ']'))
            .collect();
        let values = cleaned
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| invalid(format!("'{t}' is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let [min_x, max_x, min_y, max_y] = values[..] else {
            return Err(invalid(format!("expected 4 numbers, found {}", values.len())));
        };

        Self::new(min_x, max_x, min_y, max_y).map_err(|e| match e {
            ConfigError::InvalidBounds { message, .. } => invalid(message),
            other => other,
        })
    }
}

/// Formats as the PDAL bounds string accepted by `readers.ept`.
impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "([{}, {}], [{}, {}])",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

/// Cubic extent of a partition: `[minx, miny, minz, maxx, maxy, maxz]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl Bounds {
    /// Builds bounds from the EPT array layout. Returns `None` for fewer than six values.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [min_x, min_y, min_z, max_x, max_y, max_z, ..] => Some(Self {
                min_x: *min_x,
                min_y: *min_y,
                min_z: *min_z,
                max_x: *max_x,
                max_y: *max_y,
                max_z: *max_z,
            }),
            _ => None,
        }
    }

    /// Returns `true` when this extent fully contains `bbox` in X and Y.
    #[must_use]
    pub fn contains(&self, bbox: &BoundingBox) -> bool {
        self.min_x <= bbox.min_x
            && self.min_y <= bbox.min_y
            && self.max_x >= bbox.max_x
            && self.max_y >= bbox.max_y
    }
}

/// Storage class of a schema dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionKind {
    Unsigned,
    Signed,
    Float,
}

impl DimensionKind {
    /// Single-letter code used in dtype strings.
    #[must_use]
    pub fn code(&self) -> char {
        match self {
            DimensionKind::Unsigned => 'u',
            DimensionKind::Signed => 'i',
            DimensionKind::Float => 'f',
        }
    }

    /// Parses an EPT schema type name. Returns `None` for anything unrecognised.
    #[must_use]
    pub fn from_ept(kind: &str) -> Option<Self> {
        match kind {
            "unsigned" => Some(DimensionKind::Unsigned),
            "signed" => Some(DimensionKind::Signed),
            "float" => Some(DimensionKind::Float),
            _ => None,
        }
    }
}

/// One named, typed field of a point record.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
    /// Size in bytes
    pub size: u32,
    /// Optional scale applied to stored integers
    pub scale: Option<f64>,
    /// Optional offset applied after scaling
    pub offset: Option<f64>,
}

impl Dimension {
    /// Compact type code such as `u2`, `i4`, or `f8`.
    #[must_use]
    pub fn dtype(&self) -> String {
        format!("{}{}", self.kind.code(), self.size)
    }
}

/// Ordered point schema of a partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    dimensions: Vec<Dimension>,
}

impl Schema {
    #[must_use]
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self { dimensions }
    }

    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    #[must_use]
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Bytes per point record.
    #[must_use]
    pub fn record_size(&self) -> u32 {
        self.dimensions.iter().map(|d| d.size).sum()
    }
}

/// Declared spatial reference of a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Srs {
    pub wkt: String,
    pub authority: Option<String>,
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
}

impl Srs {
    /// Horizontal EPSG code, when the authority is EPSG.
    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        match (self.authority.as_deref(), self.horizontal.as_deref()) {
            (Some(auth), Some(code)) if auth.eq_ignore_ascii_case("EPSG") => code.parse().ok(),
            _ => None,
        }
    }
}

/// Metadata of one archive partition, parsed from its `ept.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionDescriptor {
    /// Archive prefix, always ending in `/`.
    pub id: String,
    pub bounds: Bounds,
    /// All values of the `bounds` array as published.
    pub raw_bounds: Vec<f64>,
    pub bounds_conforming: Vec<f64>,
    pub points: u64,
    pub schema: Schema,
    pub span: u64,
    pub version: String,
    pub data_type: String,
    pub hierarchy_type: String,
    pub srs: Srs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tuple_bounds() {
        let bbox: BoundingBox = "([-10425171.940, -10423171.940], [5164494.710, 5166494.710])"
            .parse()
            .unwrap();
        assert_eq!(bbox.min_x, -10425171.94);
        assert_eq!(bbox.max_y, 5166494.71);
        assert_eq!(
            bbox.to_string(),
            "([-10425171.94, -10423171.94], [5164494.71, 5166494.71])"
        );
    }

    #[test]
    fn parse_rejects_wrong_arity() {
        let err = "([1, 2], [3])".parse::<BoundingBox>().unwrap_err();
        assert!(err.to_string().contains("expected 4 numbers, found 3"));
    }

    #[test]
    fn parse_rejects_inverted_interval() {
        let err = "([5, 1], [0, 1])".parse::<BoundingBox>().unwrap_err();
        assert!(err.to_string().contains("minimum exceeds maximum"));
        assert!(err.to_string().contains("([5, 1], [0, 1])"));
    }

    #[test]
    fn parse_rejects_non_numbers() {
        let err = "([a, 1], [0, 1])".parse::<BoundingBox>().unwrap_err();
        assert!(err.to_string().contains("'a' is not a number"));
    }

    #[test]
    fn containment_not_overlap() {
        let bbox = BoundingBox::new(10.0, 20.0, 10.0, 20.0).unwrap();
        let larger = Bounds::from_slice(&[0.0, 0.0, 0.0, 30.0, 30.0, 100.0]).unwrap();
        let corner = Bounds::from_slice(&[15.0, 15.0, 0.0, 40.0, 40.0, 100.0]).unwrap();

        assert!(larger.contains(&bbox));
        assert!(!corner.contains(&bbox));
    }

    #[test]
    fn bounds_need_six_values() {
        assert!(Bounds::from_slice(&[0.0, 0.0, 0.0, 1.0, 1.0]).is_none());
    }

    #[test]
    fn dimension_dtype_and_epsg() {
        let dim = Dimension {
            name: "Intensity".to_string(),
            kind: DimensionKind::Unsigned,
            size: 2,
            scale: None,
            offset: None,
        };
        assert_eq!(dim.dtype(), "u2");

        let srs = Srs {
            wkt: String::new(),
            authority: Some("EPSG".to_string()),
            horizontal: Some("3857".to_string()),
            vertical: None,
        };
        assert_eq!(srs.epsg(), Some(3857));
    }
}

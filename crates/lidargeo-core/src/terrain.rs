//! Terrain derivation: from an elevation raster to a point layer of wetness indices.
//!
//! The raster is first polygonized through a [`RasterPolygonizer`]. The resulting
//! polygon layer then passes through a chain of steps, each consuming a
//! [`VectorLayer`] and returning a new one:
//!
//! 1. [`with_area`] adds the planar `area` of each polygon.
//! 2. [`with_denom`] adds `denom = elevation / resolution`.
//! 3. [`with_twi`] adds `TWI = ln(area / denom)`.
//! 4. [`drop_intermediates`] removes `area` and `denom`.
//! 5. [`to_centroids`] replaces each polygon by its centroid.
//!
//! Arithmetic follows IEEE semantics. An elevation of zero or below, or a zero area,
//! yields a NaN or infinite TWI that is kept as is and reported in [`DataQuality`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geo::{Area, Centroid};
use geo_types::Geometry;
use layer_shared::{Feature, VectorLayer};
use lidargeo_core_common::RasterPolygonizer;
use log::{info, warn};

use crate::error::{DerivationError, Result};
use crate::render::render_png;

pub const ELEVATION: &str = "elevation";
pub const AREA: &str = "area";
pub const DENOM: &str = "denom";
pub const TWI: &str = "TWI";

/// Options for one derivation.
#[derive(Debug, Clone)]
pub struct DeriveOptions {
    /// Raster cell size used as the TWI resolution parameter (default: 5)
    pub resolution: f64,
    /// Fail instead of flagging when a TWI is not finite (default: false)
    pub strict: bool,
    /// Write a preview image of the result here
    pub png_path: Option<PathBuf>,
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self {
            resolution: 5.0,
            strict: false,
            png_path: None,
        }
    }
}

impl DeriveOptions {
    #[must_use]
    pub fn new(resolution: f64) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn with_png(mut self, path: impl Into<PathBuf>) -> Self {
        self.png_path = Some(path.into());
        self
    }
}

/// Features whose derived values need attention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuality {
    /// Indices of features whose TWI is NaN or infinite.
    pub non_finite_twi: Vec<usize>,
    /// Polygons dropped because they had no centroid.
    pub dropped_empty: usize,
}

impl DataQuality {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.non_finite_twi.is_empty() && self.dropped_empty == 0
    }
}

/// A derived point layer together with its quality report.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedLayer {
    pub layer: VectorLayer,
    pub quality: DataQuality,
}

/// Computes `ln(area / denom)` without guarding non-finite results.
#[must_use]
pub fn compute_twi(area: f64, denom: f64) -> f64 {
    (area / denom).ln()
}

/// Adds the unsigned planar area of every geometry.
#[must_use]
pub fn with_area(layer: VectorLayer) -> VectorLayer {
    layer.map_features(|feature| {
        let area = feature.geometry.unsigned_area();
        feature.with_property(AREA, area)
    })
}

/// Adds `denom = elevation / resolution`.
///
/// # Errors
///
/// Returns [`DerivationError::MissingElevation`] for the first feature without an
/// `elevation` attribute.
pub fn with_denom(
    layer: VectorLayer,
    resolution: f64,
) -> std::result::Result<VectorLayer, DerivationError> {
    let VectorLayer { crs, features } = layer;
    let features = features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| match feature.property(ELEVATION) {
            Some(elevation) => Ok(feature.with_property(DENOM, elevation / resolution)),
            None => Err(DerivationError::MissingElevation { index }),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(VectorLayer { crs, features })
}

/// Adds `TWI = ln(area / denom)`. Missing inputs yield NaN.
#[must_use]
pub fn with_twi(layer: VectorLayer) -> VectorLayer {
    layer.map_features(|feature| {
        let area = feature.property(AREA).unwrap_or(f64::NAN);
        let denom = feature.property(DENOM).unwrap_or(f64::NAN);
        feature.with_property(TWI, compute_twi(area, denom))
    })
}

#[must_use]
pub fn drop_intermediates(layer: VectorLayer) -> VectorLayer {
    layer.drop_columns(&[AREA, DENOM])
}

/// Replaces every geometry with its centroid.
///
/// Returns the layer and the number of features dropped for having an empty geometry.
#[must_use]
pub fn to_centroids(layer: VectorLayer) -> (VectorLayer, usize) {
    let VectorLayer { crs, features } = layer;
    let total = features.len();
    let features: Vec<Feature> = features
        .into_iter()
        .filter_map(|feature| {
            let centroid = feature.geometry.centroid()?;
            Some(Feature {
                geometry: Geometry::Point(centroid),
                properties: feature.properties,
            })
        })
        .collect();
    let dropped = total - features.len();
    if dropped > 0 {
        warn!("Dropped {dropped} feature(s) with an empty geometry");
    }
    (VectorLayer { crs, features }, dropped)
}

/// Runs the full step chain on a polygon layer.
///
/// # Errors
///
/// Returns [`DerivationError::MissingElevation`] if a polygon lacks an elevation.
pub fn derive_layer(
    polygons: VectorLayer,
    resolution: f64,
) -> std::result::Result<DerivedLayer, DerivationError> {
    let layer = with_area(polygons);
    let layer = with_denom(layer, resolution)?;
    let layer = with_twi(layer);
    let layer = drop_intermediates(layer);
    let (layer, dropped_empty) = to_centroids(layer);

    let non_finite_twi = layer
        .features
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.property(TWI).is_some_and(f64::is_finite))
        .map(|(index, _)| index)
        .collect();

    Ok(DerivedLayer {
        layer,
        quality: DataQuality {
            non_finite_twi,
            dropped_empty,
        },
    })
}

/// Turns rasters into TWI point layers.
#[derive(Clone)]
pub struct TerrainDeriver {
    polygonizer: Arc<dyn RasterPolygonizer>,
}

impl std::fmt::Debug for TerrainDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerrainDeriver").finish_non_exhaustive()
    }
}

impl TerrainDeriver {
    #[must_use]
    pub fn new(polygonizer: Arc<dyn RasterPolygonizer>) -> Self {
        Self { polygonizer }
    }

    /// Polygonizes `raster` and derives the TWI point layer for `region`.
    ///
    /// The polygons are persisted next to the raster as `<stem>.shp`. A preview that
    /// cannot be rendered is logged and does not affect the returned layer.
    ///
    /// # Errors
    ///
    /// Returns a pipeline error if polygonizing fails,
    /// [`DerivationError::MissingElevation`] for a polygon without elevation, and
    /// [`DerivationError::NonFiniteTwi`] in strict mode.
    pub async fn derive(
        &self,
        region: &str,
        raster: &Path,
        options: &DeriveOptions,
    ) -> Result<DerivedLayer> {
        let shapefile = raster.with_extension("shp");
        let polygons = self.polygonizer.polygonize(raster, &shapefile).await?;
        info!("Deriving TWI for {} polygon(s) of {region}", polygons.len());

        let derived = derive_layer(polygons, options.resolution)?;

        let non_finite = derived.quality.non_finite_twi.len();
        if non_finite > 0 {
            if options.strict {
                return Err(DerivationError::NonFiniteTwi {
                    region: region.to_string(),
                    count: non_finite,
                }
                .into());
            }
            warn!("{non_finite} feature(s) in {region} have a non-finite TWI");
        }

        if let Some(png_path) = &options.png_path {
            info!("Saving plot as {}", png_path.display());
            if let Err(err) = render_png(&derived.layer, ELEVATION, png_path) {
                warn!("Skipping plot for {region}: {err}");
            }
        }

        Ok(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use geo_types::{LineString, Polygon, polygon};
    use lidargeo_core_common::ExecutionError;

    struct FixedPolygonizer;

    #[async_trait]
    impl RasterPolygonizer for FixedPolygonizer {
        async fn polygonize(
            &self,
            _raster: &Path,
            _output: &Path,
        ) -> std::result::Result<VectorLayer, ExecutionError> {
            Ok(VectorLayer::new(vec![
                Feature::new(square(0.0, 0.0, 1.0)).with_property(ELEVATION, 5.0),
                Feature::new(square(1.0, 0.0, 1.0)).with_property(ELEVATION, 7.0),
            ]))
        }
    }

    fn square(x: f64, y: f64, side: f64) -> Geometry<f64> {
        polygon![
            (x: x, y: y),
            (x: x + side, y: y),
            (x: x + side, y: y + side),
            (x: x, y: y + side),
            (x: x, y: y),
        ]
        .into()
    }

    fn rectangle_of_area_two() -> Geometry<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
        .into()
    }

    #[test]
    fn test_twi_is_zero_when_area_equals_denom() {
        // area 2, elevation 10, resolution 5: ln(2 / 2) = 0
        let layer = VectorLayer::new(vec![
            Feature::new(rectangle_of_area_two()).with_property(ELEVATION, 10.0),
        ]);
        let derived = derive_layer(layer, 5.0).unwrap();

        let feature = &derived.layer.features[0];
        assert_eq!(feature.property(TWI), Some(0.0));
        assert_eq!(feature.property(ELEVATION), Some(10.0));
        assert!(feature.property(AREA).is_none());
        assert!(feature.property(DENOM).is_none());
        assert!(derived.quality.is_clean());
    }

    #[test]
    fn test_geometry_becomes_centroid() {
        let layer = VectorLayer::new(vec![
            Feature::new(square(10.0, 20.0, 4.0)).with_property(ELEVATION, 3.0),
        ])
        .with_crs("EPSG:26915");
        let derived = derive_layer(layer, 5.0).unwrap();

        assert_eq!(derived.layer.crs.as_deref(), Some("EPSG:26915"));
        match &derived.layer.features[0].geometry {
            Geometry::Point(p) => {
                assert!((p.x() - 12.0).abs() < 1e-9);
                assert!((p.y() - 22.0).abs() < 1e-9);
            },
            other => panic!("expected a point, got {other:?}"),
        }
        let expected = (16.0_f64 / (3.0 / 5.0)).ln();
        assert_eq!(derived.layer.features[0].property(TWI), Some(expected));
    }

    #[test]
    fn test_non_positive_elevation_is_flagged_not_coerced() {
        let layer = VectorLayer::new(vec![
            Feature::new(square(0.0, 0.0, 1.0)).with_property(ELEVATION, 5.0),
            Feature::new(square(1.0, 0.0, 1.0)).with_property(ELEVATION, 0.0),
            Feature::new(square(2.0, 0.0, 1.0)).with_property(ELEVATION, -9999.0),
        ]);
        let derived = derive_layer(layer, 5.0).unwrap();

        let twi = derived.layer.column(TWI);
        assert_eq!(twi[0], Some(0.0));
        // ln(1 / 0) is +inf, ln of a negative ratio is NaN
        assert_eq!(twi[1], Some(f64::INFINITY));
        assert!(twi[2].unwrap().is_nan());
        assert_eq!(derived.quality.non_finite_twi, vec![1, 2]);
    }

    #[test]
    fn test_missing_elevation_is_an_error() {
        let layer = VectorLayer::new(vec![
            Feature::new(square(0.0, 0.0, 1.0)).with_property(ELEVATION, 5.0),
            Feature::new(square(1.0, 0.0, 1.0)),
        ]);
        let err = derive_layer(layer, 5.0).unwrap_err();
        assert!(matches!(err, DerivationError::MissingElevation { index: 1 }));
    }

    #[test]
    fn test_empty_geometry_is_dropped() {
        let empty = Polygon::new(LineString::new(vec![]), vec![]);
        let layer = VectorLayer::new(vec![
            Feature::new(empty.into()).with_property(ELEVATION, 5.0),
            Feature::new(square(0.0, 0.0, 1.0)).with_property(ELEVATION, 5.0),
        ]);
        let derived = derive_layer(layer, 5.0).unwrap();

        assert_eq!(derived.layer.len(), 1);
        assert_eq!(derived.quality.dropped_empty, 1);
        assert!(!derived.quality.is_clean());
    }

    #[test]
    fn test_compute_twi_follows_ieee() {
        assert_eq!(compute_twi(2.0, 2.0), 0.0);
        assert_eq!(compute_twi(1.0, 0.0), f64::INFINITY);
        assert_eq!(compute_twi(0.0, 1.0), f64::NEG_INFINITY);
        assert!(compute_twi(1.0, -1.0).is_nan());
    }

    #[tokio::test]
    async fn test_failed_plot_keeps_layer() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("missing").join("IA_FullState.png");
        let options = DeriveOptions::new(5.0).with_png(&png);

        let derived = TerrainDeriver::new(Arc::new(FixedPolygonizer))
            .derive("IA_FullState/", &dir.path().join("IA_FullState.tif"), &options)
            .await
            .unwrap();

        assert_eq!(derived.layer.len(), 2);
        assert!(derived.quality.is_clean());
        assert!(!png.exists());
    }

    #[tokio::test]
    async fn test_plot_is_written_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("IA_FullState.png");
        let options = DeriveOptions::new(5.0).with_png(&png);

        TerrainDeriver::new(Arc::new(FixedPolygonizer))
            .derive("IA_FullState/", &dir.path().join("IA_FullState.tif"), &options)
            .await
            .unwrap();

        assert!(png.exists());
    }
}

use std::collections::BTreeMap;

use geo_types::Geometry;

/// One feature of a [`VectorLayer`]: a geometry plus named numeric attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub properties: BTreeMap<String, f64>,
}

impl Feature {
    /// Creates a feature with no attributes.
    #[must_use]
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// Adds or replaces an attribute, returning the feature.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: f64) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Returns the named attribute, if present.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<f64> {
        self.properties.get(name).copied()
    }
}

/// An ordered collection of features sharing one coordinate system.
///
/// Layers are passed by value through each processing step; a step consumes one
/// layer and returns a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorLayer {
    /// Declared coordinate reference, usually `EPSG:<code>`.
    pub crs: Option<String>,
    pub features: Vec<Feature>,
}

impl VectorLayer {
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            crs: None,
            features,
        }
    }

    #[must_use]
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Values of the named attribute in feature order; `None` where a feature lacks it.
    #[must_use]
    pub fn column(&self, name: &str) -> Vec<Option<f64>> {
        self.features.iter().map(|f| f.property(name)).collect()
    }

    /// Sorted union of attribute names across all features.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .features
            .iter()
            .flat_map(|f| f.properties.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Removes the given attributes from every feature.
    #[must_use]
    pub fn drop_columns(mut self, names: &[&str]) -> Self {
        for feature in &mut self.features {
            for name in names {
                feature.properties.remove(*name);
            }
        }
        self
    }

    /// Applies `f` to every feature, keeping the layer's CRS.
    #[must_use]
    pub fn map_features<F>(self, f: F) -> Self
    where
        F: FnMut(Feature) -> Feature,
    {
        Self {
            crs: self.crs,
            features: self.features.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;

    fn layer() -> VectorLayer {
        VectorLayer::new(vec![
            Feature::new(point!(x: 0.0, y: 0.0).into())
                .with_property("elevation", 10.0)
                .with_property("area", 4.0),
            Feature::new(point!(x: 1.0, y: 1.0).into()).with_property("elevation", 12.0),
        ])
    }

    #[test]
    fn column_reports_missing_values() {
        assert_eq!(layer().column("area"), vec![Some(4.0), None]);
    }

    #[test]
    fn drop_columns_removes_attributes() {
        let dropped = layer().drop_columns(&["area"]);
        assert_eq!(dropped.column_names(), vec!["elevation".to_string()]);
        assert_eq!(dropped.len(), 2);
    }

    #[test]
    fn map_features_keeps_crs() {
        let mapped = layer()
            .with_crs("EPSG:3857")
            .map_features(|f| f.with_property("TWI", 0.0));
        assert_eq!(mapped.crs.as_deref(), Some("EPSG:3857"));
        assert_eq!(mapped.column("TWI"), vec![Some(0.0), Some(0.0)]);
    }
}

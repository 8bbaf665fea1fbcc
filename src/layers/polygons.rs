//! Polygon Set Layer
//!
//! Named, single-ring 2D polygons parsed from a GeoJSON document. Rings are
//! kept verbatim: no reorientation, closing or simplification.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SpatialError};
use crate::transform::Transform;

/// Minimum number of positions in a ring
const MIN_RING_POSITIONS: usize = 3;

/// One named polygon with a single outer ring
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    name: String,
    ring: Vec<[f64; 2]>,
}

impl Polygon {
    /// Create a polygon from its outer ring
    pub fn new(name: impl Into<String>, ring: Vec<[f64; 2]>) -> Result<Self> {
        let name = name.into();
        if ring.len() < MIN_RING_POSITIONS {
            return Err(SpatialError::InvalidLayer {
                name,
                reason: format!(
                    "ring has {} positions, need at least {MIN_RING_POSITIONS}",
                    ring.len()
                ),
            });
        }
        if ring.iter().flatten().any(|v| !v.is_finite()) {
            return Err(SpatialError::InvalidLayer {
                name,
                reason: "ring coordinates must be finite".to_string(),
            });
        }
        Ok(Self { name, ring })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outer ring positions in document order
    pub fn ring(&self) -> &[[f64; 2]] {
        &self.ring
    }
}

/// Polygon Set Layer
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonSet {
    polygons: Vec<Polygon>,
    transform: Transform,
}

impl PolygonSet {
    /// Create a set from already-built polygons
    ///
    /// # Errors
    /// Returns `InvalidLayer` if two polygons share a name.
    pub fn from_polygons(polygons: Vec<Polygon>) -> Result<Self> {
        let mut seen = HashSet::new();
        for polygon in &polygons {
            if !seen.insert(polygon.name()) {
                return Err(SpatialError::InvalidLayer {
                    name: polygon.name().to_string(),
                    reason: "duplicate polygon name".to_string(),
                });
            }
        }
        Ok(Self {
            polygons,
            transform: Transform::identity(2),
        })
    }

    /// Parse a GeoJSON document of named polygons
    ///
    /// Accepts either a `GeometryCollection` whose geometries carry a `name`,
    /// or a `FeatureCollection` whose features carry `properties.name`.
    ///
    /// # Errors
    /// Returns `GeometryParse` if any geometry is not a `Polygon`, has a ring
    /// count other than one, or has malformed positions.
    pub fn from_geojson(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text).map_err(|e| SpatialError::GeometryParse {
            reason: format!("invalid JSON: {e}"),
        })?;

        let polygons = named_geometries(&doc)?
            .into_iter()
            .map(|(name, geometry)| parse_polygon(name, geometry))
            .collect::<Result<Vec<_>>>()?;

        debug!(count = polygons.len(), "Parsed polygon document");
        Self::from_polygons(polygons)
    }

    /// Attach an explicit transform into reference space
    pub fn with_transform(mut self, transform: Transform) -> Result<Self> {
        if transform.ndim() != 2 {
            return Err(SpatialError::DimensionMismatch {
                expected: 2,
                actual: transform.ndim(),
            });
        }
        self.transform = transform;
        Ok(self)
    }

    /// Number of polygons
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Look up a polygon by name
    pub fn get(&self, name: &str) -> Option<&Polygon> {
        self.polygons.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.polygons.iter().map(|p| p.name.as_str())
    }

    /// Total ring positions across all polygons
    pub fn vertex_count(&self) -> usize {
        self.polygons.iter().map(|p| p.ring.len()).sum()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

fn parse_error(reason: impl Into<String>) -> SpatialError {
    SpatialError::GeometryParse {
        reason: reason.into(),
    }
}

/// Collect `(name, geometry)` pairs from either collection flavor
fn named_geometries(doc: &Value) -> Result<Vec<(String, &Value)>> {
    let mut named = Vec::new();

    if let Some(geometries) = doc.get("geometries").and_then(Value::as_array) {
        for (i, geometry) in geometries.iter().enumerate() {
            let name = geometry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| parse_error(format!("geometry {i} has no 'name'")))?;
            named.push((name.to_string(), geometry));
        }
        return Ok(named);
    }

    if let Some(features) = doc.get("features").and_then(Value::as_array) {
        for (i, feature) in features.iter().enumerate() {
            let name = feature
                .get("properties")
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
                .ok_or_else(|| parse_error(format!("feature {i} has no 'properties.name'")))?;
            let geometry = feature
                .get("geometry")
                .ok_or_else(|| parse_error(format!("feature '{name}' has no geometry")))?;
            named.push((name.to_string(), geometry));
        }
        return Ok(named);
    }

    Err(parse_error(
        "document has neither 'geometries' nor 'features'",
    ))
}

fn parse_polygon(name: String, geometry: &Value) -> Result<Polygon> {
    let kind = geometry.get("type").and_then(Value::as_str).unwrap_or("<missing>");
    if kind != "Polygon" {
        return Err(parse_error(format!(
            "'{name}' has geometry type '{kind}', only 'Polygon' is supported"
        )));
    }

    let rings = geometry
        .get("coordinates")
        .and_then(Value::as_array)
        .ok_or_else(|| parse_error(format!("'{name}' has no coordinate array")))?;
    if rings.len() != 1 {
        return Err(parse_error(format!(
            "'{name}' has {} rings, expected exactly one outer ring",
            rings.len()
        )));
    }

    let positions = rings[0]
        .as_array()
        .ok_or_else(|| parse_error(format!("'{name}' ring is not an array")))?;
    let ring = positions
        .iter()
        .map(|p| parse_position(&name, p))
        .collect::<Result<Vec<_>>>()?;

    Polygon::new(name, ring).map_err(|e| parse_error(e.to_string()))
}

fn parse_position(name: &str, position: &Value) -> Result<[f64; 2]> {
    match position.as_array().map(Vec::as_slice) {
        Some([x, y]) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok([x, y]),
            _ => Err(parse_error(format!("'{name}' has a non-numeric position"))),
        },
        _ => Err(parse_error(format!(
            "'{name}' has a position that is not an [x, y] pair"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "GeometryCollection",
        "geometries": [
            {"type": "Polygon", "name": "Layer 1",
             "coordinates": [[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]]]},
            {"type": "Polygon", "name": "Layer 2/3",
             "coordinates": [[[4, 0], [8, 0], [8, 4], [4, 0]]]}
        ]
    }"#;

    #[test]
    fn test_parse_geometry_collection() {
        let set = PolygonSet::from_geojson(COLLECTION).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["Layer 1", "Layer 2/3"]);
        assert_eq!(set.get("Layer 1").unwrap().ring().len(), 5);
        assert_eq!(set.vertex_count(), 9);
        assert!(set.transform().is_identity());
    }

    #[test]
    fn test_parse_feature_collection() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"name": "cortex"},
                "geometry": {"type": "Polygon", "coordinates": [[[0.5, 0.5], [1.5, 0.5], [1.0, 2.0]]]}
            }]
        }"#;
        let set = PolygonSet::from_geojson(doc).unwrap();
        assert_eq!(set.get("cortex").unwrap().ring()[2], [1.0, 2.0]);
    }

    #[test]
    fn test_rejects_non_polygon() {
        let doc = r#"{"geometries": [
            {"type": "MultiPolygon", "name": "x", "coordinates": [[[[0, 0], [1, 0], [1, 1]]]]}
        ]}"#;
        let err = PolygonSet::from_geojson(doc).unwrap_err();
        assert!(matches!(err, SpatialError::GeometryParse { .. }));
    }

    #[test]
    fn test_rejects_holes() {
        let doc = r#"{"geometries": [
            {"type": "Polygon", "name": "donut", "coordinates": [
                [[0, 0], [9, 0], [9, 9], [0, 0]],
                [[1, 1], [2, 1], [2, 2], [1, 1]]
            ]}
        ]}"#;
        assert!(matches!(
            PolygonSet::from_geojson(doc),
            Err(SpatialError::GeometryParse { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_positions() {
        let doc = r#"{"geometries": [
            {"type": "Polygon", "name": "bad", "coordinates": [[[0, 0, 1], [1, 0, 1], [1, 1, 1]]]}
        ]}"#;
        assert!(PolygonSet::from_geojson(doc).is_err());

        let short = r#"{"geometries": [
            {"type": "Polygon", "name": "line", "coordinates": [[[0, 0], [1, 0]]]}
        ]}"#;
        assert!(matches!(
            PolygonSet::from_geojson(short),
            Err(SpatialError::GeometryParse { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let a = Polygon::new("a", vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]).unwrap();
        assert!(PolygonSet::from_polygons(vec![a.clone(), a]).is_err());
    }
}

//! Points Layer - Sparse Coordinate Sets
//!
//! N records, each with a D-dimensional coordinate (the `spatial` role) and
//! any number of positionally aligned attribute columns.

use std::collections::BTreeMap;

use super::column::{check_column_lengths, Column};
use crate::error::{Result, SpatialError};
use crate::transform::Transform;

/// Role name under which coordinates are stored
pub const SPATIAL_KEY: &str = "spatial";

/// Axis labels for up to three spatial dimensions
const POINT_AXES: [&str; 3] = ["x", "y", "z"];

/// Points Layer
#[derive(Debug, Clone, PartialEq)]
pub struct PointsLayer {
    /// Row-major `len x ndim` coordinates
    coordinates: Vec<f64>,
    ndim: usize,
    columns: BTreeMap<String, Column>,
    transform: Transform,
}

impl PointsLayer {
    /// Create a layer from one coordinate row per point
    ///
    /// # Errors
    /// Returns `InvalidLayer` for ragged rows, non-finite values or an
    /// unsupported axis count.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let ndim = match rows.first() {
            Some(first) => first.len(),
            None => 2,
        };
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ndim) {
            return Err(SpatialError::InvalidLayer {
                name: "points".to_string(),
                reason: format!("row {i} has {} axes, expected {ndim}", row.len()),
            });
        }
        Self::from_flat(rows.into_iter().flatten().collect(), ndim)
    }

    /// Create a layer from a flat row-major buffer
    pub fn from_flat(coordinates: Vec<f64>, ndim: usize) -> Result<Self> {
        if !(1..=POINT_AXES.len()).contains(&ndim) {
            return Err(SpatialError::InvalidLayer {
                name: "points".to_string(),
                reason: format!("points must have 1 to 3 axes, got {ndim}"),
            });
        }
        if coordinates.len() % ndim != 0 {
            return Err(SpatialError::InvalidLayer {
                name: "points".to_string(),
                reason: format!(
                    "{} values do not divide into {ndim}-D coordinates",
                    coordinates.len()
                ),
            });
        }
        if coordinates.iter().any(|v| !v.is_finite()) {
            return Err(SpatialError::InvalidLayer {
                name: "points".to_string(),
                reason: "coordinates must be finite".to_string(),
            });
        }

        Ok(Self {
            coordinates,
            ndim,
            columns: BTreeMap::new(),
            transform: Transform::identity(ndim),
        })
    }

    /// Attach an attribute column
    ///
    /// # Errors
    /// Returns `InvalidLayer` if the column length differs from the point
    /// count, the name collides with the coordinate role, or the name cannot
    /// be stored.
    pub fn with_column(mut self, name: &str, column: Column) -> Result<Self> {
        if name == SPATIAL_KEY {
            return Err(SpatialError::InvalidLayer {
                name: "points".to_string(),
                reason: format!("'{SPATIAL_KEY}' is reserved for coordinates"),
            });
        }
        let mut single = BTreeMap::new();
        single.insert(name.to_string(), column);
        check_column_lengths("points", &single, self.len())?;

        self.columns.extend(single);
        Ok(self)
    }

    /// Attach an explicit transform into reference space
    pub fn with_transform(mut self, transform: Transform) -> Result<Self> {
        if transform.ndim() != self.ndim {
            return Err(SpatialError::DimensionMismatch {
                expected: self.ndim,
                actual: transform.ndim(),
            });
        }
        self.transform = transform;
        Ok(self)
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.coordinates.len() / self.ndim
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Number of coordinate axes
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Axis labels, `x`, `y` and optionally `z`
    pub fn axes(&self) -> &'static [&'static str] {
        &POINT_AXES[..self.ndim]
    }

    /// Coordinate of point `i`
    pub fn coordinate(&self, i: usize) -> Option<&[f64]> {
        let start = i.checked_mul(self.ndim)?;
        self.coordinates.get(start..start + self.ndim)
    }

    /// Flat row-major coordinate buffer
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Attribute columns keyed by name
    pub fn columns(&self) -> &BTreeMap<String, Column> {
        &self.columns
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Coordinates mapped into reference space
    pub fn reference_coordinates(&self) -> Result<Vec<Vec<f64>>> {
        let affine = self.transform.to_affine()?;
        self.coordinates
            .chunks(self.ndim)
            .map(|c| affine.apply(c))
            .collect()
    }
}

//! Coordinate Transform Module
//!
//! Maps a layer's native pixel/measurement space into the dataset's
//! reference space:
//! - Identity, Translation, Scale and Affine primitives
//! - Ordered composition (`compose(a, b)` applies `a` then `b`)
//! - Reduction to a canonical [`AffineTransform`] for storage

mod affine;
mod alignment;

pub use affine::{AffineRecord, AffineTransform};
pub use alignment::AlignmentRecord;

use crate::error::{Result, SpatialError};

/// A coordinate transform between a layer's native space and reference space
///
/// Transforms are immutable values. Composition keeps the ordered history in
/// a `Sequence`; [`Transform::to_affine`] collapses it.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// No-op over `ndim` axes
    Identity { ndim: usize },
    /// Per-axis additive offset
    Translation(Vec<f64>),
    /// Per-axis multiplicative factor
    Scale(Vec<f64>),
    /// General matrix + offset
    Affine(AffineTransform),
    /// Ordered composition, applied first to last
    Sequence(Vec<Transform>),
}

impl Transform {
    /// Identity transform over `ndim` axes
    pub fn identity(ndim: usize) -> Self {
        Transform::Identity { ndim }
    }

    /// Create an N-axis translation
    ///
    /// # Errors
    /// Returns `InvalidTransform` for an empty vector or non-finite offsets.
    pub fn translation(offsets: Vec<f64>) -> Result<Self> {
        validate_vector("translation", &offsets)?;
        Ok(Transform::Translation(offsets))
    }

    /// Create an N-axis scale
    ///
    /// # Errors
    /// Returns `InvalidTransform` for an empty vector, non-finite or zero
    /// factors.
    pub fn scale(factors: Vec<f64>) -> Result<Self> {
        validate_vector("scale", &factors)?;
        if factors.iter().any(|f| *f == 0.0) {
            return Err(SpatialError::InvalidTransform {
                reason: "scale factors must be non-zero".to_string(),
            });
        }
        Ok(Transform::Scale(factors))
    }

    /// Number of axes this transform acts on
    pub fn ndim(&self) -> usize {
        match self {
            Transform::Identity { ndim } => *ndim,
            Transform::Translation(v) | Transform::Scale(v) => v.len(),
            Transform::Affine(affine) => affine.ndim(),
            Transform::Sequence(parts) => parts.first().map_or(0, Transform::ndim),
        }
    }

    /// Human-readable kind name
    pub fn kind(&self) -> &'static str {
        match self {
            Transform::Identity { .. } => "identity",
            Transform::Translation(_) => "translation",
            Transform::Scale(_) => "scale",
            Transform::Affine(_) => "affine",
            Transform::Sequence(_) => "sequence",
        }
    }

    /// Reduce to the canonical matrix + offset form
    pub fn to_affine(&self) -> Result<AffineTransform> {
        match self {
            Transform::Identity { ndim } => Ok(AffineTransform::identity(*ndim)),
            Transform::Translation(v) => Ok(AffineTransform::from_translation(v)),
            Transform::Scale(v) => Ok(AffineTransform::from_scale(v)),
            Transform::Affine(affine) => Ok(affine.clone()),
            Transform::Sequence(parts) => {
                let mut acc = AffineTransform::identity(self.ndim());
                for part in parts {
                    acc = acc.then(&part.to_affine()?)?;
                }
                Ok(acc)
            }
        }
    }

    /// Map one coordinate into reference space
    pub fn apply(&self, point: &[f64]) -> Result<Vec<f64>> {
        self.to_affine()?.apply(point)
    }

    /// Whether the transform leaves every coordinate unchanged
    pub fn is_identity(&self) -> bool {
        match self {
            Transform::Identity { .. } => true,
            other => other.to_affine().map(|a| a.is_identity()).unwrap_or(false),
        }
    }

    /// Build the image transform described by an alignment record
    ///
    /// Scale is applied before translation.
    pub fn from_alignment(record: &AlignmentRecord) -> Result<Self> {
        let scale = Transform::scale(record.scale().to_vec())?;
        let translation = Transform::translation(record.translation().to_vec())?;
        compose(scale, translation)
    }

    fn into_parts(self) -> Vec<Transform> {
        match self {
            Transform::Sequence(parts) => parts,
            Transform::Identity { .. } => Vec::new(),
            other => vec![other],
        }
    }
}

/// Compose two transforms: the result applies `first`, then `second`
///
/// Nested sequences are flattened and identities dropped, so composition is
/// associative in both mapping and representation.
///
/// # Errors
/// Returns `DimensionMismatch` if the operands act on different axis counts.
pub fn compose(first: Transform, second: Transform) -> Result<Transform> {
    let ndim = first.ndim();
    if second.ndim() != ndim {
        return Err(SpatialError::DimensionMismatch {
            expected: ndim,
            actual: second.ndim(),
        });
    }

    let mut parts = first.into_parts();
    parts.extend(second.into_parts());

    Ok(match parts.len() {
        0 => Transform::identity(ndim),
        1 => parts.remove(0),
        _ => Transform::Sequence(parts),
    })
}

fn validate_vector(kind: &str, values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(SpatialError::InvalidTransform {
            reason: format!("{kind} needs at least one axis"),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(SpatialError::InvalidTransform {
            reason: format!("{kind} values must be finite, got {values:?}"),
        });
    }
    Ok(())
}

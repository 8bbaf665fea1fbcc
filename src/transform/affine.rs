//! Canonical Affine Transform
//!
//! An affine map `x' = M x + o` over N spatial axes. Every transform kind
//! reduces to this form before it is persisted.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpatialError};

/// Tolerance used when checking the homogeneous row and identity
const HOMOGENEOUS_EPSILON: f64 = 1e-12;

/// Canonical matrix + offset representation of an affine map
#[derive(Debug, Clone, PartialEq)]
pub struct AffineTransform {
    linear: DMatrix<f64>,
    offset: DVector<f64>,
}

/// Serialized form of an affine transform (homogeneous, row-major)
///
/// Matches the `coordinateTransformations` entries of OME-NGFF:
/// ```json
/// {"type": "affine", "input_axes": ["x", "y"], "output_axes": ["x", "y"],
///  "affine": [[2, 0, 5], [0, 2, -3], [0, 0, 1]]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub input_axes: Vec<String>,
    pub output_axes: Vec<String>,
    pub affine: Vec<Vec<f64>>,
}

impl AffineTransform {
    /// Create an affine transform from a row-major linear part and an offset
    ///
    /// # Errors
    /// Returns `InvalidTransform` if the matrix is not square, does not match
    /// the offset length, or contains non-finite values.
    pub fn new(matrix: Vec<Vec<f64>>, offset: Vec<f64>) -> Result<Self> {
        let ndim = offset.len();
        if ndim == 0 {
            return Err(SpatialError::InvalidTransform {
                reason: "affine transform needs at least one axis".to_string(),
            });
        }
        if matrix.len() != ndim || matrix.iter().any(|row| row.len() != ndim) {
            return Err(SpatialError::InvalidTransform {
                reason: format!("affine matrix must be {ndim}x{ndim} to match the offset"),
            });
        }
        if matrix.iter().flatten().chain(offset.iter()).any(|v| !v.is_finite()) {
            return Err(SpatialError::InvalidTransform {
                reason: "affine parameters must be finite".to_string(),
            });
        }

        Ok(Self {
            linear: DMatrix::from_fn(ndim, ndim, |i, j| matrix[i][j]),
            offset: DVector::from_vec(offset),
        })
    }

    /// Identity map over `ndim` axes
    pub fn identity(ndim: usize) -> Self {
        Self {
            linear: DMatrix::identity(ndim, ndim),
            offset: DVector::zeros(ndim),
        }
    }

    /// Pure translation. Callers validate the vector.
    pub(crate) fn from_translation(translation: &[f64]) -> Self {
        let ndim = translation.len();
        Self {
            linear: DMatrix::identity(ndim, ndim),
            offset: DVector::from_column_slice(translation),
        }
    }

    /// Pure axis-aligned scale. Callers validate the vector.
    pub(crate) fn from_scale(scale: &[f64]) -> Self {
        Self {
            linear: DMatrix::from_diagonal(&DVector::from_column_slice(scale)),
            offset: DVector::zeros(scale.len()),
        }
    }

    /// Number of spatial axes
    pub fn ndim(&self) -> usize {
        self.offset.len()
    }

    /// Linear part `M`
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.linear
    }

    /// Offset part `o`
    pub fn offset(&self) -> &DVector<f64> {
        &self.offset
    }

    /// Transform that applies `self` first, then `next`
    pub fn then(&self, next: &AffineTransform) -> Result<AffineTransform> {
        if next.ndim() != self.ndim() {
            return Err(SpatialError::DimensionMismatch {
                expected: self.ndim(),
                actual: next.ndim(),
            });
        }

        Ok(AffineTransform {
            linear: &next.linear * &self.linear,
            offset: &next.linear * &self.offset + &next.offset,
        })
    }

    /// Map one coordinate into the output space
    pub fn apply(&self, point: &[f64]) -> Result<Vec<f64>> {
        if point.len() != self.ndim() {
            return Err(SpatialError::DimensionMismatch {
                expected: self.ndim(),
                actual: point.len(),
            });
        }

        let mapped = &self.linear * DVector::from_column_slice(point) + &self.offset;
        Ok(mapped.iter().copied().collect())
    }

    /// (N+1)x(N+1) homogeneous matrix
    pub fn to_homogeneous(&self) -> DMatrix<f64> {
        let n = self.ndim();
        let mut h = DMatrix::identity(n + 1, n + 1);
        h.view_mut((0, 0), (n, n)).copy_from(&self.linear);
        h.view_mut((0, n), (n, 1)).copy_from(&self.offset);
        h
    }

    /// Homogeneous matrix as row-major nested vectors
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        let h = self.to_homogeneous();
        (0..h.nrows())
            .map(|i| h.row(i).iter().copied().collect())
            .collect()
    }

    /// Parse a homogeneous row-major matrix
    ///
    /// # Errors
    /// Returns `InvalidTransform` if the matrix is not (N+1)x(N+1) or its last
    /// row is not `[0, ..., 0, 1]`.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let size = rows.len();
        if size < 2 || rows.iter().any(|row| row.len() != size) {
            return Err(SpatialError::InvalidTransform {
                reason: format!("homogeneous affine must be square with at least 2 rows, got {size} rows"),
            });
        }

        let n = size - 1;
        let last = &rows[n];
        let homogeneous = last[..n].iter().all(|v| v.abs() < HOMOGENEOUS_EPSILON)
            && (last[n] - 1.0).abs() < HOMOGENEOUS_EPSILON;
        if !homogeneous {
            return Err(SpatialError::InvalidTransform {
                reason: "last row of a homogeneous affine must be [0, ..., 0, 1]".to_string(),
            });
        }

        let matrix = rows[..n].iter().map(|row| row[..n].to_vec()).collect();
        let offset = rows[..n].iter().map(|row| row[n]).collect();
        Self::new(matrix, offset)
    }

    /// Whether this is the identity map
    pub fn is_identity(&self) -> bool {
        self.approx_eq(&Self::identity(self.ndim()), HOMOGENEOUS_EPSILON)
    }

    /// Element-wise comparison within `epsilon`
    pub fn approx_eq(&self, other: &AffineTransform, epsilon: f64) -> bool {
        self.ndim() == other.ndim()
            && self
                .linear
                .iter()
                .zip(other.linear.iter())
                .chain(self.offset.iter().zip(other.offset.iter()))
                .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    /// Serializable record naming the axes it maps between
    pub fn to_record(&self, axes: &[&str]) -> Result<AffineRecord> {
        if axes.len() != self.ndim() {
            return Err(SpatialError::DimensionMismatch {
                expected: self.ndim(),
                actual: axes.len(),
            });
        }

        let axes: Vec<String> = axes.iter().map(|a| a.to_string()).collect();
        Ok(AffineRecord {
            kind: "affine".to_string(),
            input_axes: axes.clone(),
            output_axes: axes,
            affine: self.to_rows(),
        })
    }

    /// Rebuild from a serialized record
    pub fn from_record(record: &AffineRecord) -> Result<Self> {
        if record.kind != "affine" {
            return Err(SpatialError::InvalidTransform {
                reason: format!("expected an 'affine' record, got '{}'", record.kind),
            });
        }
        let affine = Self::from_rows(&record.affine)?;
        if record.input_axes.len() != affine.ndim() {
            return Err(SpatialError::DimensionMismatch {
                expected: affine.ndim(),
                actual: record.input_axes.len(),
            });
        }
        Ok(affine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_rejects_non_square() {
        let result = AffineTransform::new(vec![vec![1.0, 0.0]], vec![0.0, 0.0]);
        assert!(matches!(result, Err(SpatialError::InvalidTransform { .. })));
    }

    #[test]
    fn test_new_rejects_non_finite() {
        let result = AffineTransform::new(
            vec![vec![1.0, f64::NAN], vec![0.0, 1.0]],
            vec![0.0, 0.0],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_then_applies_in_order() {
        let scale = AffineTransform::from_scale(&[2.0, 3.0]);
        let shift = AffineTransform::from_translation(&[1.0, -1.0]);

        let scale_then_shift = scale.then(&shift).unwrap();
        let shift_then_scale = shift.then(&scale).unwrap();

        assert_eq!(scale_then_shift.apply(&[1.0, 1.0]).unwrap(), vec![3.0, 2.0]);
        assert_eq!(shift_then_scale.apply(&[1.0, 1.0]).unwrap(), vec![4.0, 0.0]);
    }

    #[test]
    fn test_apply_dimension_mismatch() {
        let affine = AffineTransform::identity(2);
        let err = affine.apply(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            SpatialError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_homogeneous_rows_roundtrip() {
        let affine =
            AffineTransform::new(vec![vec![2.0, 0.5], vec![0.0, 2.0]], vec![5.0, -3.0]).unwrap();
        let rows = affine.to_rows();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![2.0, 0.5, 5.0]);
        assert_eq!(rows[2], vec![0.0, 0.0, 1.0]);

        let parsed = AffineTransform::from_rows(&rows).unwrap();
        assert!(parsed.approx_eq(&affine, 1e-12));
    }

    #[test]
    fn test_from_rows_rejects_bad_last_row() {
        let rows = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 1.0, 1.0],
        ];
        assert!(AffineTransform::from_rows(&rows).is_err());
    }

    #[test]
    fn test_record_roundtrip_through_json() {
        let affine = AffineTransform::from_scale(&[0.5, 0.25]);
        let record = affine.to_record(&["x", "y"]).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"affine\""));

        let parsed: AffineRecord = serde_json::from_str(&json).unwrap();
        let restored = AffineTransform::from_record(&parsed).unwrap();
        assert_relative_eq!(restored.matrix()[(1, 1)], 0.25);
        assert!(!restored.is_identity());
    }

    #[test]
    fn test_identity_detection() {
        assert!(AffineTransform::identity(3).is_identity());
        assert!(!AffineTransform::from_translation(&[0.0, 1e-3]).is_identity());
    }
}

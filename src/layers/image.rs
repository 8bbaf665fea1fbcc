//! Image Layer - Dense Raster Grid
//!
//! A 2D `[y, x]` or channel-last 3D `[y, x, c]` grid of pixels. The attached
//! transform maps pixel `(x, y)` indices into reference space.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpatialError};
use crate::transform::Transform;

/// Axes a raster transform acts on, in `(x, y)` order
pub const IMAGE_SPATIAL_AXES: [&str; 2] = ["x", "y"];

/// Pixel element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    UInt8,
    UInt16,
    Float32,
    Float64,
}

impl DType {
    /// Name used in summaries and store attributes
    pub fn name(&self) -> &'static str {
        match self {
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed, row-major pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub enum RasterData {
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl RasterData {
    /// Element type of the buffer
    pub fn dtype(&self) -> DType {
        match self {
            RasterData::UInt8(_) => DType::UInt8,
            RasterData::UInt16(_) => DType::UInt16,
            RasterData::Float32(_) => DType::Float32,
            RasterData::Float64(_) => DType::Float64,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            RasterData::UInt8(v) => v.len(),
            RasterData::UInt16(v) => v.len(),
            RasterData::Float32(v) => v.len(),
            RasterData::Float64(v) => v.len(),
        }
    }

    /// Whether the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Image Layer
///
/// Owns its pixels and exactly one transform. Without an explicit transform
/// the layer lives in reference space (identity).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayer {
    data: RasterData,
    shape: Vec<usize>,
    transform: Transform,
}

impl ImageLayer {
    /// Create an image from a row-major buffer and its shape
    ///
    /// # Errors
    /// Returns `InvalidLayer` if the shape is not 2D or 3D, has a zero-length
    /// axis, or does not match the buffer length.
    pub fn new(data: RasterData, shape: Vec<usize>) -> Result<Self> {
        if !(2..=3).contains(&shape.len()) {
            return Err(SpatialError::InvalidLayer {
                name: "image".to_string(),
                reason: format!("expected a 2D or 3D shape, got {shape:?}"),
            });
        }
        if shape.iter().any(|d| *d == 0) {
            return Err(SpatialError::InvalidLayer {
                name: "image".to_string(),
                reason: format!("shape {shape:?} has an empty axis"),
            });
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(SpatialError::InvalidLayer {
                name: "image".to_string(),
                reason: format!(
                    "shape {shape:?} needs {expected} pixels, buffer has {}",
                    data.len()
                ),
            });
        }

        Ok(Self {
            data,
            shape,
            transform: Transform::identity(IMAGE_SPATIAL_AXES.len()),
        })
    }

    /// Attach the pixel-to-reference transform
    ///
    /// # Errors
    /// Returns `DimensionMismatch` unless the transform acts on `(x, y)`.
    pub fn with_transform(mut self, transform: Transform) -> Result<Self> {
        if transform.ndim() != IMAGE_SPATIAL_AXES.len() {
            return Err(SpatialError::DimensionMismatch {
                expected: IMAGE_SPATIAL_AXES.len(),
                actual: transform.ndim(),
            });
        }
        self.transform = transform;
        Ok(self)
    }

    /// Pixel buffer
    pub fn data(&self) -> &RasterData {
        &self.data
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Grid shape in axis order
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Axis labels matching [`ImageLayer::shape`]
    pub fn axes(&self) -> &'static [&'static str] {
        if self.shape.len() == 3 {
            &["y", "x", "c"]
        } else {
            &["y", "x"]
        }
    }

    pub fn height(&self) -> usize {
        self.shape[0]
    }

    pub fn width(&self) -> usize {
        self.shape[1]
    }

    /// Number of channels (1 for 2D images)
    pub fn channels(&self) -> usize {
        self.shape.get(2).copied().unwrap_or(1)
    }

    /// Number of `(y, x)` grid positions
    pub fn pixel_count(&self) -> usize {
        self.height() * self.width()
    }

    /// Pixel-to-reference transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_2d() {
        let image = ImageLayer::new(RasterData::UInt8(vec![0; 12]), vec![3, 4]).unwrap();
        assert_eq!(image.height(), 3);
        assert_eq!(image.width(), 4);
        assert_eq!(image.channels(), 1);
        assert_eq!(image.axes(), &["y", "x"]);
        assert!(image.transform().is_identity());
    }

    #[test]
    fn test_new_3d_channel_last() {
        let image = ImageLayer::new(RasterData::Float32(vec![0.0; 24]), vec![2, 4, 3]).unwrap();
        assert_eq!(image.channels(), 3);
        assert_eq!(image.pixel_count(), 8);
        assert_eq!(image.dtype(), DType::Float32);
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        assert!(ImageLayer::new(RasterData::UInt16(vec![0; 5]), vec![2, 3]).is_err());
        assert!(ImageLayer::new(RasterData::UInt16(vec![]), vec![0, 3]).is_err());
        assert!(ImageLayer::new(RasterData::UInt16(vec![0; 2]), vec![2]).is_err());
    }

    #[test]
    fn test_with_transform_requires_2d() {
        let image = ImageLayer::new(RasterData::UInt8(vec![0; 4]), vec![2, 2]).unwrap();
        let bad = Transform::translation(vec![1.0, 2.0, 3.0]).unwrap();
        assert!(image.clone().with_transform(bad).is_err());

        let good = Transform::scale(vec![2.0, 2.0]).unwrap();
        let image = image.with_transform(good).unwrap();
        assert_eq!(image.transform().kind(), "scale");
    }
}

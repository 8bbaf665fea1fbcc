//! Input file readers
//!
//! Thin decoders for the upstream artifacts. Each file is read once, its
//! SHA-256 recorded for provenance, and its content handed to the builders.
//! No path discovery: every path is given explicitly.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::builder::{CellAnnotations, MoleculeDetections};
use crate::error::{Result, SpatialError};
use crate::layers::{
    check_node_name, Column, FeatureMatrix, ImageLayer, PolygonSet, RasterData,
};
use crate::transform::AlignmentRecord;

/// One input file read fully into memory
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    bytes: Vec<u8>,
    checksum: String,
}

impl SourceFile {
    /// Read a file and checksum it
    ///
    /// # Errors
    /// Returns `InputNotFound` if the path does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SpatialError::InputNotFound {
                path: path.to_path_buf(),
            },
            _ => SpatialError::Io(e),
        })?;
        let checksum = format!("{:x}", Sha256::digest(&bytes));
        debug!(path = %path.display(), bytes = bytes.len(), "Loaded input");

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            checksum,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used as the provenance key
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex SHA-256 of the content
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Content as UTF-8 text
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes).map_err(|e| self.parse_error(e))
    }

    fn parse_error(&self, reason: impl ToString) -> SpatialError {
        SpatialError::InputParse {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.bytes).map_err(|e| self.parse_error(e))
    }
}

#[derive(Debug, Deserialize)]
struct RawCells {
    #[serde(default)]
    var_names: Vec<String>,
    #[serde(rename = "X")]
    x: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    obs: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    obsm: BTreeMap<String, Embedding>,
}

/// Embeddings are either one row per cell or one scalar per cell
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Embedding {
    Rows(Vec<Vec<f64>>),
    Scalars(Vec<f64>),
}

impl Embedding {
    fn into_rows(self) -> Vec<Vec<f64>> {
        match self {
            Embedding::Rows(rows) => rows,
            Embedding::Scalars(values) => values.into_iter().map(|v| vec![v]).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMolecules {
    #[serde(rename = "X")]
    coordinates: Vec<Vec<f64>>,
    cell_type: Vec<String>,
}

/// Decode the per-cell annotation document
pub fn read_cells(source: &SourceFile) -> Result<CellAnnotations> {
    let raw: RawCells = source.json()?;

    let features = match raw.x {
        Some(rows) => Some(
            FeatureMatrix::new(raw.var_names, rows).map_err(|e| source.parse_error(e))?,
        ),
        None if raw.var_names.is_empty() => None,
        None => return Err(source.parse_error("'var_names' given without 'X'")),
    };

    let obs = raw
        .obs
        .into_iter()
        .map(|(name, values)| -> Result<(String, Column)> {
            check_node_name("cells", &name).map_err(|e| source.parse_error(e))?;
            let column = infer_column(&values)
                .ok_or_else(|| source.parse_error(format!("obs column '{name}' has mixed types")))?;
            Ok((name, column))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    let obsm = raw
        .obsm
        .into_iter()
        .map(|(name, embedding)| -> Result<(String, Vec<Vec<f64>>)> {
            check_node_name("cells", &name).map_err(|e| source.parse_error(e))?;
            Ok((name, embedding.into_rows()))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(CellAnnotations {
        features,
        obs,
        obsm,
    })
}

/// Integers, then floats, then strings (dictionary-encoded); mixed is `None`
fn infer_column(values: &[Value]) -> Option<Column> {
    if let Some(ints) = values.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
        return Some(Column::Int(ints));
    }
    if let Some(floats) = values.iter().map(Value::as_f64).collect::<Option<Vec<_>>>() {
        return Some(Column::Float(floats));
    }
    values
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<_>>>()
        .map(|labels| Column::categorical_from_labels(&labels[..]))
}

/// Decode the single-molecule detection document
pub fn read_molecules(source: &SourceFile) -> Result<MoleculeDetections> {
    let raw: RawMolecules = source.json()?;
    Ok(MoleculeDetections {
        coordinates: raw.coordinates,
        cell_types: raw.cell_type,
    })
}

/// Decode the alignment record
pub fn read_alignment(source: &SourceFile) -> Result<AlignmentRecord> {
    AlignmentRecord::from_json(source.text()?).map_err(|e| source.parse_error(e))
}

/// Decode the anatomical geometry document
///
/// Malformed geometry surfaces as `GeometryParse`, not `InputParse`.
pub fn read_geometry(source: &SourceFile) -> Result<PolygonSet> {
    PolygonSet::from_geojson(source.text()?)
}

/// Decode a PNG raster into a channel-last image layer
///
/// Grayscale decodes to `[y, x]`; gray+alpha, RGB and RGBA to `[y, x, c]`.
/// 16-bit PNGs keep their depth.
pub fn read_raster(source: &SourceFile) -> Result<ImageLayer> {
    let decoded = image::load_from_memory_with_format(&source.bytes, ImageFormat::Png)
        .map_err(|e| source.parse_error(e))?;
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);

    let (data, channels) = match decoded {
        DynamicImage::ImageLuma8(buf) => (RasterData::UInt8(buf.into_raw()), 1),
        DynamicImage::ImageLumaA8(buf) => (RasterData::UInt8(buf.into_raw()), 2),
        DynamicImage::ImageRgb8(buf) => (RasterData::UInt8(buf.into_raw()), 3),
        DynamicImage::ImageRgba8(buf) => (RasterData::UInt8(buf.into_raw()), 4),
        DynamicImage::ImageLuma16(buf) => (RasterData::UInt16(buf.into_raw()), 1),
        DynamicImage::ImageLumaA16(buf) => (RasterData::UInt16(buf.into_raw()), 2),
        DynamicImage::ImageRgb16(buf) => (RasterData::UInt16(buf.into_raw()), 3),
        DynamicImage::ImageRgba16(buf) => (RasterData::UInt16(buf.into_raw()), 4),
        other => (RasterData::Float32(other.to_rgba32f().into_raw()), 4),
    };

    let shape = if channels == 1 {
        vec![height, width]
    } else {
        vec![height, width, channels]
    };
    debug!(path = %source.path.display(), ?shape, dtype = %data.dtype(), "Decoded raster");
    ImageLayer::new(data, shape)
}

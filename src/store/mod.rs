//! Chunked Hierarchical Store
//!
//! Persists a [`SpatialDataset`](crate::dataset::SpatialDataset) as a Zarr v3
//! directory tree and reads it back:
//!
//! ```text
//! <store>/zarr.json                     root attributes (format, created_at, layers, provenance)
//! <store>/images/<name>/0               chunked raster
//! <store>/points/<name>/spatial         N x D coordinates
//! <store>/points/<name>/<column>        attribute columns
//! <store>/polygons/<name>/names         polygon names
//! <store>/polygons/<name>/ring_offsets  n + 1 offsets into coords
//! <store>/polygons/<name>/coords        M x 2 ring positions
//! <store>/table/X                       feature matrix, plus var_names, obs/ and obsm/
//! ```
//!
//! Every layer group records its canonical affine transform under
//! `coordinateTransformations`.

mod nodes;
mod reader;
mod writer;

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::layers::{DType, RegionMapping};
use crate::transform::AffineRecord;

pub use reader::{read, read_metadata};
pub use writer::write;

/// Store layout version written to the root group
pub const FORMAT_VERSION: &str = "0.1";

/// Default raster chunk edge, in pixels
pub const DEFAULT_CHUNK_SIZE: u64 = 256;

const IMAGES_GROUP: &str = "/images";
const POINTS_GROUP: &str = "/points";
const POLYGONS_GROUP: &str = "/polygons";
const TABLE_GROUP: &str = "/table";

/// Writer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Edge length of the square `(y, x)` raster chunks
    pub chunk_size: u64,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Root group attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub format_version: String,
    pub created_at: DateTime<Utc>,
    pub images: Vec<String>,
    pub points: Vec<String>,
    pub polygons: Vec<String>,
    /// Input name -> SHA-256 checksum
    #[serde(default)]
    pub provenance: BTreeMap<String, String>,
}

/// Files and bytes on disk for one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreInventory {
    pub file_count: usize,
    pub total_size_bytes: u64,
}

impl StoreInventory {
    /// Walk a store directory and total its files
    pub fn collect(path: &Path) -> crate::error::Result<Self> {
        let mut inventory = Self::default();
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                inventory.file_count += 1;
                inventory.total_size_bytes += entry.metadata().map_err(io::Error::from)?.len();
            }
        }
        Ok(inventory)
    }

    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageAttributes {
    axes: Vec<String>,
    dtype: DType,
    shape: Vec<usize>,
    #[serde(rename = "coordinateTransformations")]
    transforms: Vec<AffineRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointsAttributes {
    axes: Vec<String>,
    /// Column name -> column type
    columns: BTreeMap<String, String>,
    #[serde(rename = "coordinateTransformations")]
    transforms: Vec<AffineRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PolygonAttributes {
    count: usize,
    #[serde(rename = "coordinateTransformations")]
    transforms: Vec<AffineRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableAttributes {
    mapping_info: RegionMapping,
    n_rows: usize,
    /// Column name -> column type
    obs: BTreeMap<String, String>,
    obsm: Vec<String>,
}

//! Spatial Assembly - Multi-Modal Spatial Dataset Builder
//!
//! Gathers the artifacts of a spatial-omics experiment (a raster image, cell
//! and molecule point sets, anatomical polygons and a per-cell feature table)
//! into one dataset with a shared reference coordinate frame, and persists it
//! as a chunked hierarchical store.
//!
//! # Architecture
//!
//! - `transform`: coordinate transforms, composition and the canonical affine form
//! - `layers`: image, points, polygon set and table entities
//! - `builder`: raw upstream records to layers
//! - `dataset`: the assembled aggregate and its cross-layer checks
//! - `store`: destructive writer and round-trip reader
//! - `inputs`, `config`, `pipeline`, `cli`: the batch run around them

pub mod builder;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod inputs;
pub mod layers;
pub mod pipeline;
pub mod store;
pub mod transform;

pub use dataset::{LayerAlignment, LayerKind, SpatialDataset};
pub use error::{ErrorKind, Result, SpatialError};
pub use transform::{compose, Transform};

//! CLI Module
//!
//! Command-line interface for assembling and inspecting spatial stores.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{
    AssemblyConfig, DEFAULT_CELLS_FILE, DEFAULT_GEOMETRY_FILE, DEFAULT_IMAGE_FILE,
    DEFAULT_MOLECULES_FILE, DEFAULT_TRANSFORM_FILE,
};
use crate::store::DEFAULT_CHUNK_SIZE;

/// Spatial Assembly - build one registered store from multi-modal spatial data
#[derive(Parser, Debug)]
#[command(name = "spatial-assembly")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble the inputs and write a new store, replacing any existing one
    #[command(name = "assemble")]
    Assemble(AssembleArgs),

    /// Open an existing store and print its contents
    #[command(name = "inspect")]
    Inspect {
        /// Path to the store
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Directory holding the input files
    pub input_dir: PathBuf,

    /// Store destination (deleted first if it exists)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Per-cell annotation table
    #[arg(long, default_value = DEFAULT_CELLS_FILE)]
    pub cells: PathBuf,

    /// Single-molecule detections
    #[arg(long, default_value = DEFAULT_MOLECULES_FILE)]
    pub molecules: PathBuf,

    /// Raster image (PNG)
    #[arg(long, default_value = DEFAULT_IMAGE_FILE)]
    pub image: PathBuf,

    /// Image alignment record
    #[arg(long, default_value = DEFAULT_TRANSFORM_FILE)]
    pub image_transform: PathBuf,

    /// Anatomical geometry document
    #[arg(long, default_value = DEFAULT_GEOMETRY_FILE)]
    pub geometry: PathBuf,

    /// Raster chunk edge in pixels
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,
}

impl AssembleArgs {
    /// Resolve into a config; file names are relative to the input directory
    /// unless absolute
    pub fn assembly_config(&self) -> AssemblyConfig {
        AssemblyConfig {
            cells: self.input_dir.join(&self.cells),
            molecules: self.input_dir.join(&self.molecules),
            image: self.input_dir.join(&self.image),
            image_transform: self.input_dir.join(&self.image_transform),
            geometry: self.input_dir.join(&self.geometry),
            output: self.output.clone(),
            chunk_size: self.chunk_size,
        }
    }
}

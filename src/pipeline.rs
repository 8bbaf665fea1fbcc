//! End-to-end assembly
//!
//! Reads every configured input, builds the layers, assembles the dataset
//! and replaces the store.

use std::collections::BTreeMap;

use tracing::info;

use crate::builder::{
    build_cell_layers, build_molecule_layer, ANATOMY_LAYER, CELLS_LAYER, IMAGE_LAYER,
    MOLECULES_LAYER,
};
use crate::config::AssemblyConfig;
use crate::dataset::SpatialDataset;
use crate::error::Result;
use crate::inputs::{self, SourceFile};
use crate::store::{self, StoreInventory};
use crate::transform::Transform;

/// Read all inputs and assemble the dataset; no disk writes
pub fn assemble_inputs(config: &AssemblyConfig) -> Result<SpatialDataset> {
    let cells_file = SourceFile::load(&config.cells)?;
    let molecules_file = SourceFile::load(&config.molecules)?;
    let image_file = SourceFile::load(&config.image)?;
    let transform_file = SourceFile::load(&config.image_transform)?;
    let geometry_file = SourceFile::load(&config.geometry)?;

    let (table, cells) = build_cell_layers(inputs::read_cells(&cells_file)?)?;
    let molecules = build_molecule_layer(inputs::read_molecules(&molecules_file)?)?;
    let image = inputs::read_raster(&image_file)?;
    let alignment = Transform::from_alignment(&inputs::read_alignment(&transform_file)?)?;
    let anatomy = inputs::read_geometry(&geometry_file)?;

    let mut points = BTreeMap::new();
    points.insert(CELLS_LAYER.to_string(), cells);
    points.insert(MOLECULES_LAYER.to_string(), molecules);

    let mut images = BTreeMap::new();
    images.insert(IMAGE_LAYER.to_string(), image);
    let mut image_transforms = BTreeMap::new();
    image_transforms.insert(IMAGE_LAYER.to_string(), alignment);

    let mut polygons = BTreeMap::new();
    polygons.insert(ANATOMY_LAYER.to_string(), anatomy);

    let mut dataset =
        SpatialDataset::assemble(table, points, images, image_transforms, polygons)?;
    for source in [
        &cells_file,
        &molecules_file,
        &image_file,
        &transform_file,
        &geometry_file,
    ] {
        dataset.attach_provenance(source.name(), source.checksum());
    }
    Ok(dataset)
}

/// Validate, assemble and write in one call
///
/// `on_assembled` sees the dataset after every check has passed and before
/// the existing store is removed.
pub fn run<F>(
    config: &AssemblyConfig,
    on_assembled: F,
) -> Result<(SpatialDataset, StoreInventory)>
where
    F: FnOnce(&SpatialDataset),
{
    config.validate()?;
    let dataset = assemble_inputs(config)?;
    on_assembled(&dataset);
    info!(output = %config.output.display(), "Writing store");
    let inventory = store::write(&dataset, &config.output, &config.write_options())?;
    Ok((dataset, inventory))
}

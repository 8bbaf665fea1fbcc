//! Store Writer
//!
//! Replaces whatever sits at the destination with a freshly written store.
//! There is no merge mode and no cleanup of partially written stores.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use zarrs::filesystem::FilesystemStore;

use super::nodes::{write_array, write_column, write_group, write_whole, Store};
use super::{
    ImageAttributes, PointsAttributes, PolygonAttributes, StoreInventory, StoreMetadata,
    TableAttributes, WriteOptions, FORMAT_VERSION, IMAGES_GROUP, POINTS_GROUP, POLYGONS_GROUP,
    TABLE_GROUP,
};
use crate::dataset::SpatialDataset;
use crate::error::{Result, SpatialError};
use crate::layers::{
    ImageLayer, PointsLayer, PolygonSet, RasterData, Table, IMAGE_SPATIAL_AXES, SPATIAL_KEY,
};
use crate::transform::{AffineRecord, Transform};

/// Write a dataset to `path`, deleting any existing file or directory there
///
/// The deletion completes before the first node is written.
///
/// # Errors
/// - `StoreRemove` if the existing store cannot be deleted
/// - `StoreWrite` / `Io` for any failure while writing
pub fn write(dataset: &SpatialDataset, path: &Path, options: &WriteOptions) -> Result<StoreInventory> {
    remove_existing(path)?;
    fs::create_dir_all(path)?;

    let store: Store =
        Arc::new(FilesystemStore::new(path).map_err(|e| SpatialError::store_write("/", e))?);

    let metadata = StoreMetadata {
        format_version: FORMAT_VERSION.to_string(),
        created_at: Utc::now(),
        images: dataset.images().keys().cloned().collect(),
        points: dataset.points().keys().cloned().collect(),
        polygons: dataset.polygons().keys().cloned().collect(),
        provenance: dataset.provenance().clone(),
    };
    write_group(&store, "/", &metadata)?;

    write_group(&store, IMAGES_GROUP, &())?;
    for (name, image) in dataset.images() {
        write_image(&store, name, image, options.chunk_size)?;
    }

    write_group(&store, POINTS_GROUP, &())?;
    for (name, points) in dataset.points() {
        write_points(&store, name, points)?;
    }

    write_group(&store, POLYGONS_GROUP, &())?;
    for (name, polygons) in dataset.polygons() {
        write_polygons(&store, name, polygons)?;
    }

    write_table(&store, dataset.table())?;

    let inventory = StoreInventory::collect(path)?;
    info!(
        path = %path.display(),
        files = inventory.file_count,
        bytes = inventory.total_size_bytes,
        "Wrote spatial store"
    );
    Ok(inventory)
}

fn remove_existing(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(SpatialError::StoreRemove {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    warn!(path = %path.display(), "Removing existing store");
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|source| SpatialError::StoreRemove {
        path: path.to_path_buf(),
        source,
    })
}

fn transform_records(transform: &Transform, axes: &[&str]) -> Result<Vec<AffineRecord>> {
    Ok(vec![transform.to_affine()?.to_record(axes)?])
}

fn write_image(store: &Store, name: &str, image: &ImageLayer, chunk_size: u64) -> Result<()> {
    let group = format!("{IMAGES_GROUP}/{name}");
    write_group(
        store,
        &group,
        &ImageAttributes {
            axes: image.axes().iter().map(|a| a.to_string()).collect(),
            dtype: image.dtype(),
            shape: image.shape().to_vec(),
            transforms: transform_records(image.transform(), &IMAGE_SPATIAL_AXES)?,
        },
    )?;

    let shape: Vec<u64> = image.shape().iter().map(|&d| d as u64).collect();
    // Square (y, x) chunks, channels kept together
    let chunks: Vec<u64> = shape
        .iter()
        .enumerate()
        .map(|(axis, &d)| if axis < 2 { d.min(chunk_size) } else { d })
        .collect();

    let path = format!("{group}/0");
    match image.data() {
        RasterData::UInt8(v) => write_array(store, &path, v, &shape, &chunks)?,
        RasterData::UInt16(v) => write_array(store, &path, v, &shape, &chunks)?,
        RasterData::Float32(v) => write_array(store, &path, v, &shape, &chunks)?,
        RasterData::Float64(v) => write_array(store, &path, v, &shape, &chunks)?,
    }
    debug!(image = name, shape = ?image.shape(), chunks = ?chunks, "Wrote image");
    Ok(())
}

fn write_points(store: &Store, name: &str, points: &PointsLayer) -> Result<()> {
    let group = format!("{POINTS_GROUP}/{name}");
    write_group(
        store,
        &group,
        &PointsAttributes {
            axes: points.axes().iter().map(|a| a.to_string()).collect(),
            columns: points
                .columns()
                .iter()
                .map(|(k, c)| (k.clone(), c.type_name().to_string()))
                .collect(),
            transforms: transform_records(points.transform(), points.axes())?,
        },
    )?;

    write_whole(
        store,
        &format!("{group}/{SPATIAL_KEY}"),
        points.coordinates(),
        &[points.len() as u64, points.ndim() as u64],
    )?;
    for (column, values) in points.columns() {
        write_column(store, &group, column, values)?;
    }
    debug!(points = name, count = points.len(), "Wrote points");
    Ok(())
}

fn write_polygons(store: &Store, name: &str, polygons: &PolygonSet) -> Result<()> {
    let group = format!("{POLYGONS_GROUP}/{name}");
    write_group(
        store,
        &group,
        &PolygonAttributes {
            count: polygons.len(),
            transforms: transform_records(polygons.transform(), &IMAGE_SPATIAL_AXES)?,
        },
    )?;

    let names: Vec<String> = polygons.names().map(str::to_string).collect();
    let mut offsets = Vec::with_capacity(polygons.len() + 1);
    let mut coords: Vec<f64> = Vec::with_capacity(polygons.vertex_count() * 2);
    offsets.push(0i64);
    for polygon in polygons.polygons() {
        coords.extend(polygon.ring().iter().flatten());
        offsets.push((coords.len() / 2) as i64);
    }

    write_whole(store, &format!("{group}/names"), &names, &[names.len() as u64])?;
    write_whole(
        store,
        &format!("{group}/ring_offsets"),
        &offsets,
        &[offsets.len() as u64],
    )?;
    write_whole(
        store,
        &format!("{group}/coords"),
        &coords,
        &[(coords.len() / 2) as u64, 2],
    )?;
    debug!(polygons = name, count = polygons.len(), "Wrote polygons");
    Ok(())
}

fn write_table(store: &Store, table: &Table) -> Result<()> {
    write_group(
        store,
        TABLE_GROUP,
        &TableAttributes {
            mapping_info: table.mapping().clone(),
            n_rows: table.len(),
            obs: table
                .obs()
                .iter()
                .map(|(k, c)| (k.clone(), c.type_name().to_string()))
                .collect(),
            obsm: table.obsm().keys().cloned().collect(),
        },
    )?;

    let features = table.features();
    write_whole(
        store,
        &format!("{TABLE_GROUP}/X"),
        features.values(),
        &[features.n_rows() as u64, features.n_vars() as u64],
    )?;
    write_whole(
        store,
        &format!("{TABLE_GROUP}/var_names"),
        features.var_names(),
        &[features.n_vars() as u64],
    )?;

    let obs_group = format!("{TABLE_GROUP}/obs");
    write_group(store, &obs_group, &())?;
    for (column, values) in table.obs() {
        write_column(store, &obs_group, column, values)?;
    }

    let obsm_group = format!("{TABLE_GROUP}/obsm");
    write_group(store, &obsm_group, &())?;
    for (key, rows) in table.obsm() {
        let width = rows.first().map_or(0, Vec::len);
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        write_whole(
            store,
            &format!("{obsm_group}/{key}"),
            &flat,
            &[rows.len() as u64, width as u64],
        )?;
    }

    debug!(rows = table.len(), "Wrote table");
    Ok(())
}

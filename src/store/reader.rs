//! Store Reader
//!
//! Rebuilds a dataset from a store written by [`write`](super::write). Every
//! transform comes back in its canonical affine form (or identity).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use zarrs::filesystem::FilesystemStore;

use super::nodes::{read_array, read_column, read_group, read_rows, Store};
use super::{
    ImageAttributes, PointsAttributes, PolygonAttributes, StoreMetadata, TableAttributes,
    FORMAT_VERSION, IMAGES_GROUP, POINTS_GROUP, POLYGONS_GROUP, TABLE_GROUP,
};
use crate::dataset::SpatialDataset;
use crate::error::{Result, SpatialError};
use crate::layers::{
    DType, FeatureMatrix, ImageLayer, PointsLayer, Polygon, PolygonSet, RasterData, Table,
    SPATIAL_KEY,
};
use crate::transform::{AffineRecord, AffineTransform, Transform};

fn open_store(path: &Path) -> Result<Store> {
    if !path.is_dir() {
        return Err(SpatialError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let store = FilesystemStore::new(path).map_err(|e| SpatialError::store_read("/", e))?;
    Ok(Arc::new(store))
}

/// Read only the root attributes of a store
pub fn read_metadata(path: &Path) -> Result<StoreMetadata> {
    root_metadata(&open_store(path)?)
}

fn root_metadata(store: &Store) -> Result<StoreMetadata> {
    let metadata: StoreMetadata = read_group(store, "/")?;
    if metadata.format_version != FORMAT_VERSION {
        return Err(SpatialError::store_read(
            "/",
            format!(
                "unsupported store format '{}', expected '{FORMAT_VERSION}'",
                metadata.format_version
            ),
        ));
    }
    Ok(metadata)
}

/// Read a whole store back into a dataset
///
/// The dataset is re-assembled, so a store whose table no longer lines up
/// with its region layer fails exactly as it would at assembly.
pub fn read(path: &Path) -> Result<SpatialDataset> {
    let store = open_store(path)?;
    let metadata = root_metadata(&store)?;

    let mut images = BTreeMap::new();
    for name in &metadata.images {
        images.insert(name.clone(), read_image(&store, name)?);
    }
    let mut points = BTreeMap::new();
    for name in &metadata.points {
        points.insert(name.clone(), read_points(&store, name)?);
    }
    let mut polygons = BTreeMap::new();
    for name in &metadata.polygons {
        polygons.insert(name.clone(), read_polygons(&store, name)?);
    }
    let table = read_table(&store)?;

    let mut dataset = SpatialDataset::assemble(table, points, images, BTreeMap::new(), polygons)?;
    for (input, checksum) in metadata.provenance {
        dataset.attach_provenance(input, checksum);
    }

    info!(path = %path.display(), created_at = %metadata.created_at, "Read spatial store");
    Ok(dataset)
}

fn read_transform(node: &str, records: &[AffineRecord]) -> Result<Transform> {
    let record = match records {
        [record] => record,
        other => {
            return Err(SpatialError::store_read(
                node,
                format!("expected one coordinate transformation, found {}", other.len()),
            ))
        }
    };
    let affine = AffineTransform::from_record(record)?;
    if affine.is_identity() {
        Ok(Transform::identity(affine.ndim()))
    } else {
        Ok(Transform::Affine(affine))
    }
}

fn read_image(store: &Store, name: &str) -> Result<ImageLayer> {
    let group = format!("{IMAGES_GROUP}/{name}");
    let attrs: ImageAttributes = read_group(store, &group)?;

    let path = format!("{group}/0");
    let data = match attrs.dtype {
        DType::UInt8 => RasterData::UInt8(read_array(store, &path)?.0),
        DType::UInt16 => RasterData::UInt16(read_array(store, &path)?.0),
        DType::Float32 => RasterData::Float32(read_array(store, &path)?.0),
        DType::Float64 => RasterData::Float64(read_array(store, &path)?.0),
    };

    debug!(image = name, shape = ?attrs.shape, "Read image");
    ImageLayer::new(data, attrs.shape)?.with_transform(read_transform(&group, &attrs.transforms)?)
}

fn read_points(store: &Store, name: &str) -> Result<PointsLayer> {
    let group = format!("{POINTS_GROUP}/{name}");
    let attrs: PointsAttributes = read_group(store, &group)?;

    let (coordinates, _) = read_array::<f64>(store, &format!("{group}/{SPATIAL_KEY}"))?;
    let mut points = PointsLayer::from_flat(coordinates, attrs.axes.len())?;
    for (column, type_name) in &attrs.columns {
        points = points.with_column(column, read_column(store, &group, column, type_name)?)?;
    }

    debug!(points = name, count = points.len(), "Read points");
    points.with_transform(read_transform(&group, &attrs.transforms)?)
}

fn read_polygons(store: &Store, name: &str) -> Result<PolygonSet> {
    let group = format!("{POLYGONS_GROUP}/{name}");
    let attrs: PolygonAttributes = read_group(store, &group)?;

    let (names, _) = read_array::<String>(store, &format!("{group}/names"))?;
    let (offsets, _) = read_array::<i64>(store, &format!("{group}/ring_offsets"))?;
    let coords = read_rows(store, &format!("{group}/coords"))?;

    if names.len() != attrs.count || offsets.len() != names.len() + 1 {
        return Err(SpatialError::store_read(
            &group,
            format!(
                "{} names and {} offsets for {} polygons",
                names.len(),
                offsets.len(),
                attrs.count
            ),
        ));
    }

    let mut polygons = Vec::with_capacity(names.len());
    for (polygon_name, bounds) in names.into_iter().zip(offsets.windows(2)) {
        let (start, end) = (bounds[0] as usize, bounds[1] as usize);
        let ring = coords
            .get(start..end)
            .ok_or_else(|| {
                SpatialError::store_read(&group, format!("ring offsets {start}..{end} out of range"))
            })?
            .iter()
            .map(|row| match row.as_slice() {
                [x, y] => Ok([*x, *y]),
                _ => Err(SpatialError::store_read(&group, "coords must have two columns")),
            })
            .collect::<Result<Vec<_>>>()?;
        polygons.push(Polygon::new(polygon_name, ring)?);
    }

    debug!(polygons = name, count = polygons.len(), "Read polygons");
    PolygonSet::from_polygons(polygons)?.with_transform(read_transform(&group, &attrs.transforms)?)
}

fn read_table(store: &Store) -> Result<Table> {
    let attrs: TableAttributes = read_group(store, TABLE_GROUP)?;

    let (values, _) = read_array::<f64>(store, &format!("{TABLE_GROUP}/X"))?;
    let (var_names, _) = read_array::<String>(store, &format!("{TABLE_GROUP}/var_names"))?;
    let features = FeatureMatrix::from_flat(var_names, values, attrs.n_rows)?;

    let obs_group = format!("{TABLE_GROUP}/obs");
    let mut obs = BTreeMap::new();
    for (column, type_name) in &attrs.obs {
        obs.insert(
            column.clone(),
            read_column(store, &obs_group, column, type_name)?,
        );
    }

    let mut table = Table::new(features, obs, attrs.mapping_info)?;
    for key in &attrs.obsm {
        let rows = read_rows(store, &format!("{TABLE_GROUP}/obsm/{key}"))?;
        table = table.with_embedding(key, rows)?;
    }

    debug!(rows = table.len(), "Read table");
    Ok(table)
}

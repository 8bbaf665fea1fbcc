//! Layer Construction
//!
//! Turns raw, already-parsed upstream records into layer entities, applying
//! exactly the renames and drops that bind the feature table to the `cells`
//! points layer.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Result, SpatialError};
use crate::layers::{Column, FeatureMatrix, PointsLayer, PolygonSet, RegionMapping, Table};

/// Name of the per-cell region layer
pub const CELLS_LAYER: &str = "cells";
/// Name of the single-molecule points layer
pub const MOLECULES_LAYER: &str = "single_molecule";
/// Name of the registered raster layer
pub const IMAGE_LAYER: &str = "rasterized";
/// Name of the anatomical polygon layer
pub const ANATOMY_LAYER: &str = "anatomical";

/// Table column naming the region of each row
pub const REGION_KEY: &str = "regions_id";
/// Table/points column holding the dense instance id
pub const INSTANCE_KEY: &str = "cell_id";
/// Embedded coordinate array in raw cell annotations
pub const SPATIAL_EMBEDDING: &str = "spatial";
/// Embedded radius array in raw cell annotations
pub const RADIUS_EMBEDDING: &str = "region_radius";
/// Categorical molecule label column
pub const SPATIAL_TYPE_KEY: &str = "spatial_type";

/// Raw per-cell annotation table
///
/// Features and annotations are mixed with the embedded spatial arrays
/// (`spatial`, `region_radius`) exactly as the upstream segmentation emits
/// them.
#[derive(Debug, Clone, Default)]
pub struct CellAnnotations {
    pub features: Option<FeatureMatrix>,
    pub obs: BTreeMap<String, Column>,
    pub obsm: BTreeMap<String, Vec<Vec<f64>>>,
}

/// Raw single-molecule detections
#[derive(Debug, Clone, Default)]
pub struct MoleculeDetections {
    pub coordinates: Vec<Vec<f64>>,
    pub cell_types: Vec<String>,
}

/// Split raw cell annotations into the feature table and the `cells` layer
///
/// The table keeps every feature and annotation column except the spatial
/// embeddings, and gains `regions_id` and `cell_id`. The points layer holds
/// the coordinates, `region_radius` and the same dense `cell_id`.
///
/// # Errors
/// - `MissingColumn` if `spatial` or `region_radius` is absent
/// - `InvalidLayer` if radii are not one value per cell
/// - `RowCountMismatch` if table and points disagree on the cell count
pub fn build_cell_layers(raw: CellAnnotations) -> Result<(Table, PointsLayer)> {
    let CellAnnotations {
        features,
        mut obs,
        mut obsm,
    } = raw;

    let spatial = obsm
        .remove(SPATIAL_EMBEDDING)
        .ok_or_else(|| missing(SPATIAL_EMBEDDING))?;
    let radius_rows = obsm
        .remove(RADIUS_EMBEDDING)
        .ok_or_else(|| missing(RADIUS_EMBEDDING))?;

    let radius = radius_rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [r] => Ok(*r),
            other => Err(SpatialError::InvalidLayer {
                name: CELLS_LAYER.to_string(),
                reason: format!("row {i} has {} radius values, expected 1", other.len()),
            }),
        })
        .collect::<Result<Vec<f64>>>()?;

    let features = features.unwrap_or_else(|| FeatureMatrix::empty(spatial.len()));
    let n_cells = features.n_rows();

    let points = PointsLayer::new(spatial)?;
    for region_rows in [points.len(), radius.len()] {
        if region_rows != n_cells {
            return Err(SpatialError::RowCountMismatch {
                region: CELLS_LAYER.to_string(),
                table_rows: n_cells,
                region_rows,
            });
        }
    }
    let points = points
        .with_column(RADIUS_EMBEDDING, Column::Float(radius))?
        .with_column(INSTANCE_KEY, Column::dense_ids(n_cells))?;

    for key in [REGION_KEY, INSTANCE_KEY] {
        if obs.contains_key(key) {
            warn!(column = key, "Replacing existing annotation column");
        }
    }
    obs.insert(
        REGION_KEY.to_string(),
        Column::categorical_from_labels(&vec![CELLS_LAYER; n_cells][..]),
    );
    obs.insert(INSTANCE_KEY.to_string(), Column::dense_ids(n_cells));

    let mut table = Table::new(
        features,
        obs,
        RegionMapping::new(CELLS_LAYER, REGION_KEY, INSTANCE_KEY),
    )?;
    for (name, rows) in obsm {
        table = table.with_embedding(&name, rows)?;
    }

    debug!(
        cells = n_cells,
        features = table.features().n_vars(),
        "Split cell annotations into table and points"
    );
    Ok((table, points))
}

/// Build the `single_molecule` layer: coordinates plus a categorical label
///
/// No identity column is added; this layer is never joined against a table.
///
/// # Errors
/// Returns `RowCountMismatch` if labels and coordinates differ in length.
pub fn build_molecule_layer(raw: MoleculeDetections) -> Result<PointsLayer> {
    let points = PointsLayer::new(raw.coordinates)?;
    if raw.cell_types.len() != points.len() {
        return Err(SpatialError::RowCountMismatch {
            region: MOLECULES_LAYER.to_string(),
            table_rows: raw.cell_types.len(),
            region_rows: points.len(),
        });
    }

    let labels = Column::categorical_from_labels(&raw.cell_types[..]);
    debug!(molecules = points.len(), "Built molecule layer");
    points.with_column(SPATIAL_TYPE_KEY, labels)
}

/// Build the anatomical polygon layer from a GeoJSON document
pub fn build_polygon_layer(geojson: &str) -> Result<PolygonSet> {
    PolygonSet::from_geojson(geojson)
}

fn missing(column: &str) -> SpatialError {
    SpatialError::MissingColumn {
        column: column.to_string(),
        context: "cell annotations".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw_cells() -> CellAnnotations {
        let mut obs = BTreeMap::new();
        obs.insert("volume".to_string(), Column::Float(vec![10.0, 20.0, 15.0]));

        let mut obsm = BTreeMap::new();
        obsm.insert(
            SPATIAL_EMBEDDING.to_string(),
            vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]],
        );
        obsm.insert(
            RADIUS_EMBEDDING.to_string(),
            vec![vec![1.0], vec![2.0], vec![1.5]],
        );

        CellAnnotations {
            features: Some(
                FeatureMatrix::new(
                    vec!["Gad1".into(), "Sst".into()],
                    vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 1.0]],
                )
                .unwrap(),
            ),
            obs,
            obsm,
        }
    }

    #[test]
    fn test_build_cell_layers() {
        let (table, points) = build_cell_layers(raw_cells()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(points.len(), 3);
        assert_eq!(table.instance_ids(), &[0, 1, 2]);
        assert_eq!(points.column(INSTANCE_KEY), Some(&Column::dense_ids(3)));
        assert_eq!(
            points.column(RADIUS_EMBEDDING),
            Some(&Column::Float(vec![1.0, 2.0, 1.5]))
        );
        assert_eq!(points.coordinate(2), Some(&[2.0, 2.0][..]));

        assert!(table.obs().contains_key("volume"));
        assert!(table.obs().contains_key(REGION_KEY));
        assert!(!table.obs().contains_key(RADIUS_EMBEDDING));
        assert!(table.obsm().is_empty());
        assert_eq!(table.mapping().region, CELLS_LAYER);
    }

    #[test]
    fn test_extra_embeddings_stay_on_table() {
        let mut raw = raw_cells();
        raw.obsm
            .insert("X_umap".to_string(), vec![vec![0.0, 1.0]; 3]);
        let (table, _) = build_cell_layers(raw).unwrap();
        assert_eq!(table.obsm().keys().collect::<Vec<_>>(), vec!["X_umap"]);
    }

    #[test]
    fn test_missing_spatial_embedding() {
        let mut raw = raw_cells();
        raw.obsm.remove(SPATIAL_EMBEDDING);
        let err = build_cell_layers(raw).unwrap_err();
        assert!(matches!(err, SpatialError::MissingColumn { .. }));
    }

    #[test]
    fn test_row_count_mismatch_is_not_truncated() {
        let mut raw = raw_cells();
        raw.obsm.insert(
            SPATIAL_EMBEDDING.to_string(),
            vec![vec![0.0, 0.0], vec![1.0, 1.0]],
        );
        let err = build_cell_layers(raw).unwrap_err();
        assert!(matches!(
            err,
            SpatialError::RowCountMismatch {
                table_rows: 3,
                region_rows: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_multi_value_radius_rejected() {
        let mut raw = raw_cells();
        raw.obsm.insert(
            RADIUS_EMBEDDING.to_string(),
            vec![vec![1.0, 1.0], vec![2.0], vec![1.5]],
        );
        assert!(build_cell_layers(raw).is_err());
    }

    #[test]
    fn test_build_molecule_layer() {
        let points = build_molecule_layer(MoleculeDetections {
            coordinates: vec![vec![0.5, 0.5], vec![3.0, 1.0]],
            cell_types: vec!["Excitatory".into(), "Inhibitory".into()],
        })
        .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points.columns().len(), 1);
        assert_eq!(
            points.column(SPATIAL_TYPE_KEY).and_then(|c| c.label(1)),
            Some("Inhibitory")
        );
        assert!(points.column(INSTANCE_KEY).is_none());
    }

    #[test]
    fn test_molecule_label_mismatch() {
        let result = build_molecule_layer(MoleculeDetections {
            coordinates: vec![vec![0.5, 0.5]],
            cell_types: vec![],
        });
        assert!(matches!(result, Err(SpatialError::RowCountMismatch { .. })));
    }
}

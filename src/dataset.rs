//! Spatial Dataset
//!
//! The aggregate root: one table plus name-keyed points, image and polygon
//! layers. Lookups are always kind-qualified, so the same name may appear
//! under two kinds.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::error::{Result, SpatialError};
use crate::layers::{
    check_dense_ids, check_node_name, ImageLayer, PointsLayer, PolygonSet, Table,
};
use crate::transform::Transform;

/// Layer kind, used in diagnostics and alignment reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerKind {
    Image,
    Points,
    Polygons,
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Image => "image",
            LayerKind::Points => "points",
            LayerKind::Polygons => "polygons",
        }
    }
}

/// Registration status of one layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerAlignment {
    pub kind: LayerKind,
    pub name: String,
    /// Transform kind attached to the layer
    pub transform_kind: &'static str,
    /// True when the layer is assumed to already live in reference space
    pub identity: bool,
}

/// Multi-modal spatial dataset
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialDataset {
    table: Table,
    points: BTreeMap<String, PointsLayer>,
    images: BTreeMap<String, ImageLayer>,
    polygons: BTreeMap<String, PolygonSet>,
    provenance: BTreeMap<String, String>,
}

impl SpatialDataset {
    /// Assemble a dataset and check its cross-layer invariants
    ///
    /// `image_transforms` are attached to the images of the same name; images
    /// without an entry keep their existing transform.
    ///
    /// # Errors
    /// - `InvalidLayer` if a layer name cannot be used as a store node
    /// - `UnknownLayer` if a transform names an image that does not exist
    /// - `DimensionMismatch` if a transform does not act on `(x, y)`
    /// - `UnresolvedRegion` if the table's region names no points or polygon layer
    /// - `RowCountMismatch` / `InstanceIdMismatch` if the table and its region
    ///   layer are not aligned row for row
    pub fn assemble(
        table: Table,
        points: BTreeMap<String, PointsLayer>,
        mut images: BTreeMap<String, ImageLayer>,
        image_transforms: BTreeMap<String, Transform>,
        polygons: BTreeMap<String, PolygonSet>,
    ) -> Result<Self> {
        let layer_names = images
            .keys()
            .map(|n| (LayerKind::Image, n))
            .chain(points.keys().map(|n| (LayerKind::Points, n)))
            .chain(polygons.keys().map(|n| (LayerKind::Polygons, n)));
        for (kind, name) in layer_names {
            check_node_name(kind.name(), name)?;
        }

        for (name, transform) in image_transforms {
            let image = images.remove(&name).ok_or_else(|| SpatialError::UnknownLayer {
                kind: LayerKind::Image.name(),
                name: name.clone(),
            })?;
            debug!(image = %name, kind = transform.kind(), "Attaching image transform");
            images.insert(name, image.with_transform(transform)?);
        }

        let dataset = Self {
            table,
            points,
            images,
            polygons,
            provenance: BTreeMap::new(),
        };
        dataset.check_region_alignment()?;

        info!(
            images = dataset.images.len(),
            points = dataset.points.len(),
            polygons = dataset.polygons.len(),
            table_rows = dataset.table.len(),
            "Assembled spatial dataset"
        );
        Ok(dataset)
    }

    /// Table rows must match the region layer row for row
    fn check_region_alignment(&self) -> Result<()> {
        let mapping = self.table.mapping();
        let region = mapping.region.as_str();

        let region_rows = if let Some(points) = self.points.get(region) {
            if let Some(column) = points.column(&mapping.instance_key) {
                let ids = column.as_int().ok_or_else(|| SpatialError::InstanceIdMismatch {
                    region: region.to_string(),
                    row: 0,
                    reason: format!("region column '{}' is not int64", mapping.instance_key),
                })?;
                check_dense_ids(region, ids)?;
            }
            points.len()
        } else if let Some(polygons) = self.polygons.get(region) {
            polygons.len()
        } else {
            return Err(SpatialError::UnresolvedRegion {
                region: region.to_string(),
            });
        };

        if region_rows != self.table.len() {
            return Err(SpatialError::RowCountMismatch {
                region: region.to_string(),
                table_rows: self.table.len(),
                region_rows,
            });
        }
        Ok(())
    }

    /// Record where an input came from (e.g. file name -> checksum)
    pub fn attach_provenance(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.provenance.insert(key.into(), value.into());
    }

    pub fn provenance(&self) -> &BTreeMap<String, String> {
        &self.provenance
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn points(&self) -> &BTreeMap<String, PointsLayer> {
        &self.points
    }

    pub fn images(&self) -> &BTreeMap<String, ImageLayer> {
        &self.images
    }

    pub fn polygons(&self) -> &BTreeMap<String, PolygonSet> {
        &self.polygons
    }

    pub fn points_layer(&self, name: &str) -> Option<&PointsLayer> {
        self.points.get(name)
    }

    pub fn image(&self, name: &str) -> Option<&ImageLayer> {
        self.images.get(name)
    }

    pub fn polygon_set(&self, name: &str) -> Option<&PolygonSet> {
        self.polygons.get(name)
    }

    /// Per-layer registration status
    ///
    /// Layers reported with `identity: true` are only assumed to share the
    /// reference frame; nothing in the data verifies it.
    pub fn alignment_report(&self) -> Vec<LayerAlignment> {
        let images = self
            .images
            .iter()
            .map(|(n, l)| (LayerKind::Image, n, l.transform()));
        let points = self
            .points
            .iter()
            .map(|(n, l)| (LayerKind::Points, n, l.transform()));
        let polygons = self
            .polygons
            .iter()
            .map(|(n, l)| (LayerKind::Polygons, n, l.transform()));

        images
            .chain(points)
            .chain(polygons)
            .map(|(kind, name, transform)| LayerAlignment {
                kind,
                name: name.clone(),
                transform_kind: transform.kind(),
                identity: transform.is_identity(),
            })
            .collect()
    }

    /// Layers with no explicit registration into reference space
    pub fn unregistered_layers(&self) -> Vec<LayerAlignment> {
        self.alignment_report()
            .into_iter()
            .filter(|a| a.identity)
            .collect()
    }
}

impl fmt::Display for SpatialDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SpatialDataset object with:")?;

        writeln!(f, "├── Images ({})", self.images.len())?;
        for (name, image) in &self.images {
            writeln!(
                f,
                "│     └── '{}': {} [{}] {:?}, transform: {}",
                name,
                image.dtype(),
                image.axes().join(", "),
                image.shape(),
                image.transform().kind()
            )?;
        }

        writeln!(f, "├── Points ({})", self.points.len())?;
        for (name, points) in &self.points {
            let columns: Vec<&str> = points.columns().keys().map(String::as_str).collect();
            writeln!(
                f,
                "│     └── '{}': {} points, {}D, columns [{}]",
                name,
                points.len(),
                points.ndim(),
                columns.join(", ")
            )?;
        }

        writeln!(f, "├── Polygons ({})", self.polygons.len())?;
        for (name, polygons) in &self.polygons {
            let names: Vec<&str> = polygons.names().collect();
            writeln!(
                f,
                "│     └── '{}': {} polygons, {} vertices [{}]",
                name,
                polygons.len(),
                polygons.vertex_count(),
                names.join(", ")
            )?;
        }

        let mapping = self.table.mapping();
        writeln!(f, "└── Table")?;
        write!(
            f,
            "      └── {} x {} features, region '{}' (region key '{}', instance key '{}')",
            self.table.len(),
            self.table.features().n_vars(),
            mapping.region,
            mapping.region_key,
            mapping.instance_key
        )
    }
}

//! Layer Model Module
//!
//! The four kinds of spatial data a dataset is composed of:
//! - Image: dense raster grid
//! - Points: sparse coordinates with attribute columns
//! - PolygonSet: named vector geometry
//! - Table: feature matrix bound to a region layer

mod column;
mod image;
mod points;
mod polygons;
mod table;

pub use column::Column;
pub use image::{DType, ImageLayer, RasterData, IMAGE_SPATIAL_AXES};
pub use points::{PointsLayer, SPATIAL_KEY};
pub use polygons::{Polygon, PolygonSet};
pub use table::{FeatureMatrix, RegionMapping, Table};

pub(crate) use column::check_node_name;
pub(crate) use table::check_dense_ids;

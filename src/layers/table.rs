//! Table - Per-Instance Feature Matrix
//!
//! One row per annotated instance of a region layer. The region mapping is a
//! declared foreign key: `instance_key` rows are the dense enumeration
//! `0..n` aligned with the region layer's rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::column::{check_column_lengths, check_node_name, Column};
use crate::error::{Result, SpatialError};

/// Declares which region layer a table annotates and through which columns
///
/// Serialized as the table's `mapping_info` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMapping {
    /// Name of the points or polygon layer the rows annotate
    #[serde(rename = "regions")]
    pub region: String,
    /// Column holding the region name for every row
    #[serde(rename = "regions_key")]
    pub region_key: String,
    /// Column holding the per-row instance id
    pub instance_key: String,
}

impl RegionMapping {
    pub fn new(region: &str, region_key: &str, instance_key: &str) -> Self {
        Self {
            region: region.to_string(),
            region_key: region_key.to_string(),
            instance_key: instance_key.to_string(),
        }
    }
}

/// Dense row-major feature matrix with named variables
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    var_names: Vec<String>,
    values: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Create a matrix from one row of values per instance
    ///
    /// # Errors
    /// Returns `InvalidLayer` if any row length differs from `var_names`.
    pub fn new(var_names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_vars = var_names.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_vars) {
            return Err(SpatialError::InvalidLayer {
                name: "table".to_string(),
                reason: format!("feature row {i} has {} values, expected {n_vars}", row.len()),
            });
        }
        let n_rows = rows.len();
        Ok(Self {
            var_names,
            values: rows.into_iter().flatten().collect(),
            n_rows,
        })
    }

    /// Create a matrix from a flat row-major buffer
    pub fn from_flat(var_names: Vec<String>, values: Vec<f64>, n_rows: usize) -> Result<Self> {
        if values.len() != n_rows * var_names.len() {
            return Err(SpatialError::InvalidLayer {
                name: "table".to_string(),
                reason: format!(
                    "{} feature values do not fill {n_rows} x {}",
                    values.len(),
                    var_names.len()
                ),
            });
        }
        Ok(Self {
            var_names,
            values,
            n_rows,
        })
    }

    /// Matrix with rows but no feature variables
    pub fn empty(n_rows: usize) -> Self {
        Self {
            var_names: Vec::new(),
            values: Vec::new(),
            n_rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_vars(&self) -> usize {
        self.var_names.len()
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    /// Flat row-major values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values of row `i`
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i >= self.n_rows {
            return None;
        }
        let n = self.n_vars();
        Some(&self.values[i * n..(i + 1) * n])
    }
}

/// Table annotating the instances of one region layer
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    features: FeatureMatrix,
    obs: BTreeMap<String, Column>,
    obsm: BTreeMap<String, Vec<Vec<f64>>>,
    mapping: RegionMapping,
}

impl Table {
    /// Create a table and check its region mapping columns
    ///
    /// # Errors
    /// - `InvalidLayer` if an annotation column length differs from the row
    ///   count, or a column name cannot be stored
    /// - `MissingColumn` if the region or instance column is absent
    /// - `InstanceIdMismatch` if instance ids are not exactly `0..n`, or a
    ///   row names a region other than the mapped one
    pub fn new(
        features: FeatureMatrix,
        obs: BTreeMap<String, Column>,
        mapping: RegionMapping,
    ) -> Result<Self> {
        let n_rows = features.n_rows();
        check_column_lengths("table", &obs, n_rows)?;

        let instance = obs
            .get(&mapping.instance_key)
            .ok_or_else(|| SpatialError::MissingColumn {
                column: mapping.instance_key.clone(),
                context: "table".to_string(),
            })?;
        let ids = instance.as_int().ok_or_else(|| SpatialError::InstanceIdMismatch {
            region: mapping.region.clone(),
            row: 0,
            reason: format!(
                "instance column '{}' must be int64, got {}",
                mapping.instance_key,
                instance.type_name()
            ),
        })?;
        check_dense_ids(&mapping.region, ids)?;

        let region_column =
            obs.get(&mapping.region_key)
                .ok_or_else(|| SpatialError::MissingColumn {
                    column: mapping.region_key.clone(),
                    context: "table".to_string(),
                })?;
        for row in 0..n_rows {
            let label = region_column.label(row);
            if label != Some(mapping.region.as_str()) {
                return Err(SpatialError::InstanceIdMismatch {
                    region: mapping.region.clone(),
                    row,
                    reason: format!("region column names {label:?}"),
                });
            }
        }

        Ok(Self {
            features,
            obs,
            obsm: BTreeMap::new(),
            mapping,
        })
    }

    /// Attach a per-row multi-dimensional embedding (e.g. a PCA projection)
    pub fn with_embedding(mut self, name: &str, rows: Vec<Vec<f64>>) -> Result<Self> {
        check_node_name("table", name)?;
        if rows.len() != self.len() {
            return Err(SpatialError::InvalidLayer {
                name: "table".to_string(),
                reason: format!(
                    "embedding '{name}' has {} rows, expected {}",
                    rows.len(),
                    self.len()
                ),
            });
        }
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return Err(SpatialError::InvalidLayer {
                name: "table".to_string(),
                reason: format!("embedding '{name}' has ragged rows"),
            });
        }
        self.obsm.insert(name.to_string(), rows);
        Ok(self)
    }

    /// Number of rows (instances)
    pub fn len(&self) -> usize {
        self.features.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    /// Per-row annotation columns, including the mapping columns
    pub fn obs(&self) -> &BTreeMap<String, Column> {
        &self.obs
    }

    /// Per-row embeddings keyed by name
    pub fn obsm(&self) -> &BTreeMap<String, Vec<Vec<f64>>> {
        &self.obsm
    }

    pub fn mapping(&self) -> &RegionMapping {
        &self.mapping
    }

    /// Instance ids, always `0..len()`
    pub fn instance_ids(&self) -> &[i64] {
        self.obs
            .get(&self.mapping.instance_key)
            .and_then(Column::as_int)
            .unwrap_or(&[])
    }
}

/// Check that `ids` is exactly `0..ids.len()`
pub(crate) fn check_dense_ids(region: &str, ids: &[i64]) -> Result<()> {
    match ids.iter().enumerate().find(|(i, id)| **id != *i as i64) {
        Some((row, id)) => Err(SpatialError::InstanceIdMismatch {
            region: region.to_string(),
            row,
            reason: format!("expected id {row}, found {id}"),
        }),
        None => Ok(()),
    }
}

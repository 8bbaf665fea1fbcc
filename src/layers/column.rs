//! Typed Columns
//!
//! Schema-described per-row attributes shared by points layers and tables.

use std::collections::BTreeMap;

use crate::error::{Result, SpatialError};

/// One named, positionally aligned attribute column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// 64-bit floating point values
    Float(Vec<f64>),
    /// 64-bit signed integers
    Int(Vec<i64>),
    /// Free-form strings
    Str(Vec<String>),
    /// Dictionary-encoded labels
    Categorical {
        codes: Vec<i32>,
        categories: Vec<String>,
    },
}

impl Column {
    /// Create a categorical column, checking every code against the categories
    pub fn categorical(codes: Vec<i32>, categories: Vec<String>) -> Result<Self> {
        if let Some(bad) = codes
            .iter()
            .find(|c| **c < 0 || **c as usize >= categories.len())
        {
            return Err(SpatialError::InvalidLayer {
                name: "categorical".to_string(),
                reason: format!("code {bad} out of range for {} categories", categories.len()),
            });
        }
        Ok(Column::Categorical { codes, categories })
    }

    /// Dictionary-encode labels; categories are sorted and unique
    pub fn categorical_from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut categories: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        categories.sort();
        categories.dedup();

        let index: BTreeMap<&str, i32> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i as i32))
            .collect();
        let codes = labels.iter().map(|l| index[l.as_ref()]).collect();

        Column::Categorical { codes, categories }
    }

    /// Dense `0..n` identity column
    pub fn dense_ids(n: usize) -> Self {
        Column::Int((0..n as i64).collect())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type name used in summaries and store attributes
    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Float(_) => "float64",
            Column::Int(_) => "int64",
            Column::Str(_) => "string",
            Column::Categorical { .. } => "categorical",
        }
    }

    /// Integer values, if this is an integer column
    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            Column::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Decoded label for row `i` of a string or categorical column
    pub fn label(&self, i: usize) -> Option<&str> {
        match self {
            Column::Str(v) => v.get(i).map(String::as_str),
            Column::Categorical { codes, categories } => codes
                .get(i)
                .and_then(|c| categories.get(*c as usize))
                .map(String::as_str),
            _ => None,
        }
    }
}

/// Check that every column in `columns` has exactly `expected` rows
/// Column and layer names become store node paths: non-empty, no `/`, no
/// `__` prefix
pub(crate) fn check_node_name(owner: &str, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty".to_string()
    } else if name.contains('/') {
        format!("name '{name}' contains '/'")
    } else if name.starts_with("__") {
        format!("name '{name}' uses the reserved '__' prefix")
    } else {
        return Ok(());
    };
    Err(SpatialError::InvalidLayer {
        name: owner.to_string(),
        reason,
    })
}

pub(crate) fn check_column_lengths(
    owner: &str,
    columns: &BTreeMap<String, Column>,
    expected: usize,
) -> Result<()> {
    for (name, column) in columns {
        check_node_name(owner, name)?;
        if column.len() != expected {
            return Err(SpatialError::InvalidLayer {
                name: owner.to_string(),
                reason: format!(
                    "column '{name}' has {} rows, expected {expected}",
                    column.len()
                ),
            });
        }
    }
    Ok(())
}

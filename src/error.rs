//! Error handling for spatial assembly
//!
//! Every error belongs to one of four kinds (validation, parse, consistency,
//! I/O). None of them is recovered locally: the run aborts and the operator
//! reruns after fixing the cause.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for spatial assembly operations
pub type Result<T> = std::result::Result<T, SpatialError>;

/// Broad category of a [`SpatialError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed transform parameters, shapes or dimensionality
    Validation,
    /// Geometry or input documents that cannot be interpreted
    Parse,
    /// Table/region row count or identity mismatch
    Consistency,
    /// Filesystem or store failures
    Io,
}

/// Main error type for spatial assembly operations
#[derive(Error, Debug)]
pub enum SpatialError {
    // Validation Errors
    #[error("Invalid transform: {reason}")]
    InvalidTransform { reason: String },

    #[error("Dimension mismatch: expected {expected} axes, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid layer '{name}': {reason}")]
    InvalidLayer { name: String, reason: String },

    #[error("Unknown {kind} layer: '{name}'")]
    UnknownLayer { kind: &'static str, name: String },

    #[error("Missing required column '{column}' in {context}")]
    MissingColumn { column: String, context: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Parse Errors
    #[error("Geometry parse error: {reason}")]
    GeometryParse { reason: String },

    #[error("Failed to parse input {path}: {reason}")]
    InputParse { path: PathBuf, reason: String },

    // Consistency Errors
    #[error("Row count mismatch: table has {table_rows} rows but region '{region}' has {region_rows}")]
    RowCountMismatch {
        region: String,
        table_rows: usize,
        region_rows: usize,
    },

    #[error("Instance id mismatch for region '{region}' at row {row}: {reason}")]
    InstanceIdMismatch {
        region: String,
        row: usize,
        reason: String,
    },

    #[error("Table region '{region}' does not resolve to a points or polygon layer")]
    UnresolvedRegion { region: String },

    // I/O Errors
    #[error("Failed to remove existing store {path}: {source}")]
    StoreRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store write failed at {node}: {reason}")]
    StoreWrite { node: String, reason: String },

    #[error("Store read failed at {node}: {reason}")]
    StoreRead { node: String, reason: String },

    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpatialError {
    /// Build a [`SpatialError::StoreWrite`] from any displayable store error
    pub fn store_write(node: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SpatialError::StoreWrite {
            node: node.into(),
            reason: err.to_string(),
        }
    }

    /// Build a [`SpatialError::StoreRead`] from any displayable store error
    pub fn store_read(node: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SpatialError::StoreRead {
            node: node.into(),
            reason: err.to_string(),
        }
    }

    /// Get the broad category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpatialError::InvalidTransform { .. }
            | SpatialError::DimensionMismatch { .. }
            | SpatialError::InvalidLayer { .. }
            | SpatialError::UnknownLayer { .. }
            | SpatialError::MissingColumn { .. }
            | SpatialError::InvalidConfig { .. } => ErrorKind::Validation,
            SpatialError::GeometryParse { .. }
            | SpatialError::InputParse { .. }
            | SpatialError::Serialization(_) => ErrorKind::Parse,
            SpatialError::RowCountMismatch { .. }
            | SpatialError::InstanceIdMismatch { .. }
            | SpatialError::UnresolvedRegion { .. } => ErrorKind::Consistency,
            SpatialError::StoreRemove { .. }
            | SpatialError::StoreWrite { .. }
            | SpatialError::StoreRead { .. }
            | SpatialError::InputNotFound { .. }
            | SpatialError::Io(_) => ErrorKind::Io,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SpatialError::InvalidTransform { .. } => "INVALID_TRANSFORM",
            SpatialError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            SpatialError::InvalidLayer { .. } => "INVALID_LAYER",
            SpatialError::UnknownLayer { .. } => "UNKNOWN_LAYER",
            SpatialError::MissingColumn { .. } => "MISSING_COLUMN",
            SpatialError::InvalidConfig { .. } => "INVALID_CONFIG",
            SpatialError::GeometryParse { .. } => "GEOMETRY_PARSE_ERROR",
            SpatialError::InputParse { .. } => "INPUT_PARSE_ERROR",
            SpatialError::RowCountMismatch { .. } => "ROW_COUNT_MISMATCH",
            SpatialError::InstanceIdMismatch { .. } => "INSTANCE_ID_MISMATCH",
            SpatialError::UnresolvedRegion { .. } => "UNRESOLVED_REGION",
            SpatialError::StoreRemove { .. } => "STORE_REMOVE_ERROR",
            SpatialError::StoreWrite { .. } => "STORE_WRITE_ERROR",
            SpatialError::StoreRead { .. } => "STORE_READ_ERROR",
            SpatialError::InputNotFound { .. } => "INPUT_NOT_FOUND",
            SpatialError::Io(_) => "IO_ERROR",
            SpatialError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable within the current run
    ///
    /// Always false: every failure aborts the batch.
    pub fn is_recoverable(&self) -> bool {
        false
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self.kind() {
            ErrorKind::Validation => vec![
                "Check the alignment record for zero or non-finite values",
                "Verify coordinate arrays have the same number of axes",
            ],
            ErrorKind::Parse => vec![
                "Only single-ring 'Polygon' geometries are supported",
                "Re-export the geometry document from the annotation tool",
            ],
            ErrorKind::Consistency => vec![
                "The feature table and the region layer must describe the same cells in the same order",
                "Regenerate the per-cell annotation table from a single upstream run",
            ],
            ErrorKind::Io => vec![
                "Check write permissions on the destination directory",
                "Free up disk space and rerun; a partial store may remain",
            ],
        }
    }
}

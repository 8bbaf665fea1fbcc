//! Assembly configuration
//!
//! Resolved, explicit input and output paths for one assembly run.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, SpatialError};
use crate::store::{WriteOptions, DEFAULT_CHUNK_SIZE};

pub const DEFAULT_CELLS_FILE: &str = "cells.json";
pub const DEFAULT_MOLECULES_FILE: &str = "single_molecule.json";
pub const DEFAULT_IMAGE_FILE: &str = "image.png";
pub const DEFAULT_TRANSFORM_FILE: &str = "image_transform.json";
pub const DEFAULT_GEOMETRY_FILE: &str = "anatomical.geojson";

/// Paths and writer settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
    pub cells: PathBuf,
    pub molecules: PathBuf,
    pub image: PathBuf,
    pub image_transform: PathBuf,
    pub geometry: PathBuf,
    /// Store destination; replaced wholesale on write
    pub output: PathBuf,
    pub chunk_size: u64,
}

impl AssemblyConfig {
    /// Config with the default file names inside `input_dir`
    pub fn from_input_dir(input_dir: &Path, output: &Path) -> Self {
        Self {
            cells: input_dir.join(DEFAULT_CELLS_FILE),
            molecules: input_dir.join(DEFAULT_MOLECULES_FILE),
            image: input_dir.join(DEFAULT_IMAGE_FILE),
            image_transform: input_dir.join(DEFAULT_TRANSFORM_FILE),
            geometry: input_dir.join(DEFAULT_GEOMETRY_FILE),
            output: output.to_path_buf(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Every input path, in reading order
    pub fn inputs(&self) -> [&Path; 5] {
        [
            &self.cells,
            &self.molecules,
            &self.image,
            &self.image_transform,
            &self.geometry,
        ]
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            chunk_size: self.chunk_size,
        }
    }

    /// Check the configuration before anything is read or deleted
    ///
    /// # Errors
    /// - `InvalidConfig` for a zero chunk size, or an output that would
    ///   delete an input when the store is replaced
    /// - `InputNotFound` for a missing input file
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SpatialError::InvalidConfig {
                reason: "chunk size must be at least 1".to_string(),
            });
        }

        let output = resolve_path(&self.output)?;
        for input in self.inputs() {
            if !input.is_file() {
                return Err(SpatialError::InputNotFound {
                    path: input.to_path_buf(),
                });
            }
            if fs::canonicalize(input)?.starts_with(&output) {
                return Err(SpatialError::InvalidConfig {
                    reason: format!(
                        "output {} contains input {}",
                        self.output.display(),
                        input.display()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Canonical form of a path that may not exist yet
///
/// The nearest existing ancestor is canonicalized and the missing tail is
/// appended as given. A missing tail ending in `..` is left unresolved.
fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }

    let mut resolved = fs::canonicalize(existing)?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn populated_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in [
            DEFAULT_CELLS_FILE,
            DEFAULT_MOLECULES_FILE,
            DEFAULT_IMAGE_FILE,
            DEFAULT_TRANSFORM_FILE,
            DEFAULT_GEOMETRY_FILE,
        ] {
            fs::write(dir.path().join(name), b"{}").unwrap();
        }
        dir
    }

    #[test]
    fn test_default_file_names() {
        let config = AssemblyConfig::from_input_dir(Path::new("in"), Path::new("out.zarr"));
        assert_eq!(config.cells, PathBuf::from("in/cells.json"));
        assert_eq!(config.geometry, PathBuf::from("in/anatomical.geojson"));
        assert_eq!(config.write_options().chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_validate_ok() {
        let dir = populated_dir();
        let config = AssemblyConfig::from_input_dir(dir.path(), &dir.path().join("out.zarr"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_input() {
        let dir = populated_dir();
        fs::remove_file(dir.path().join(DEFAULT_GEOMETRY_FILE)).unwrap();
        let config = AssemblyConfig::from_input_dir(dir.path(), &dir.path().join("out.zarr"));
        assert!(matches!(
            config.validate(),
            Err(SpatialError::InputNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_output_over_inputs() {
        let dir = populated_dir();
        let config = AssemblyConfig::from_input_dir(dir.path(), dir.path());
        assert!(matches!(
            config.validate(),
            Err(SpatialError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_output_over_inputs_alternate_spelling() {
        let dir = populated_dir();
        let inputs = dir.path().join("data");
        fs::create_dir(&inputs).unwrap();
        for entry in fs::read_dir(dir.path()).unwrap() {
            let path = entry.unwrap().path();
            if path.is_file() {
                fs::rename(&path, inputs.join(path.file_name().unwrap())).unwrap();
            }
        }

        for output in [
            dir.path().join("data/../data"),
            dir.path().to_path_buf(),
        ] {
            let config = AssemblyConfig::from_input_dir(&inputs, &output);
            assert!(
                matches!(config.validate(), Err(SpatialError::InvalidConfig { .. })),
                "accepted {}",
                output.display()
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_output_through_symlink() {
        let dir = populated_dir();
        let link = TempDir::new().unwrap();
        let output = link.path().join("alias");
        std::os::unix::fs::symlink(dir.path(), &output).unwrap();

        let config = AssemblyConfig::from_input_dir(dir.path(), &output);
        assert!(matches!(
            config.validate(),
            Err(SpatialError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_resolve_missing_tail() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve_path(&dir.path().join("a/b.zarr")).unwrap();
        assert_eq!(
            resolved,
            fs::canonicalize(dir.path()).unwrap().join("a").join("b.zarr")
        );
    }

    #[test]
    fn test_validate_zero_chunk_size() {
        let dir = populated_dir();
        let mut config = AssemblyConfig::from_input_dir(dir.path(), &dir.path().join("out.zarr"));
        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }
}

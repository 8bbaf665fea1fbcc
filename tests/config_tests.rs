//! Config Tests
//!
//! Output/input overlap checks against relative paths. Kept in its own test
//! binary because it changes the process working directory.

use std::env;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use spatial_assembly::config::AssemblyConfig;
use spatial_assembly::SpatialError;

// === Relative Paths ===

#[test]
fn test_relative_output_over_relative_inputs() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    for name in [
        "cells.json",
        "single_molecule.json",
        "image.png",
        "image_transform.json",
        "anatomical.geojson",
    ] {
        fs::write(data.join(name), b"{}").unwrap();
    }
    env::set_current_dir(dir.path()).unwrap();

    let cases = [
        AssemblyConfig::from_input_dir(Path::new("data"), Path::new("./data")),
        AssemblyConfig::from_input_dir(Path::new("./data"), Path::new("data")),
        AssemblyConfig::from_input_dir(Path::new("data"), &data),
        AssemblyConfig::from_input_dir(&data, Path::new("data/")),
        AssemblyConfig::from_input_dir(Path::new("data"), Path::new(".")),
    ];
    for config in cases {
        assert!(
            matches!(config.validate(), Err(SpatialError::InvalidConfig { .. })),
            "accepted output {} over inputs {}",
            config.output.display(),
            config.cells.display()
        );
        assert!(data.join("cells.json").is_file());
    }

    let config = AssemblyConfig::from_input_dir(Path::new("data"), Path::new("out.zarr"));
    assert!(config.validate().is_ok());
}

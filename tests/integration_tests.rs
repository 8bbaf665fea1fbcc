//! Integration Tests
//!
//! End-to-end tests for the assembly pipeline: input files to store and back.

use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use image::{GrayImage, Luma};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use test_case::test_case;

use spatial_assembly::config::AssemblyConfig;
use spatial_assembly::error::ErrorKind;
use spatial_assembly::layers::Column;
use spatial_assembly::{pipeline, store, LayerKind, SpatialError};

const CELLS: &str = r#"{
    "var_names": ["Gad1", "Slc17a7", "Sst"],
    "X": [[1, 0, 2], [0, 3, 0], [4, 1, 1], [0, 0, 5]],
    "obs": {"volume": [110.5, 98.0, 120.25, 87.5], "cluster": ["inh", "exc", "inh", "inh"]},
    "obsm": {
        "spatial": [[10, 12], [40, 8], [25, 30], [5, 44]],
        "region_radius": [[3.5], [4.0], [2.5], [3.0]]
    }
}"#;

const MOLECULES: &str = r#"{
    "X": [[11.0, 12.5], [39.5, 9.0], [24.0, 31.0]],
    "cell_type": ["Inhibitory", "Excitatory", "Inhibitory"]
}"#;

const ALIGNMENT: &str =
    r#"{"translation_x": 5, "translation_y": -3, "scale_factor_x": 2, "scale_factor_y": 2}"#;

const GEOMETRY: &str = r#"{
    "type": "GeometryCollection",
    "geometries": [
        {"type": "Polygon", "name": "Layer 1", "coordinates": [[[0, 0], [50, 0], [50, 20], [0, 20], [0, 0]]]},
        {"type": "Polygon", "name": "Layer 2/3", "coordinates": [[[0, 20], [50, 20], [50, 50], [0, 50], [0, 20]]]}
    ]
}"#;

/// Populate `dir` with a complete, consistent input set
fn write_inputs(dir: &Path) {
    fs::write(dir.join("cells.json"), CELLS).unwrap();
    fs::write(dir.join("single_molecule.json"), MOLECULES).unwrap();
    fs::write(dir.join("image_transform.json"), ALIGNMENT).unwrap();
    fs::write(dir.join("anatomical.geojson"), GEOMETRY).unwrap();
    GrayImage::from_fn(24, 16, |x, y| Luma([(x + y) as u8]))
        .save(dir.join("image.png"))
        .unwrap();
}

fn setup() -> (TempDir, AssemblyConfig) {
    let dir = TempDir::new().unwrap();
    let input_dir = dir.path().join("inputs");
    fs::create_dir_all(&input_dir).unwrap();
    write_inputs(&input_dir);
    let config = AssemblyConfig::from_input_dir(&input_dir, &dir.path().join("out.zarr"));
    (dir, config)
}

// === Full Pipeline Tests ===

#[test]
fn test_assemble_all_layers() {
    let (_dir, config) = setup();
    let dataset = pipeline::assemble_inputs(&config).unwrap();

    assert_eq!(dataset.table().len(), 4);
    assert_eq!(dataset.table().features().n_vars(), 3);
    assert_eq!(dataset.points_layer("cells").unwrap().len(), 4);
    assert_eq!(dataset.points_layer("single_molecule").unwrap().len(), 3);
    assert_eq!(dataset.image("rasterized").unwrap().shape(), &[16, 24]);
    assert_eq!(dataset.polygon_set("anatomical").unwrap().len(), 2);
    assert_eq!(dataset.provenance().len(), 5);

    let summary = dataset.to_string();
    assert!(summary.contains("'rasterized'"));
    assert!(summary.contains("'anatomical': 2 polygons"));
}

#[test_case([0.0, 0.0], [5.0, -3.0] ; "origin")]
#[test_case([1.0, 1.0], [7.0, -1.0] ; "unit pixel")]
#[test_case([10.0, 4.0], [25.0, 5.0] ; "interior pixel")]
fn test_image_alignment_maps_pixels(pixel: [f64; 2], expected: [f64; 2]) {
    let (_dir, config) = setup();
    let dataset = pipeline::assemble_inputs(&config).unwrap();

    let mapped = dataset
        .image("rasterized")
        .unwrap()
        .transform()
        .apply(&pixel)
        .unwrap();
    assert_relative_eq!(mapped[0], expected[0]);
    assert_relative_eq!(mapped[1], expected[1]);
}

#[test]
fn test_table_aligned_with_cells() {
    let (_dir, config) = setup();
    let dataset = pipeline::assemble_inputs(&config).unwrap();

    let table = dataset.table();
    let cells = dataset.points_layer("cells").unwrap();
    let mapping = table.mapping();

    assert_eq!(mapping.region, "cells");
    assert_eq!(table.instance_ids(), &[0, 1, 2, 3]);
    assert_eq!(cells.column(&mapping.instance_key), Some(&Column::Int(vec![0, 1, 2, 3])));
    assert_eq!(
        cells.column("region_radius"),
        Some(&Column::Float(vec![3.5, 4.0, 2.5, 3.0]))
    );
    assert!(!table.obs().contains_key("region_radius"));
    assert!(table.obsm().is_empty());
}

#[test]
fn test_only_image_is_registered() {
    let (_dir, config) = setup();
    let dataset = pipeline::assemble_inputs(&config).unwrap();

    let registered: Vec<_> = dataset
        .alignment_report()
        .into_iter()
        .filter(|a| !a.identity)
        .collect();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].kind, LayerKind::Image);
    assert_eq!(dataset.unregistered_layers().len(), 3);
}

#[test]
fn test_run_writes_readable_store() {
    let (_dir, config) = setup();
    let (dataset, inventory) = pipeline::run(&config, |_| {}).unwrap();
    assert!(inventory.file_count > 0);

    let restored = store::read(&config.output).unwrap();
    assert_eq!(restored.table(), dataset.table());
    assert_eq!(restored.provenance(), dataset.provenance());
    assert_eq!(
        restored.image("rasterized").unwrap().data(),
        dataset.image("rasterized").unwrap().data()
    );
}

#[test]
fn test_rerun_replaces_store() {
    let (_dir, config) = setup();
    pipeline::run(&config, |_| {}).unwrap();
    fs::write(config.output.join("leftover.txt"), "stale").unwrap();

    pipeline::run(&config, |_| {}).unwrap();
    assert!(!config.output.join("leftover.txt").exists());
}

#[test]
fn test_run_reports_dataset_before_replacing_store() {
    let (_dir, config) = setup();
    pipeline::run(&config, |_| {}).unwrap();
    fs::write(config.output.join("leftover.txt"), "stale").unwrap();

    let mut seen = None;
    pipeline::run(&config, |dataset| {
        seen = Some((dataset.table().len(), config.output.join("leftover.txt").exists()));
    })
    .unwrap();
    assert_eq!(seen, Some((4, true)));
}

// === Failure Tests ===

#[test]
fn test_multipolygon_fails_without_dataset() {
    let (_dir, config) = setup();
    fs::write(
        &config.geometry,
        r#"{"geometries": [{"type": "MultiPolygon", "name": "x",
            "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]]]}]}"#,
    )
    .unwrap();

    let err = pipeline::run(&config, |_| {}).unwrap_err();
    assert!(matches!(err, SpatialError::GeometryParse { .. }));
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(!config.output.exists());
}

#[test]
fn test_row_count_mismatch_is_consistency_error() {
    let (_dir, config) = setup();
    fs::write(
        &config.cells,
        r#"{"var_names": ["a"], "X": [[1], [2], [3]],
            "obsm": {"spatial": [[0, 0], [1, 1]], "region_radius": [1, 1]}}"#,
    )
    .unwrap();

    let err = pipeline::assemble_inputs(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn test_zero_scale_alignment_rejected() {
    let (_dir, config) = setup();
    fs::write(
        &config.image_transform,
        r#"{"translation_x": 0, "translation_y": 0, "scale_factor_x": 0, "scale_factor_y": 1}"#,
    )
    .unwrap();

    let err = pipeline::assemble_inputs(&config).unwrap_err();
    assert!(matches!(err, SpatialError::InvalidTransform { .. }));
}

#[test]
fn test_failed_assembly_keeps_existing_store() {
    let (_dir, config) = setup();
    pipeline::run(&config, |_| {}).unwrap();
    fs::remove_file(&config.cells).unwrap();

    let err = pipeline::run(&config, |_| {}).unwrap_err();
    assert!(matches!(err, SpatialError::InputNotFound { .. }));
    assert!(store::read(&config.output).is_ok());
}

#[test_case(r#"{"": [1, 2, 3, 4]}"# ; "empty name")]
#[test_case(r#"{"__categories": ["a", "b", "a", "b"]}"# ; "reserved prefix")]
#[test_case(r#"{"volume/um3": [1.0, 2.0, 3.0, 4.0]}"# ; "path separator")]
fn test_unstorable_obs_name_keeps_existing_store(obs: &str) {
    let (_dir, config) = setup();
    pipeline::run(&config, |_| {}).unwrap();
    fs::write(
        &config.cells,
        CELLS.replace(
            r#""obs": {"volume": [110.5, 98.0, 120.25, 87.5], "cluster": ["inh", "exc", "inh", "inh"]}"#,
            &format!(r#""obs": {obs}"#),
        ),
    )
    .unwrap();

    let err = pipeline::run(&config, |_| panic!("assembled with {obs}")).unwrap_err();
    assert!(matches!(err, SpatialError::InputParse { .. }));
    assert!(store::read(&config.output).is_ok());
}

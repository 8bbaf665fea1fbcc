//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use tracing::info;

use crate::config::AssemblyConfig;
use crate::error::Result;
use crate::pipeline;
use crate::store::{self, StoreInventory};

/// Assemble all inputs, print the summary, then replace the store.
pub fn assemble(config: &AssemblyConfig) -> Result<()> {
    info!(output = %config.output.display(), "Assembling spatial dataset");

    let (_, inventory) = pipeline::run(config, |dataset| println!("{dataset}"))?;
    println!("Store written to {}", config.output.display());
    print_inventory(&inventory);

    Ok(())
}

/// Open a store and print its summary, registration status and size.
pub fn inspect(path: &Path) -> Result<()> {
    info!(path = %path.display(), "Inspecting store");

    let metadata = store::read_metadata(path)?;
    let dataset = store::read(path)?;

    println!("{dataset}");
    println!();
    println!("Format version: {}", metadata.format_version);
    println!("Created at: {}", metadata.created_at.format("%Y-%m-%d %H:%M:%S"));

    println!("{:-<60}", "");
    println!("Layer registration:");
    for layer in dataset.alignment_report() {
        let status = if layer.identity {
            "assumed reference frame"
        } else {
            "registered"
        };
        println!(
            "  {:<9} {:<18} {:<12} {}",
            layer.kind.name(),
            layer.name,
            layer.transform_kind,
            status
        );
    }

    if !metadata.provenance.is_empty() {
        println!("{:-<60}", "");
        println!("Provenance:");
        for (input, checksum) in &metadata.provenance {
            println!("  {input}: {checksum}");
        }
    }

    println!("{:-<60}", "");
    print_inventory(&StoreInventory::collect(path)?);

    Ok(())
}

fn print_inventory(inventory: &StoreInventory) {
    println!(
        "Files: {} | Size: {:.2} MB",
        inventory.file_count,
        inventory.total_size_mb()
    );
}

//! Inspect command implementation.

use super::open_store;
use keyshelf_core::DatabaseInfo;
use keyshelf_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// Snapshot file size in bytes.
    pub size: u64,
    /// Every database in the snapshot.
    pub databases: Vec<DatabaseInfo>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No snapshot found at {:?}", path).into());
    }

    let factory = open_store(path)?;
    let mut databases = Vec::new();
    for name in factory.database_names() {
        databases.push(factory.describe(&name)?);
    }
    let result = InspectResult {
        path: path.display().to_string(),
        size: FileBackend::open(path)?.size()?,
        databases,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("keyshelf Snapshot Inspection");
    println!("============================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {} bytes", result.size);

    if result.databases.is_empty() {
        println!();
        println!("No databases.");
    }
    for db in &result.databases {
        println!();
        println!("Database {} (version {}):", db.name, db.version);
        for table in &db.tables {
            println!(
                "  {} key={} records={}",
                table.name, table.key_path, table.records
            );
            if !table.indexes.is_empty() {
                println!("    indexes: {}", table.indexes.join(", "));
            }
        }
    }
}

//! Apply command implementation.

use super::open_store;
use keyshelf_core::{DatabaseConfig, Persistence};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Contents of a schema file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    Many(Vec<DatabaseConfig>),
    One(DatabaseConfig),
}

impl SchemaFile {
    fn into_configs(self) -> Vec<DatabaseConfig> {
        match self {
            Self::Many(configs) => configs,
            Self::One(config) => vec![config],
        }
    }
}

/// Parses a schema file's JSON text.
pub fn parse_configs(text: &str) -> Result<Vec<DatabaseConfig>, serde_json::Error> {
    serde_json::from_str::<SchemaFile>(text).map(SchemaFile::into_configs)
}

/// Runs the apply command.
pub fn run(path: &Path, config: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(config)?;
    let configs = parse_configs(&text)?;
    if configs.is_empty() {
        return Err(format!("No database declarations in {:?}", config).into());
    }

    let factory = open_store(path)?;
    let persistence = Persistence::open(factory.clone(), configs)?;
    for config in persistence.configs() {
        info!(database = %config.name, version = config.version, "database ready");
        let version = factory.version(&config.name).unwrap_or_default();
        println!("{} at version {}", config.name, version);
    }
    Ok(())
}

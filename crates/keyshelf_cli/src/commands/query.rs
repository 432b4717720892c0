//! Query command implementation.

use super::{open_store, to_json};
use keyshelf_core::{
    Action, Columns, Condition, Order, Repository, SelectQuery, StoreRepository,
    TransactionCoordinator, Value,
};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// A select or count request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Database name.
    pub database: String,
    /// Table name.
    pub table: String,
    /// Condition in string form.
    pub condition: Option<String>,
    /// Order in string form.
    pub order: Option<String>,
    /// Records to skip.
    pub start: Option<i64>,
    /// Maximum records to return.
    pub size: Option<i64>,
    /// Count instead of select.
    pub count: bool,
}

/// Runs the request and returns its JSON output.
pub fn execute(path: &Path, request: &QueryRequest) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let factory = open_store(path)?;
    let version = factory
        .version(&request.database)
        .ok_or_else(|| format!("No database named {}", request.database))?;
    let repository = StoreRepository::new(factory);
    repository.open(&request.database, version)?;

    let condition = match &request.condition {
        Some(text) => {
            let parsed = Condition::parse(text)?;
            if parsed.is_none() {
                warn!(condition = %text, "condition not recognised, no filter applied");
            }
            parsed
        }
        None => None,
    };
    let order = match &request.order {
        Some(text) => {
            let parsed = Order::parse(text);
            if parsed.is_none() {
                warn!(order = %text, "order not recognised, using key order");
            }
            parsed
        }
        None => None,
    };

    let action = if request.count {
        Action::Count { condition }
    } else {
        Action::Select(SelectQuery {
            columns: Columns::All,
            condition,
            order,
            start: request.start,
            size: request.size,
        })
    };

    let mut coordinator = TransactionCoordinator::new(Arc::new(repository));
    let table = request.table.clone();
    let result = coordinator.run(&request.database, [table.clone()], |c| c.execute(&table, action))?;

    if request.count {
        Ok(serde_json::Value::from(result.into_count()?))
    } else {
        let rows = result
            .into_records()?
            .into_iter()
            .map(|record| to_json(&Value::Map(record)))
            .collect();
        Ok(serde_json::Value::Array(rows))
    }
}

/// Runs the query command.
pub fn run(path: &Path, request: &QueryRequest) -> Result<(), Box<dyn std::error::Error>> {
    let output = execute(path, request)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

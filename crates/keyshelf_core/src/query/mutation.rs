//! Mutation executor: insert, update and delete.

use super::condition::Condition;
use crate::error::{CoreError, CoreResult};
use crate::key::KeyPath;
use crate::store::Transaction;
use keyshelf_codec::{Record, Value};
use tracing::debug;
use uuid::Uuid;

fn assemble(columns: Vec<String>, values: Vec<Value>) -> CoreResult<Record> {
    if columns.len() != values.len() {
        return Err(CoreError::invalid_argument(format!(
            "got {} columns but {} values",
            columns.len(),
            values.len()
        )));
    }
    Ok(columns.into_iter().zip(values).collect())
}

/// Generates a key for a single-column key path when the record has none.
fn fill_key(key_path: &KeyPath, record: &mut Record) -> CoreResult<()> {
    match key_path {
        KeyPath::Single(column) => {
            if record.get(column).map_or(true, Value::is_null) {
                let key = Uuid::new_v4().to_string();
                debug!(column = %column, key = %key, "generated primary key");
                record.insert(column.clone(), Value::Text(key));
            }
            Ok(())
        }
        KeyPath::Composite(columns) => {
            match columns
                .iter()
                .find(|c| !record.get(c.as_str()).is_some_and(Value::is_valid_key))
            {
                Some(missing) => Err(CoreError::invalid_argument(format!(
                    "composite key component {missing} is missing"
                ))),
                None => Ok(()),
            }
        }
    }
}

/// Inserts a new record built from `columns` and `values`.
///
/// A missing single-column primary key is filled with a generated UUID.
/// Returns the record's primary key.
pub fn insert(
    txn: &mut Transaction,
    table: &str,
    columns: Vec<String>,
    values: Vec<Value>,
) -> CoreResult<Value> {
    let mut record = assemble(columns, values)?;
    let key_path = txn.key_path(table)?.clone();
    fill_key(&key_path, &mut record)?;
    let key = txn.add(table, record)?;
    debug!(table, key = %key, "record inserted");
    Ok(key)
}

/// Writes a record over any existing record with the same primary key.
pub fn update(
    txn: &mut Transaction,
    table: &str,
    columns: Vec<String>,
    values: Vec<Value>,
) -> CoreResult<Value> {
    let record = assemble(columns, values)?;
    let key = txn.put(table, record)?;
    debug!(table, key = %key, "record updated");
    Ok(key)
}

/// Deletes the first record matching `condition` and returns it.
///
/// A condition on the table's single key column looks the record up by
/// primary key; any other column is looked up through its index.
pub fn delete(
    txn: &mut Transaction,
    table: &str,
    condition: Option<&Condition>,
) -> CoreResult<Record> {
    let condition =
        condition.ok_or_else(|| CoreError::invalid_argument("delete requires a condition"))?;
    let range = condition.key_range().ok_or_else(|| {
        CoreError::invalid_argument(format!(
            "delete condition must be a range, got {condition}"
        ))
    })?;

    let key_path = txn.key_path(table)?.clone();
    let found = if key_path.single() == Some(condition.column()) {
        txn.get_in_range(table, range)?
    } else {
        txn.index_get(table, condition.column(), range)?
    };
    let key = found.and_then(|record| key_path.extract(record));

    let Some(key) = key else {
        return Err(match range.point() {
            Some(point) => CoreError::not_found(format!(
                "record with key {point} does not exist in table {table}"
            )),
            None => CoreError::not_found(format!(
                "no record in table {table} matches the delete condition"
            )),
        });
    };

    let removed = txn.delete(table, &key)?.ok_or_else(|| {
        CoreError::not_found(format!("record with key {key} vanished from table {table}"))
    })?;
    debug!(table, key = %key, "record deleted");
    Ok(removed)
}

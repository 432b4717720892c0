//! CLI command implementations.

pub mod apply;
pub mod inspect;
pub mod query;

use keyshelf_codec::Value;
use keyshelf_core::StoreFactory;
use keyshelf_storage::FileBackend;
use std::path::Path;

/// Opens the store persisted at `path`, creating the file on first write.
pub fn open_store(path: &Path) -> Result<StoreFactory, Box<dyn std::error::Error>> {
    let backend = FileBackend::open_with_create_dirs(path)?;
    Ok(StoreFactory::with_backend(Box::new(backend))?)
}

/// Plain JSON rendering of a value. Byte strings become `0x` hex text.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Float(n) => serde_json::Value::from(*n),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(_) => serde_json::Value::String(value.to_string()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyshelf_codec::Record;

    #[test]
    fn json_rendering() {
        let mut record = Record::new();
        record.insert("id".into(), Value::Integer(1));
        record.insert("name".into(), Value::from("Ann"));
        record.insert("price".into(), Value::Float(9.5));
        record.insert("raw".into(), Value::Bytes(vec![0xab, 0x01]));
        record.insert("tags".into(), Value::Array(vec![Value::from("a"), Value::Null]));
        let json = to_json(&Value::Map(record));
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "name": "Ann", "price": 9.5, "raw": "0xab01", "tags": ["a", null]})
        );
    }
}

//! Snapshot framing for persisted store state.
//!
//! ## Format
//!
//! ```text
//! | magic (4) | version (2) | payload_len (8) | sha256 (32) | payload... |
//! ```
//!
//! The payload is the CBOR encoding of every database's tables and records.
//! Indexes are persisted as definitions only and rebuilt on load.

use super::table::Table;
use crate::error::{CoreError, CoreResult};
use crate::key::KeyPath;
use keyshelf_codec::Record;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Magic bytes for snapshot files.
const SNAPSHOT_MAGIC: [u8; 4] = *b"KSHF";
/// Current snapshot format version.
const SNAPSHOT_VERSION: u16 = 1;
/// Header size (magic + version + length + digest).
const HEADER_SIZE: usize = 4 + 2 + 8 + 32;

/// Persisted form of one database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DatabaseSnapshot {
    pub name: String,
    pub version: u64,
    pub tables: Vec<TableSnapshot>,
}

/// Persisted form of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TableSnapshot {
    pub name: String,
    pub key_path: KeyPath,
    pub indexes: Vec<IndexSnapshot>,
    pub records: Vec<Record>,
}

/// Index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexSnapshot {
    pub name: String,
    pub column: String,
    pub unique: bool,
}

impl TableSnapshot {
    pub(crate) fn capture(table: &Table) -> Self {
        Self {
            name: table.name().to_string(),
            key_path: table.key_path().clone(),
            indexes: table
                .indexes()
                .map(|index| IndexSnapshot {
                    name: index.name().to_string(),
                    column: index.column().to_string(),
                    unique: index.is_unique(),
                })
                .collect(),
            records: table.records().map(|(_, r)| r.clone()).collect(),
        }
    }

    pub(crate) fn restore(self) -> CoreResult<Table> {
        let mut table = Table::new(self.name, self.key_path);
        for record in self.records {
            table.add(record)?;
        }
        for index in self.indexes {
            table.create_index(index.name, index.column, index.unique)?;
        }
        Ok(table)
    }
}

/// Frames `databases` as a snapshot blob.
pub(crate) fn encode(databases: &[DatabaseSnapshot]) -> CoreResult<Vec<u8>> {
    let payload = keyshelf_codec::to_cbor(databases)?;
    let digest = Sha256::digest(&payload);

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len());
    data.extend_from_slice(&SNAPSHOT_MAGIC);
    data.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    data.extend_from_slice(&digest);
    data.extend_from_slice(&payload);
    Ok(data)
}

/// Parses and verifies a snapshot blob.
pub(crate) fn decode(data: &[u8]) -> CoreResult<Vec<DatabaseSnapshot>> {
    if data.len() < HEADER_SIZE {
        return Err(CoreError::invalid_format("snapshot data too small"));
    }
    if data[0..4] != SNAPSHOT_MAGIC {
        return Err(CoreError::invalid_format("invalid snapshot magic"));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(CoreError::invalid_format(format!(
            "unsupported snapshot version: {version}"
        )));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[6..14]);
    let len = u64::from_le_bytes(len_bytes);
    let payload = &data[HEADER_SIZE..];
    if payload.len() as u64 != len {
        return Err(CoreError::invalid_format(format!(
            "payload length mismatch: expected {len}, got {}",
            payload.len()
        )));
    }

    let digest = Sha256::digest(payload);
    if digest.as_slice() != &data[14..HEADER_SIZE] {
        return Err(CoreError::invalid_format("snapshot checksum mismatch"));
    }

    Ok(keyshelf_codec::from_cbor(payload)?)
}

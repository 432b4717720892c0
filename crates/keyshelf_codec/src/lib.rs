//! # keyshelf codec
//!
//! Value model and encoding for keyshelf.
//!
//! This crate provides:
//! - [`Value`], the dynamic column value, with the total order used for
//!   primary keys, index keys and key ranges
//! - [`Record`], a stored row (column name to value)
//! - CBOR encoding of any serde type, used for database snapshots
//!
//! ## Key Order
//!
//! - Integers sort numerically and before text
//! - Text sorts by code point and before byte strings
//! - Byte strings sort bytewise and before arrays
//! - Arrays compare element by element
//! - Null, booleans and maps are not valid keys and sort before all keys
//!
//! ## Usage
//!
//! ```
//! use keyshelf_codec::{from_cbor, to_cbor, Value};
//!
//! let value = Value::Integer(42);
//! let bytes = to_cbor(&value).unwrap();
//! let decoded: Value = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod value;

pub use error::{CodecError, CodecResult};
pub use value::{Record, Value};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode any serializable value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(bytes)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrip_record() {
        let mut record = Record::new();
        record.insert("id".into(), Value::from("a1"));
        record.insert("age".into(), Value::Integer(30));
        record.insert(
            "tags".into(),
            Value::Array(vec![Value::from("x"), Value::Bytes(vec![1, 2])]),
        );
        let bytes = to_cbor(&record).unwrap();
        let decoded: Record = from_cbor(&bytes).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let result: CodecResult<Value> = from_cbor(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    fn key_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::Integer),
            any::<i32>().prop_map(|n| Value::Float(f64::from(n) / 4.0)),
            "[a-zA-Z]{0,8}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..6).prop_map(Value::Bytes),
        ]
    }

    proptest! {
        #[test]
        fn key_order_is_total_and_consistent(a in key_strategy(), b in key_strategy()) {
            let ab = a.cmp(&b);
            prop_assert_eq!(ab, b.cmp(&a).reverse());
            prop_assert_eq!(ab == std::cmp::Ordering::Equal, a == b);
        }
    }
}

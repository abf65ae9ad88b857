//! CBOR encoding for typed values.
//!
//! The backend stores opaque bytes. These helpers are the typed layer used
//! by [`Database::get_as`](crate::Database::get_as) and the transaction
//! `*_as` methods.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Payload written by [`Transaction::create`](crate::Transaction::create):
/// a CBOR empty map.
pub const EMPTY_RECORD: &[u8] = &[0xA0];

/// Encodes a value as CBOR.
///
/// # Errors
///
/// Returns a codec error if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes a CBOR payload.
///
/// # Errors
///
/// Returns a codec error if the bytes are not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Account {
        #[serde(default)]
        balance: i64,
    }

    #[test]
    fn empty_record_is_empty_map() {
        let map: BTreeMap<String, i64> = decode(EMPTY_RECORD).unwrap();
        assert!(map.is_empty());
        assert_eq!(encode(&BTreeMap::<String, i64>::new()).unwrap(), EMPTY_RECORD);
    }

    #[test]
    fn empty_record_decodes_to_defaults() {
        let account: Account = decode(EMPTY_RECORD).unwrap();
        assert_eq!(account, Account::default());
    }

    #[test]
    fn struct_encodes() {
        let bytes = encode(&Account { balance: -3 }).unwrap();
        let back: Account = decode(&bytes).unwrap();
        assert_eq!(back.balance, -3);
    }

    #[test]
    fn garbage_fails() {
        let result: CoreResult<Account> = decode(&[0xFF, 0x00]);
        assert!(matches!(result, Err(CoreError::Codec { .. })));
    }
}

//! CBOR encoding helpers.
//!
//! Payloads and journal bodies are CBOR. Struct fields serialize in
//! declaration order and the model crates use `BTreeMap` for any map
//! content, so encoding a given value always produces the same bytes.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if serialization fails.
pub fn to_vec<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| StoreError::codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR bytes.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if the bytes are not valid CBOR for `T`.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::codec(e.to_string()))
}

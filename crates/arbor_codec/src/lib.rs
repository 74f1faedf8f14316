//! # Arbor Codec
//!
//! Deterministic CBOR encoding for Arbor node records.
//!
//! Node records are content-addressed: the segment that holds them is named
//! by the SHA-256 of its bytes. Two writers staging the same tree must
//! therefore produce the same bytes. This crate wraps `ciborium` with the
//! rules that make that hold:
//!
//! - Maps must come from ordered containers (`BTreeMap`), never `HashMap`
//! - Struct fields are encoded in declaration order
//! - Exactly one top-level item per buffer; trailing bytes are an error
//!
//! ## Usage
//!
//! ```
//! use arbor_codec::{to_canonical_cbor, from_cbor};
//! use std::collections::BTreeMap;
//!
//! let mut props = BTreeMap::new();
//! props.insert("jcr:primaryType".to_string(), "nt:unstructured".to_string());
//!
//! let bytes = to_canonical_cbor(&props).unwrap();
//! let decoded: BTreeMap<String, String> = from_cbor(&bytes).unwrap();
//! assert_eq!(props, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{CodecError, CodecResult};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn to_canonical_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Decode exactly one CBOR item from `bytes`.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not a valid
/// encoding of `T`, or [`CodecError::TrailingBytes`] if input remains.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = bytes;
    let value = ciborium::from_reader(&mut reader)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: reader.len(),
        });
    }
    Ok(value)
}

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl<T: Serialize> Encode for T {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl<T: DeserializeOwned> Decode for T {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

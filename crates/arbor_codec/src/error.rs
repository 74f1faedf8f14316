//! Codec errors.

use thiserror::Error;

/// Result of an encode or decode.
pub type CodecResult<T> = Result<T, CodecError>;

/// Why a record could not be turned into bytes or back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// `ciborium` rejected the value.
    #[error("cannot encode record: {0}")]
    Encode(String),

    /// The bytes are not a valid encoding of the requested type.
    #[error("cannot decode record: {0}")]
    Decode(String),

    /// A buffer held more than one top-level item.
    #[error("{remaining} trailing bytes after CBOR item")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },
}

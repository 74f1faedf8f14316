//! Error types for Arbor core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Arbor core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] arbor_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] arbor_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A segment, record, node, path or type does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// The archive or a record is structurally invalid.
    #[error("corrupt archive: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// A block or header checksum did not match its contents.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Checksum computed over the bytes read.
        actual: u32,
    },

    /// A commit could not be applied.
    ///
    /// `attempts` is zero when the rebase itself found a conflicting change,
    /// and the number of tries when the root swap kept losing.
    #[error("commit conflict after {attempts} attempt(s): {message}")]
    Conflict {
        /// Number of commit attempts made.
        attempts: u32,
        /// What conflicted.
        message: String,
    },

    /// A type or namespace is already registered.
    #[error("already exists: {name}")]
    AlreadyExists {
        /// The conflicting name.
        name: String,
    },

    /// An update to a registered type was rejected.
    #[error("incompatible change to {name}: {reason}")]
    IncompatibleChange {
        /// The type being updated.
        name: String,
        /// Why the new definition was rejected.
        reason: String,
    },

    /// A type cannot be removed while it is referenced.
    #[error("{name} is in use: {reason}")]
    InUse {
        /// The type being removed.
        name: String,
        /// What still refers to it.
        reason: String,
    },

    /// A type definition failed validation.
    #[error("invalid definition {name}: {message}")]
    InvalidDefinition {
        /// The offending type.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// Schema text could not be parsed.
    #[error("syntax error on line {line}: {message}")]
    Syntax {
        /// 1-based line of the offending token.
        line: usize,
        /// What the parser expected.
        message: String,
    },

    /// A segment or a single record exceeds the configured maximum.
    #[error("segment too large: {size} bytes (max {max})")]
    SegmentTooLarge {
        /// Size that was requested.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Another handle holds the archive lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// A path or name is syntactically invalid.
    #[error("invalid path: {path}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// Credentials were rejected.
    #[error("login failed for user {user}")]
    LoginFailed {
        /// The user id that was presented.
        user: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates a rebase conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            attempts: 0,
            message: message.into(),
        }
    }

    /// Creates an invalid-definition error.
    pub fn invalid_definition(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an incompatible-change error.
    pub fn incompatible(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IncompatibleChange {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an in-use error.
    pub fn in_use(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InUse {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a syntax error.
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Creates an invalid-path error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the caller can reasonably retry or correct the input.
    ///
    /// Corruption, checksum failures and I/O errors are not recoverable:
    /// the store should be closed and inspected.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Conflict { .. }
                | Self::AlreadyExists { .. }
                | Self::IncompatibleChange { .. }
                | Self::InUse { .. }
                | Self::InvalidDefinition { .. }
                | Self::Syntax { .. }
                | Self::SegmentTooLarge { .. }
                | Self::InvalidPath { .. }
                | Self::LoginFailed { .. }
                | Self::InvalidOperation { .. }
                | Self::StoreLocked
        )
    }
}

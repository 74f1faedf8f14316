//! # Arbor Storage
//!
//! Append-only byte stores that hold Arbor archive files.
//!
//! A backend knows nothing about segments, head records or node records.
//! It stores bytes, hands back the offset each append landed at, and makes
//! them durable on request. The archive layer in `arbor_core` owns every
//! byte of format interpretation.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - Shared in-memory buffer for tests and ephemeral stores
//! - [`FileBackend`] - One archive file on disk
//!
//! ## Example
//!
//! ```rust
//! use arbor_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"segment bytes").unwrap();
//! assert_eq!(backend.read_at(offset, 7).unwrap(), b"segment");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

//! # Arbor Core
//!
//! Hierarchical content repository engine.
//!
//! This crate provides:
//! - An archive-backed, content-addressed segment store
//! - A copy-on-write node tree with optimistic, rebasing commits
//! - A node type registry whose definitions live in the tree itself and can
//!   be updated in place when the change keeps existing content valid
//! - A CND importer and a small repository/session facade

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
pub mod cnd;
mod config;
mod dir;
mod error;
pub mod node;
pub mod nodetype;
mod repository;
pub mod segment;
mod types;

pub use config::{Config, SEGMENT_SIZE_LIMIT};
pub use error::{CoreError, CoreResult};
pub use node::{
    CommitHook, ConflictPolicy, EmptyHook, NodeBuilder, NodeState, NodeStore, PropertyState,
    Value, ValueType, JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE,
};
pub use nodetype::{
    check_compatibility, CompatibilityVerdict, NodeTypeRegistry, QualifiedName,
    RegistrationOutcome, TypeDefinition,
};
pub use repository::{Credentials, NodeType, NodeTypeManager, Repository, Session, Workspace};
pub use segment::{SegmentStore, SegmentStoreStats, VerifyReport};
pub use types::{Address, Head, RecordId, Sequence, ADDRESS_LEN};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Arbor Testkit
//!
//! Test utilities for Arbor.
//!
//! This crate provides:
//! - Fixtures that own a repository or node store in a temporary directory
//! - Crash helpers that damage archive files or fail appends on demand
//! - Property-based generators for type definitions and segment payloads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbor_testkit::prelude::*;
//!
//! #[test]
//! fn survives_reopen() {
//!     let mut repo = TestRepository::new();
//!     repo.registry().register_builtins().unwrap();
//!     repo.reopen();
//!     assert!(repo.registry().has_type("nt:base").unwrap());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;

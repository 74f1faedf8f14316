//! CLI command implementations.

pub mod import;
pub mod init;
pub mod inspect;
pub mod types;
pub mod unregister;
pub mod verify;

use arbor_core::{Config, NodeStore, NodeTypeRegistry, Repository};
use std::path::Path;
use std::sync::Arc;

/// Configuration for commands that work on an existing repository.
fn existing() -> Config {
    Config::default().create_if_missing(false)
}

/// Opens an existing repository, bootstrapping built-in types if needed.
pub(crate) fn open_repository(path: &Path) -> Result<Repository, Box<dyn std::error::Error>> {
    Ok(Repository::open(path, existing())?)
}

/// Opens the registry of an existing store without bootstrapping it.
pub(crate) fn open_registry(path: &Path) -> Result<NodeTypeRegistry, Box<dyn std::error::Error>> {
    let store = Arc::new(NodeStore::open(path, existing())?);
    Ok(NodeTypeRegistry::new(store))
}

//! Unregister command implementation.

use crate::commands::open_repository;
use std::path::Path;
use tracing::info;

/// Runs the unregister command.
pub fn run(path: &Path, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Unregistering {} from {:?}", name, path);

    let repo = open_repository(path)?;
    repo.registry().unregister(name)?;
    repo.shutdown()?;
    println!("Unregistered {name}");
    Ok(())
}

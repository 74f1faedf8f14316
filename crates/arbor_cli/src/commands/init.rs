//! Init command implementation.

use arbor_core::{Config, Repository};
use std::path::Path;
use tracing::info;

/// Runs the init command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Creating repository at {:?}", path);

    let repo = Repository::open(path, Config::default().error_if_exists(true))?;
    let types = repo.registry().list_types()?.len();
    let head = repo.node_store().head();
    repo.shutdown()?;

    println!("Created repository at {}", path.display());
    println!("  node types: {types}");
    if let Some(head) = head {
        println!("  head:       {} ({})", head.sequence, head.root);
    }
    Ok(())
}

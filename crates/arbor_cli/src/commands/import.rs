//! Import command implementation.

use crate::commands::open_repository;
use arbor_core::cnd;
use std::path::Path;
use tracing::info;

/// Runs the import command.
pub fn run(path: &Path, file: &Path, allow_update: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!("Importing {:?} into {:?}", file, path);

    let text = std::fs::read_to_string(file)?;
    let repo = open_repository(path)?;
    let outcome = cnd::import(repo.registry(), &text, allow_update)?;
    repo.shutdown()?;
    info!(
        added = outcome.added.len(),
        updated = outcome.updated.len(),
        unchanged = outcome.unchanged.len(),
        "import finished"
    );

    for prefix in &outcome.namespaces {
        println!("namespace  {prefix}");
    }
    for name in &outcome.added {
        println!("added      {name}");
    }
    for name in &outcome.updated {
        println!("updated    {name}");
    }
    for name in &outcome.unchanged {
        println!("unchanged  {name}");
    }
    Ok(())
}

//! Verify command implementation.

use arbor_core::{Config, SegmentStore};
use std::path::Path;

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying repository at {}", path.display());
    println!();

    let store = SegmentStore::open(path, Config::default().create_if_missing(false))?;
    let report = store.verify()?;

    println!("Archive files:  {}", report.files);
    println!("Segment blocks: {}", report.segment_blocks);
    println!("Head blocks:    {}", report.head_blocks);
    if report.torn_bytes > 0 {
        println!("Torn tail:      {} bytes", report.torn_bytes);
    }
    for error in &report.errors {
        println!("  ERROR: {error}");
    }

    println!();
    if report.is_ok() {
        println!("✓ Repository verification passed");
        Ok(())
    } else {
        println!("✗ Repository verification failed");
        Err("Verification failed".into())
    }
}

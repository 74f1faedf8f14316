//! Inspect command implementation.

use crate::commands::open_registry;
use crate::Format;
use serde::Serialize;
use std::path::Path;

/// Repository inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Repository path.
    pub path: String,
    /// Number of archive files.
    pub archive_files: usize,
    /// Total size of the archive files in bytes.
    pub archive_bytes: u64,
    /// Number of distinct segments.
    pub segments: usize,
    /// Sum of segment sizes in bytes.
    pub segment_bytes: u64,
    /// Commit sequence of the head.
    pub head_sequence: Option<u64>,
    /// Root record of the head.
    pub head_root: Option<String>,
    /// Registered namespaces.
    pub namespaces: usize,
    /// Registered node types.
    pub node_types: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let registry = open_registry(path)?;
    let stats = registry.store().segments().stats()?;
    let snapshot = registry.snapshot()?;

    let result = InspectResult {
        path: path.display().to_string(),
        archive_files: stats.files,
        archive_bytes: stats.archive_bytes,
        segments: stats.segments,
        segment_bytes: stats.segment_bytes,
        head_sequence: stats.head.map(|h| h.sequence.as_u64()),
        head_root: stats.head.map(|h| h.root.to_string()),
        namespaces: snapshot.namespaces.len(),
        node_types: snapshot.types.len(),
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Arbor repository: {}", result.path);
    println!();
    println!("Archive:");
    println!("  Files:          {}", result.archive_files);
    println!("  Size:           {} bytes", result.archive_bytes);
    println!("  Segments:       {}", result.segments);
    println!("  Segment bytes:  {}", result.segment_bytes);
    println!();
    println!("Head:");
    match (&result.head_sequence, &result.head_root) {
        (Some(seq), Some(root)) => {
            println!("  Sequence:       {seq}");
            println!("  Root:           {root}");
        }
        _ => println!("  (none)"),
    }
    println!();
    println!("Registry:");
    println!("  Namespaces:     {}", result.namespaces);
    println!("  Node types:     {}", result.node_types);
}

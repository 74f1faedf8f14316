//! Segment storage.
//!
//! - [`archive`]: on-disk block format and recovery scan
//! - [`format`]: how node records are packed into one segment
//! - [`SegmentStore`]: the content-addressed store with its head pointer

pub mod archive;
pub mod format;
mod store;

pub use format::{SegmentBuilder, SegmentView};
pub use store::{SegmentStore, SegmentStoreStats, VerifyReport};

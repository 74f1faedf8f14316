//! Copy-on-write node tree.
//!
//! Nodes are immutable records packed into segments. A commit writes new
//! records for every node on the path to a change and swaps the root;
//! everything else is shared with the previous revision.

mod builder;
mod path;
mod reader;
mod record;
mod state;
mod store;
mod value;
mod writer;

pub use builder::NodeBuilder;
pub use record::NodeRecord;
pub use state::{NodeState, JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE};
pub use store::{CommitHook, ConflictPolicy, EmptyHook, NodeStore};
pub use value::{PropertyState, Value, ValueType};

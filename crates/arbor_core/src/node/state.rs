//! Immutable snapshots of nodes.

use crate::error::CoreResult;
use crate::node::path::split_path;
use crate::node::reader::RecordReader;
use crate::node::record::NodeRecord;
use crate::node::value::PropertyState;
use crate::types::RecordId;
use std::fmt;
use std::sync::Arc;

/// Property holding a node's primary type.
pub const JCR_PRIMARY_TYPE: &str = "jcr:primaryType";

/// Property holding a node's mixin types.
pub const JCR_MIXIN_TYPES: &str = "jcr:mixinTypes";

/// A read-only view of one node in a committed tree.
///
/// A `NodeState` never changes: it keeps reading the revision it was loaded
/// from even after later commits move the head.
#[derive(Clone)]
pub struct NodeState {
    reader: RecordReader,
    id: RecordId,
    record: Arc<NodeRecord>,
}

impl NodeState {
    pub(crate) fn load(reader: &RecordReader, id: RecordId) -> CoreResult<Self> {
        Ok(Self {
            record: reader.read(id)?,
            reader: reader.clone(),
            id,
        })
    }

    pub(crate) fn reader(&self) -> &RecordReader {
        &self.reader
    }

    pub(crate) fn record(&self) -> &Arc<NodeRecord> {
        &self.record
    }

    /// Identity of this node revision.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// One property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyState> {
        self.record.property(name)
    }

    /// True if the property exists.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.record.property(name).is_some()
    }

    /// All properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyState)> {
        self.record
            .properties()
            .iter()
            .map(|(name, state)| (name.as_str(), state))
    }

    /// The `jcr:primaryType` name, if set.
    #[must_use]
    pub fn primary_type(&self) -> Option<&str> {
        self.property(JCR_PRIMARY_TYPE).and_then(PropertyState::as_str)
    }

    /// Loads child `name`.
    ///
    /// # Errors
    ///
    /// Fails if the child's segment cannot be read.
    pub fn child(&self, name: &str) -> CoreResult<Option<NodeState>> {
        self.record
            .child(name)
            .map(|id| Self::load(&self.reader, id))
            .transpose()
    }

    /// True if a child named `name` exists.
    #[must_use]
    pub fn has_child(&self, name: &str) -> bool {
        self.record.child(name).is_some()
    }

    /// Child names in the node's order.
    #[must_use]
    pub fn child_names(&self) -> Vec<&str> {
        self.record.child_names()
    }

    /// Number of children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.record.child_count()
    }

    /// True if children keep insertion order.
    #[must_use]
    pub fn is_orderable(&self) -> bool {
        self.record.is_orderable()
    }

    /// Loads all children in order.
    ///
    /// # Errors
    ///
    /// Fails if a child's segment cannot be read.
    pub fn children(&self) -> CoreResult<Vec<(String, NodeState)>> {
        self.record
            .child_names()
            .into_iter()
            .filter_map(|name| self.record.child(name).map(|id| (name, id)))
            .map(|(name, id)| Ok((name.to_string(), Self::load(&self.reader, id)?)))
            .collect()
    }

    /// Resolves a relative (or root-absolute) path below this node.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`](crate::CoreError::InvalidPath) for a
    /// malformed path, read errors while descending.
    pub fn node_at(&self, path: &str) -> CoreResult<Option<NodeState>> {
        let mut node = self.clone();
        for name in split_path(path)? {
            match node.child(name)? {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }
}

impl PartialEq for NodeState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeState {}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeState")
            .field("id", &self.id)
            .field("properties", &self.record.properties().len())
            .field("children", &self.record.child_count())
            .finish()
    }
}

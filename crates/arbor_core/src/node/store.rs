//! Copy-on-write node store with atomic root commits.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::node::builder::{ApplyContext, Base, NodeBuilder};
use crate::node::reader::RecordReader;
use crate::node::state::NodeState;
use crate::node::writer::SegmentWriter;
use crate::segment::SegmentStore;
use crate::types::Head;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a commit settles a change that collides with a concurrent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Abort the commit with [`CoreError::Conflict`].
    #[default]
    Fail,
    /// Keep the change being committed.
    Ours,
    /// Keep the change already in the head.
    Theirs,
}

/// Check run against the head at the start of every commit attempt.
///
/// An error aborts the commit. Because the check is repeated after a lost
/// root swap, it sees every head the commit is actually applied to.
pub trait CommitHook: Send + Sync {
    /// Validates the head the commit is about to be applied to.
    ///
    /// # Errors
    ///
    /// Any error aborts the commit and is returned to the caller.
    fn validate(&self, head: &NodeState) -> CoreResult<()>;
}

/// A hook that accepts every head.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyHook;

impl CommitHook for EmptyHook {
    fn validate(&self, _head: &NodeState) -> CoreResult<()> {
        Ok(())
    }
}

impl<F> CommitHook for F
where
    F: Fn(&NodeState) -> CoreResult<()> + Send + Sync,
{
    fn validate(&self, head: &NodeState) -> CoreResult<()> {
        self(head)
    }
}

/// A tree of nodes stored in segments, changed only by whole-tree commits.
///
/// Readers take a [`NodeState`] snapshot of the root and are never affected
/// by later commits. Writers stage changes in a [`NodeBuilder`] and
/// [`commit`](Self::commit) them; concurrent commits are serialized by the
/// segment store's root swap and the loser rebases and tries again.
pub struct NodeStore {
    segments: Arc<SegmentStore>,
    reader: RecordReader,
    retries: u32,
    root: RwLock<NodeState>,
}

impl NodeStore {
    /// Creates a node store over `segments`.
    ///
    /// An archive without a head gets an empty root node.
    ///
    /// # Errors
    ///
    /// Fails if the head cannot be read or the empty root cannot be written.
    pub fn new(segments: Arc<SegmentStore>) -> CoreResult<Self> {
        let reader = RecordReader::new(Arc::clone(&segments));
        let root = match segments.head() {
            Some(head) => head.root,
            None => {
                let mut writer = SegmentWriter::new(&segments);
                let empty = writer.write_node(BTreeMap::new(), &BTreeMap::new(), None)?;
                let empty = writer.finish(empty)?;
                if segments.compare_and_swap_root(None, empty)? {
                    info!(root = %empty, "initialized empty root");
                    empty
                } else {
                    segments
                        .head()
                        .map(|h| h.root)
                        .ok_or_else(|| CoreError::corrupt("head vanished during initialization"))?
                }
            }
        };
        let root = NodeState::load(&reader, root)?;

        Ok(Self {
            retries: segments.config().commit_retries.max(1),
            segments,
            reader,
            root: RwLock::new(root),
        })
    }

    /// Opens a file-backed node store in directory `path`.
    ///
    /// # Errors
    ///
    /// See [`SegmentStore::open`].
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        Self::new(Arc::new(SegmentStore::open(path, config)?))
    }

    /// Creates an in-memory node store.
    ///
    /// # Errors
    ///
    /// Only fails if the empty root cannot be written.
    pub fn in_memory(config: Config) -> CoreResult<Self> {
        Self::new(Arc::new(SegmentStore::in_memory(config)?))
    }

    /// The underlying segment store.
    #[must_use]
    pub fn segments(&self) -> &Arc<SegmentStore> {
        &self.segments
    }

    /// The current head record.
    #[must_use]
    pub fn head(&self) -> Option<Head> {
        self.segments.head()
    }

    /// Snapshot of the latest committed root.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the root record cannot be read.
    pub fn current_root(&self) -> CoreResult<NodeState> {
        let head = self
            .segments
            .head()
            .ok_or_else(|| CoreError::corrupt("store has no head"))?;
        {
            let cached = self.root.read();
            if cached.id() == head.root {
                return Ok(cached.clone());
            }
        }
        let state = NodeState::load(&self.reader, head.root)?;
        *self.root.write() = state.clone();
        Ok(state)
    }

    /// Starts staging changes against `from`.
    #[must_use]
    pub fn builder(&self, from: &NodeState) -> NodeBuilder {
        NodeBuilder::over(from.reader().clone(), Base::of(from))
    }

    /// Commits the changes staged in `builder`.
    ///
    /// Each attempt validates the head with `hook`, replays the builder on
    /// it, writes the new records and swaps the root. A lost swap starts a
    /// new attempt against the newer head.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Conflict`] with `attempts == 0` when a change collides
    ///   under [`ConflictPolicy::Fail`]
    /// - [`CoreError::Conflict`] with the attempt count when the root kept
    ///   moving
    /// - whatever `hook` returns
    pub fn commit(
        &self,
        builder: &NodeBuilder,
        policy: ConflictPolicy,
        hook: &dyn CommitHook,
    ) -> CoreResult<NodeState> {
        let base = builder
            .base_id()
            .ok_or_else(|| CoreError::invalid_operation("builder is not rooted in a snapshot"))?;

        for attempt in 1..=self.retries {
            let head = self.current_root()?;
            hook.validate(&head)?;
            if !builder.is_modified() {
                return Ok(head);
            }
            if head.id() != base {
                debug!(attempt, base = %base, head = %head.id(), "rebasing commit");
            }

            let mut writer = SegmentWriter::new(&self.segments);
            let mut ctx = ApplyContext {
                reader: &self.reader,
                writer: &mut writer,
                policy,
            };
            let root = builder.apply(Some(&Base::of(&head)), &mut ctx, "/")?;
            let root = writer.finish(root)?;
            if root == head.id() {
                return Ok(head);
            }

            if self.segments.compare_and_swap_root(Some(head.id()), root)? {
                let state = NodeState::load(&self.reader, root)?;
                *self.root.write() = state.clone();
                debug!(attempt, root = %root, "committed");
                return Ok(state);
            }
            warn!(attempt, "lost root swap, retrying");
        }

        warn!(attempts = self.retries, "commit retries exhausted");
        Err(CoreError::Conflict {
            attempts: self.retries,
            message: "the root kept moving".to_string(),
        })
    }

    /// Stages changes on the current root with `f` and commits them with
    /// [`ConflictPolicy::Fail`].
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, plus the errors of [`commit`](Self::commit).
    pub fn edit<F>(&self, f: F) -> CoreResult<NodeState>
    where
        F: FnOnce(&mut NodeBuilder) -> CoreResult<()>,
    {
        let root = self.current_root()?;
        let mut builder = self.builder(&root);
        f(&mut builder)?;
        self.commit(&builder, ConflictPolicy::Fail, &EmptyHook)
    }
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("segments", &self.segments)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

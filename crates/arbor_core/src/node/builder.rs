//! Staged changes against a node snapshot, and their application on commit.

use crate::error::{CoreError, CoreResult};
use crate::node::path::{join, split_path, validate_name};
use crate::node::reader::RecordReader;
use crate::node::record::NodeRecord;
use crate::node::state::NodeState;
use crate::node::store::ConflictPolicy;
use crate::node::value::PropertyState;
use crate::node::writer::{SegmentWriter, WriteRef};
use crate::types::RecordId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// The stored node a builder started from.
#[derive(Debug, Clone)]
pub(crate) struct Base {
    pub(crate) id: RecordId,
    pub(crate) record: Arc<NodeRecord>,
}

impl Base {
    pub(crate) fn of(state: &NodeState) -> Self {
        Self {
            id: state.id(),
            record: Arc::clone(state.record()),
        }
    }
}

#[derive(Debug)]
enum ChildChange {
    Edit(NodeBuilder),
    Removed,
}

/// A mutable view of one node over an immutable base.
///
/// Only changes are recorded: a property set or removal, a child added,
/// removed or edited, the orderable flag. Everything untouched stays a
/// reference to the base record, so committing a small change rewrites only
/// the nodes on the path from the root to it.
///
/// Each change remembers the base it was made against, which is what lets a
/// commit replay the builder on top of a newer head and notice when someone
/// else changed the same thing in between.
#[derive(Debug)]
pub struct NodeBuilder {
    reader: RecordReader,
    base: Option<Base>,
    properties: BTreeMap<String, Option<PropertyState>>,
    children: BTreeMap<String, ChildChange>,
    /// Children created here that do not exist in the base, in creation order.
    added: Vec<String>,
    orderable: Option<bool>,
}

impl NodeBuilder {
    pub(crate) fn over(reader: RecordReader, base: Base) -> Self {
        Self {
            reader,
            base: Some(base),
            properties: BTreeMap::new(),
            children: BTreeMap::new(),
            added: Vec::new(),
            orderable: None,
        }
    }

    fn fresh(reader: RecordReader) -> Self {
        Self {
            reader,
            base: None,
            properties: BTreeMap::new(),
            children: BTreeMap::new(),
            added: Vec::new(),
            orderable: None,
        }
    }

    /// Record id of the base node, `None` for a node created in this builder.
    #[must_use]
    pub fn base_id(&self) -> Option<RecordId> {
        self.base.as_ref().map(|b| b.id)
    }

    /// True if this node did not exist in the base.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.base.is_none()
    }

    fn base_record(&self) -> Option<&NodeRecord> {
        self.base.as_ref().map(|b| &*b.record)
    }

    /// Current value of a property, staged or from the base.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyState> {
        match self.properties.get(name) {
            Some(staged) => staged.as_ref(),
            None => self.base_record().and_then(|r| r.property(name)),
        }
    }

    /// True if the property currently exists.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Names of all current properties, sorted.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        let mut names: BTreeSet<&str> = self
            .base_record()
            .map(|r| r.properties().keys().map(String::as_str).collect())
            .unwrap_or_default();
        for (name, staged) in &self.properties {
            if staged.is_some() {
                names.insert(name.as_str());
            } else {
                names.remove(name.as_str());
            }
        }
        names.into_iter().map(String::from).collect()
    }

    /// Sets a property.
    pub fn set_property(&mut self, name: impl Into<String>, state: PropertyState) {
        let name = name.into();
        if self.base_record().and_then(|r| r.property(&name)) == Some(&state) {
            self.properties.remove(&name);
        } else {
            self.properties.insert(name, Some(state));
        }
    }

    /// Removes a property. Returns false if it did not exist.
    pub fn remove_property(&mut self, name: &str) -> bool {
        if !self.has_property(name) {
            return false;
        }
        if self.base_record().and_then(|r| r.property(name)).is_some() {
            self.properties.insert(name.to_string(), None);
        } else {
            self.properties.remove(name);
        }
        true
    }

    /// True if the child currently exists.
    #[must_use]
    pub fn has_child(&self, name: &str) -> bool {
        match self.children.get(name) {
            Some(ChildChange::Edit(_)) => true,
            Some(ChildChange::Removed) => false,
            None => self.base_record().is_some_and(|r| r.child(name).is_some()),
        }
    }

    /// Current child names: base order first, then children added here.
    #[must_use]
    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .base_record()
            .map(|r| {
                r.child_names()
                    .into_iter()
                    .filter(|n| self.has_child(n))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        names.extend(self.added.iter().cloned());
        names
    }

    /// Returns a builder for an existing child.
    ///
    /// # Errors
    ///
    /// Fails if the child's record cannot be read.
    pub fn child(&mut self, name: &str) -> CoreResult<Option<&mut NodeBuilder>> {
        if !self.children.contains_key(name) {
            let Some(id) = self.base_record().and_then(|r| r.child(name)) else {
                return Ok(None);
            };
            let record = self.reader.read(id)?;
            let child = Self::over(self.reader.clone(), Base { id, record });
            self.children
                .insert(name.to_string(), ChildChange::Edit(child));
        }
        Ok(match self.children.get_mut(name) {
            Some(ChildChange::Edit(child)) => Some(child),
            _ => None,
        })
    }

    /// Returns a builder for child `name`, creating an empty node if needed.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] for an invalid name, read errors.
    pub fn child_or_create(&mut self, name: &str) -> CoreResult<&mut NodeBuilder> {
        validate_name(name)?;
        if !self.has_child(name) {
            self.insert_new_child(name);
        }
        self.child(name)?
            .ok_or_else(|| CoreError::not_found(format!("child {name}")))
    }

    /// Replaces child `name` (if any) with a new empty node at the same
    /// position.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] for an invalid name.
    pub fn replace_child(&mut self, name: &str) -> CoreResult<&mut NodeBuilder> {
        validate_name(name)?;
        self.insert_new_child(name);
        self.child(name)?
            .ok_or_else(|| CoreError::not_found(format!("child {name}")))
    }

    fn insert_new_child(&mut self, name: &str) {
        let in_base = self.base_record().is_some_and(|r| r.child(name).is_some());
        if !in_base && !self.added.iter().any(|n| n == name) {
            self.added.push(name.to_string());
        }
        self.children.insert(
            name.to_string(),
            ChildChange::Edit(Self::fresh(self.reader.clone())),
        );
    }

    /// Removes a child and its subtree. Returns false if it did not exist.
    pub fn remove_child(&mut self, name: &str) -> bool {
        if !self.has_child(name) {
            return false;
        }
        if self.base_record().is_some_and(|r| r.child(name).is_some()) {
            self.children.insert(name.to_string(), ChildChange::Removed);
        } else {
            self.children.remove(name);
            self.added.retain(|n| n != name);
        }
        true
    }

    /// Removes every child.
    pub fn remove_all_children(&mut self) {
        for name in self.child_names() {
            self.remove_child(&name);
        }
    }

    /// Makes children keep insertion order (or not).
    pub fn set_orderable(&mut self, orderable: bool) {
        let current = self.base_record().is_some_and(NodeRecord::is_orderable);
        self.orderable = (orderable != current).then_some(orderable);
    }

    /// True if children keep insertion order.
    #[must_use]
    pub fn is_orderable(&self) -> bool {
        self.orderable
            .unwrap_or_else(|| self.base_record().is_some_and(NodeRecord::is_orderable))
    }

    /// Walks down an existing path.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] for a malformed path, read errors.
    pub fn at_path(&mut self, path: &str) -> CoreResult<Option<&mut NodeBuilder>> {
        let mut node = self;
        for name in split_path(path)? {
            match node.child(name)? {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    /// Walks down a path, creating missing nodes.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] for a malformed path, read errors.
    pub fn at_path_or_create(&mut self, path: &str) -> CoreResult<&mut NodeBuilder> {
        let mut node = self;
        for name in split_path(path)? {
            node = node.child_or_create(name)?;
        }
        Ok(node)
    }

    /// True if anything has been changed in this node or below.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.base.is_none()
            || !self.properties.is_empty()
            || self.orderable.is_some()
            || self.children.values().any(|change| match change {
                ChildChange::Removed => true,
                ChildChange::Edit(child) => child.is_modified(),
            })
    }

    /// Writes this node's changes on top of `target` and returns the result.
    ///
    /// `target` is the node at the same path in the head being committed to
    /// (`None` if it does not exist there). When the head moved since the
    /// builder was created, each change is compared with the base it was
    /// made against; a value someone else changed differently is a conflict
    /// settled by the context's policy.
    pub(crate) fn apply(
        &self,
        target: Option<&Base>,
        ctx: &mut ApplyContext<'_, '_>,
        path: &str,
    ) -> CoreResult<WriteRef> {
        if let Some(target) = target {
            if !self.is_modified() {
                return Ok(WriteRef::Existing(target.id));
            }
        }

        let ours = self.base_record();
        let theirs = target.map(|t| &*t.record);
        let empty = NodeRecord::default();
        let start = theirs.unwrap_or(&empty);

        let mut properties = start.properties().clone();
        for (name, staged) in &self.properties {
            let base_value = ours.and_then(|r| r.property(name));
            let their_value = theirs.and_then(|r| r.property(name));
            let our_value = staged.as_ref();
            let take_ours = their_value == base_value
                || their_value == our_value
                || ctx.resolve(path, &format!("property {name}"))?;
            if take_ours {
                match our_value {
                    Some(value) => properties.insert(name.clone(), value.clone()),
                    None => properties.remove(name),
                };
            }
        }

        let mut children: BTreeMap<String, WriteRef> = start
            .child_names()
            .into_iter()
            .filter_map(|n| start.child(n).map(|id| (n.to_string(), WriteRef::Existing(id))))
            .collect();

        for (name, change) in &self.children {
            let child_path = join(path, name);
            let base_child = ours.and_then(|r| r.child(name));
            let their_child = theirs.and_then(|r| r.child(name));

            match change {
                ChildChange::Removed => {
                    if their_child.is_some()
                        && (their_child == base_child
                            || ctx.resolve(&child_path, "node changed concurrently")?)
                    {
                        children.remove(name);
                    }
                }
                ChildChange::Edit(child) => match &child.base {
                    Some(child_base) => {
                        if !child.is_modified() {
                            continue;
                        }
                        match their_child {
                            Some(id) if Some(id) == base_child => {
                                let written = child.apply(Some(child_base), ctx, &child_path)?;
                                children.insert(name.clone(), written);
                            }
                            Some(id) => {
                                let moved = Base {
                                    id,
                                    record: ctx.reader.read(id)?,
                                };
                                let written = child.apply(Some(&moved), ctx, &child_path)?;
                                children.insert(name.clone(), written);
                            }
                            None => {
                                if ctx.resolve(&child_path, "node removed concurrently")? {
                                    let written = child.apply(Some(child_base), ctx, &child_path)?;
                                    children.insert(name.clone(), written);
                                }
                            }
                        }
                    }
                    None => {
                        if their_child == base_child
                            || ctx.resolve(&child_path, "node added concurrently")?
                        {
                            let written = child.apply(None, ctx, &child_path)?;
                            children.insert(name.clone(), written);
                        }
                    }
                },
            }
        }

        let orderable = self
            .orderable
            .unwrap_or_else(|| theirs.is_some_and(NodeRecord::is_orderable));
        let child_order = orderable.then(|| {
            let mut seen = BTreeSet::new();
            let mut order = Vec::with_capacity(children.len());
            let candidates = start
                .child_names()
                .into_iter()
                .map(String::from)
                .chain(self.child_names())
                .chain(children.keys().cloned().collect::<Vec<_>>());
            for name in candidates {
                if children.contains_key(&name) && seen.insert(name.clone()) {
                    order.push(name);
                }
            }
            order
        });

        if let Some(target) = target {
            if unchanged(target, &properties, &children, child_order.as_deref()) {
                return Ok(WriteRef::Existing(target.id));
            }
        }

        ctx.writer.write_node(properties, &children, child_order)
    }
}

fn unchanged(
    target: &Base,
    properties: &BTreeMap<String, PropertyState>,
    children: &BTreeMap<String, WriteRef>,
    child_order: Option<&[String]>,
) -> bool {
    let record = &target.record;
    record.properties() == properties
        && record.child_count() == children.len()
        && children
            .iter()
            .all(|(name, r)| matches!(r, WriteRef::Existing(id) if record.child(name) == Some(*id)))
        && record.child_order() == child_order
}

/// State shared while one commit attempt writes its records.
pub(crate) struct ApplyContext<'a, 'w> {
    pub(crate) reader: &'a RecordReader,
    pub(crate) writer: &'a mut SegmentWriter<'w>,
    pub(crate) policy: ConflictPolicy,
}

impl ApplyContext<'_, '_> {
    /// Decides a conflict: `Ok(true)` keeps our change, `Ok(false)` keeps
    /// theirs.
    fn resolve(&self, path: &str, what: &str) -> CoreResult<bool> {
        match self.policy {
            ConflictPolicy::Fail => Err(CoreError::conflict(format!("{what} at {path}"))),
            ConflictPolicy::Ours => Ok(true),
            ConflictPolicy::Theirs => Ok(false),
        }
    }
}

//! The node type registry: definitions stored as content.

use crate::cnd;
use crate::error::{CoreError, CoreResult};
use crate::node::{ConflictPolicy, NodeBuilder, NodeState, NodeStore, JCR_MIXIN_TYPES};
use crate::nodetype::builtin::BUILTIN_NODE_TYPES;
use crate::nodetype::compat::check_compatibility;
use crate::nodetype::definition::{PropertyDefinition, TypeDefinition};
use crate::nodetype::name::{is_prefix, QualifiedName};
use crate::nodetype::persist::{
    ensure_registry_root, write_definition, write_namespace, RegistrySnapshot, NODE_TYPES_PATH,
};
use crate::nodetype::validate::{check_definition, effective_properties, supertype_closure};
use crate::types::RecordId;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Tells whether content still uses a node type.
pub trait TypeUsage: Send + Sync {
    /// Describes a use of `name` below `root`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Read errors while looking.
    fn find_usage(&self, root: &NodeState, name: &QualifiedName) -> CoreResult<Option<String>>;
}

/// Walks the whole tree looking for nodes whose primary or mixin types
/// name the type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentScan;

impl TypeUsage for ContentScan {
    fn find_usage(&self, root: &NodeState, name: &QualifiedName) -> CoreResult<Option<String>> {
        let name = name.to_string();
        let mut stack = vec![(String::from("/"), root.clone())];
        while let Some((path, node)) = stack.pop() {
            let mixins = node
                .property(JCR_MIXIN_TYPES)
                .map(|p| p.as_strings())
                .unwrap_or_default();
            if node.primary_type() == Some(name.as_str()) || mixins.contains(&name.as_str()) {
                return Ok(Some(format!("node {path} is of that type")));
            }
            for (child_name, child) in node.children()? {
                let child_path = if path == "/" {
                    format!("/{child_name}")
                } else {
                    format!("{path}/{child_name}")
                };
                stack.push((child_path, child));
            }
        }
        Ok(None)
    }
}

/// What a registration batch changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationOutcome {
    /// Newly registered namespace prefixes.
    pub namespaces: Vec<String>,
    /// Newly registered types.
    pub added: Vec<QualifiedName>,
    /// Types whose stored definition was replaced.
    pub updated: Vec<QualifiedName>,
    /// Types re-registered with an identical definition.
    pub unchanged: Vec<QualifiedName>,
}

impl RegistrationOutcome {
    /// True if the batch changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.namespaces.is_empty() && self.added.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Update,
    Unchanged,
}

/// The validated changes of one batch against one registry state.
#[derive(Debug, PartialEq, Eq)]
struct Plan {
    namespaces: Vec<(String, String)>,
    entries: Vec<(TypeDefinition, Action)>,
}

impl Plan {
    fn outcome(&self) -> RegistrationOutcome {
        let mut outcome = RegistrationOutcome {
            namespaces: self.namespaces.iter().map(|(p, _)| p.clone()).collect(),
            ..RegistrationOutcome::default()
        };
        for (def, action) in &self.entries {
            let list = match action {
                Action::Add => &mut outcome.added,
                Action::Update => &mut outcome.updated,
                Action::Unchanged => &mut outcome.unchanged,
            };
            list.push(def.name.clone());
        }
        outcome
    }

    fn stage(&self, root: &mut NodeBuilder) -> CoreResult<()> {
        let types = ensure_registry_root(root)?;
        for (prefix, uri) in &self.namespaces {
            write_namespace(types, prefix, uri)?;
        }
        for (def, action) in &self.entries {
            if *action == Action::Unchanged {
                continue;
            }
            let namespace = types
                .child(def.name.prefix())?
                .ok_or_else(|| CoreError::not_found(format!("namespace {}", def.name.prefix())))?;
            let node = namespace.replace_child(&def.name.to_string())?;
            write_definition(node, def)?;
        }
        Ok(())
    }
}

/// Validates a batch against `snapshot`.
fn plan_batch(
    snapshot: &RegistrySnapshot,
    namespaces: &[(String, String)],
    definitions: &[TypeDefinition],
    allow_update: bool,
) -> CoreResult<Plan> {
    let mut all_namespaces = snapshot.namespaces.clone();
    let mut new_namespaces = Vec::new();
    for (prefix, uri) in namespaces {
        if !is_prefix(prefix) {
            return Err(CoreError::invalid_definition(
                prefix.as_str(),
                "not a valid namespace prefix",
            ));
        }
        match all_namespaces.get(prefix) {
            Some(existing) if existing == uri => {}
            Some(existing) => {
                return Err(CoreError::AlreadyExists {
                    name: format!("namespace {prefix} (mapped to {existing})"),
                })
            }
            None => {
                if let Some((other, _)) = all_namespaces.iter().find(|(_, u)| *u == uri) {
                    return Err(CoreError::AlreadyExists {
                        name: format!("namespace URI {uri} (mapped to prefix {other})"),
                    });
                }
                all_namespaces.insert(prefix.clone(), uri.clone());
                new_namespaces.push((prefix.clone(), uri.clone()));
            }
        }
    }

    let mut types = snapshot.types.clone();
    let mut seen = BTreeSet::new();
    for def in definitions {
        if !seen.insert(&def.name) {
            return Err(CoreError::invalid_definition(
                def.name.to_string(),
                "declared twice in one batch",
            ));
        }
        types.insert(def.name.clone(), def.clone());
    }

    for def in definitions {
        check_definition(def, &types, &all_namespaces)?;
    }
    // Updated supertypes must still combine cleanly with every subtype.
    for name in types.keys() {
        if !seen.contains(name) {
            effective_properties(name, &types)?;
        }
    }

    let mut entries = Vec::with_capacity(definitions.len());
    for def in definitions {
        let action = match snapshot.types.get(&def.name) {
            None => Action::Add,
            Some(_) if !allow_update => {
                return Err(CoreError::AlreadyExists {
                    name: def.name.to_string(),
                })
            }
            Some(old) => {
                let verdict = check_compatibility(old, def);
                if verdict.is_unchanged() {
                    Action::Unchanged
                } else if let Some(reason) = verdict.rejection_reason() {
                    return Err(CoreError::incompatible(def.name.to_string(), reason));
                } else {
                    Action::Update
                }
            }
        };
        entries.push((def.clone(), action));
    }

    Ok(Plan {
        namespaces: new_namespaces,
        entries,
    })
}

/// Registered node types of one node store.
///
/// Definitions live under `/jcr:system/jcr:nodeTypes` in the store itself,
/// so every read sees the registry as of the current root and every batch
/// is committed atomically with the root swap.
pub struct NodeTypeRegistry {
    store: Arc<NodeStore>,
    usage: Arc<dyn TypeUsage>,
    cache: Mutex<Option<(Option<RecordId>, Arc<RegistrySnapshot>)>>,
}

impl NodeTypeRegistry {
    /// A registry over `store` that scans content before unregistering.
    #[must_use]
    pub fn new(store: Arc<NodeStore>) -> Self {
        Self::with_usage(store, Arc::new(ContentScan))
    }

    /// A registry that asks `usage` whether a type is still in use.
    #[must_use]
    pub fn with_usage(store: Arc<NodeStore>, usage: Arc<dyn TypeUsage>) -> Self {
        Self {
            store,
            usage,
            cache: Mutex::new(None),
        }
    }

    /// The node store holding the definitions.
    #[must_use]
    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    /// The registry as of the current root.
    ///
    /// # Errors
    ///
    /// Read errors and corrupt definition nodes.
    pub fn snapshot(&self) -> CoreResult<Arc<RegistrySnapshot>> {
        let root = self.store.current_root()?;
        self.snapshot_of(&root)
    }

    fn snapshot_of(&self, root: &NodeState) -> CoreResult<Arc<RegistrySnapshot>> {
        let key = root.node_at(NODE_TYPES_PATH)?.map(|n| n.id());
        if let Some((cached_key, snapshot)) = &*self.cache.lock() {
            if *cached_key == key {
                return Ok(Arc::clone(snapshot));
            }
        }
        let snapshot = Arc::new(RegistrySnapshot::load(root)?);
        *self.cache.lock() = Some((key, Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    /// The registered definition of `name`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no such type is registered.
    pub fn lookup(&self, name: &str) -> CoreResult<TypeDefinition> {
        let qname = parse_registered_name(name)?;
        self.snapshot()?
            .types
            .get(&qname)
            .cloned()
            .ok_or_else(|| not_registered(name))
    }

    /// True if `name` is registered.
    ///
    /// # Errors
    ///
    /// Read errors.
    pub fn has_type(&self, name: &str) -> CoreResult<bool> {
        let Ok(qname) = QualifiedName::parse(name) else {
            return Ok(false);
        };
        Ok(self.snapshot()?.types.contains_key(&qname))
    }

    /// Every registered type, sorted by name.
    ///
    /// # Errors
    ///
    /// Read errors.
    pub fn list_types(&self) -> CoreResult<Vec<TypeDefinition>> {
        Ok(self.snapshot()?.types.values().cloned().collect())
    }

    /// Declared and inherited property definitions of `name`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no such type is registered.
    pub fn effective_properties(&self, name: &str) -> CoreResult<Vec<PropertyDefinition>> {
        let qname = parse_registered_name(name)?;
        effective_properties(&qname, &self.snapshot()?.types)
    }

    /// All supertypes of `name`, nearest first.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no such type is registered.
    pub fn supertypes(&self, name: &str) -> CoreResult<Vec<QualifiedName>> {
        let qname = parse_registered_name(name)?;
        supertype_closure(&qname, &self.snapshot()?.types)
    }

    /// Registered namespaces, prefix to URI.
    ///
    /// # Errors
    ///
    /// Read errors.
    pub fn namespaces(&self) -> CoreResult<BTreeMap<String, String>> {
        Ok(self.snapshot()?.namespaces.clone())
    }

    /// Registers a namespace. Registering the same mapping again is a no-op.
    ///
    /// # Errors
    ///
    /// [`CoreError::AlreadyExists`] if the prefix or URI is mapped
    /// differently.
    pub fn register_namespace(&self, prefix: &str, uri: &str) -> CoreResult<()> {
        self.register_document(&[(prefix.to_string(), uri.to_string())], Vec::new(), false)
            .map(|_| ())
    }

    /// Registers or updates a batch of types, all or nothing.
    ///
    /// # Errors
    ///
    /// See [`register_document`](Self::register_document).
    pub fn register(
        &self,
        definitions: Vec<TypeDefinition>,
        allow_update: bool,
    ) -> CoreResult<RegistrationOutcome> {
        self.register_document(&[], definitions, allow_update)
    }

    /// Registers namespaces and types in one atomic commit.
    ///
    /// Existing types are updated only with `allow_update` and only when the
    /// new definition keeps existing content valid. If the registry changes
    /// while the batch is being committed, the batch is validated again
    /// against the new state.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidDefinition`] for a malformed definition
    /// - [`CoreError::AlreadyExists`] for an existing type without
    ///   `allow_update`, or a conflicting namespace
    /// - [`CoreError::IncompatibleChange`] for an update that could
    ///   invalidate content
    /// - [`CoreError::Conflict`] if the registry kept changing
    pub fn register_document(
        &self,
        namespaces: &[(String, String)],
        definitions: Vec<TypeDefinition>,
        allow_update: bool,
    ) -> CoreResult<RegistrationOutcome> {
        let retries = self.store.segments().config().commit_retries.max(1);
        for attempt in 1..=retries {
            let root = self.store.current_root()?;
            let snapshot = self.snapshot_of(&root)?;
            let plan = plan_batch(&snapshot, namespaces, &definitions, allow_update)?;
            let outcome = plan.outcome();
            if outcome.is_noop() {
                return Ok(outcome);
            }

            let mut builder = self.store.builder(&root);
            plan.stage(&mut builder)?;

            let hook = |head: &NodeState| -> CoreResult<()> {
                if head.id() == root.id() {
                    return Ok(());
                }
                let current = RegistrySnapshot::load(head)?;
                let replanned = plan_batch(&current, namespaces, &definitions, allow_update)?;
                if replanned == plan {
                    Ok(())
                } else {
                    Err(CoreError::conflict("registry changed during registration"))
                }
            };

            match self.store.commit(&builder, ConflictPolicy::Fail, &hook) {
                Ok(_) => {
                    info!(
                        namespaces = outcome.namespaces.len(),
                        added = outcome.added.len(),
                        updated = outcome.updated.len(),
                        unchanged = outcome.unchanged.len(),
                        "registered node types"
                    );
                    return Ok(outcome);
                }
                Err(CoreError::Conflict { attempts: 0, .. }) => {
                    debug!(attempt, "registry changed concurrently, planning again");
                }
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::Conflict {
            attempts: retries,
            message: "the registry kept changing".to_string(),
        })
    }

    /// Registers the built-in namespaces and types. Idempotent.
    ///
    /// # Errors
    ///
    /// Commit errors.
    pub fn register_builtins(&self) -> CoreResult<RegistrationOutcome> {
        cnd::import(self, BUILTIN_NODE_TYPES, true)
    }

    /// Removes a type definition.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if no such type is registered
    /// - [`CoreError::InUse`] if another type refers to it or content uses it
    pub fn unregister(&self, name: &str) -> CoreResult<()> {
        let qname = parse_registered_name(name)?;
        let retries = self.store.segments().config().commit_retries.max(1);
        for attempt in 1..=retries {
            let root = self.store.current_root()?;
            let snapshot = self.snapshot_of(&root)?;
            let def = self.check_removable(&root, &snapshot, &qname)?;

            let mut builder = self.store.builder(&root);
            let namespace = builder
                .at_path(&format!("{NODE_TYPES_PATH}/{}", qname.prefix()))?
                .ok_or_else(|| CoreError::corrupt(format!("namespace node of {qname} missing")))?;
            namespace.remove_child(&qname.to_string());

            let hook = |head: &NodeState| -> CoreResult<()> {
                if head.id() == root.id() {
                    return Ok(());
                }
                let current = RegistrySnapshot::load(head)?;
                if self.check_removable(head, &current, &qname)? == def {
                    Ok(())
                } else {
                    Err(CoreError::conflict("definition changed during removal"))
                }
            };

            match self.store.commit(&builder, ConflictPolicy::Fail, &hook) {
                Ok(_) => {
                    info!(name = %qname, "unregistered node type");
                    return Ok(());
                }
                Err(CoreError::Conflict { attempts: 0, .. }) => {
                    debug!(attempt, name = %qname, "registry changed concurrently, retrying removal");
                }
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::Conflict {
            attempts: retries,
            message: "the registry kept changing".to_string(),
        })
    }

    fn check_removable(
        &self,
        root: &NodeState,
        snapshot: &RegistrySnapshot,
        name: &QualifiedName,
    ) -> CoreResult<TypeDefinition> {
        let def = snapshot
            .types
            .get(name)
            .cloned()
            .ok_or_else(|| not_registered(&name.to_string()))?;
        if let Some(dependent) = snapshot
            .types
            .values()
            .find(|t| t.name != *name && t.references().any(|r| r == name))
        {
            return Err(CoreError::in_use(
                name.to_string(),
                format!("referenced by {}", dependent.name),
            ));
        }
        if let Some(reason) = self.usage.find_usage(root, name)? {
            return Err(CoreError::in_use(name.to_string(), reason));
        }
        Ok(def)
    }
}

impl std::fmt::Debug for NodeTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTypeRegistry")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

fn not_registered(name: &str) -> CoreError {
    CoreError::not_found(format!("node type {name}"))
}

fn parse_registered_name(name: &str) -> CoreResult<QualifiedName> {
    QualifiedName::parse(name).map_err(|_| not_registered(name))
}

//! Repository bootstrap, login and sessions.

use crate::cnd;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::node::{NodeBuilder, NodeState, NodeStore};
use crate::nodetype::{
    ChildNodeDefinition, NodeTypeRegistry, PropertyDefinition, QualifiedName,
    RegistrationOutcome, TypeDefinition,
};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// User name and password presented at login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// The user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// A content repository: a node store plus the type registry inside it.
///
/// # Example
///
/// ```rust
/// use arbor_core::{Config, Credentials, Repository};
///
/// let repo = Repository::in_memory(Config::default()).unwrap();
/// let session = repo.login(&Credentials::new("admin", "admin")).unwrap();
/// let types = session.workspace().node_type_manager();
/// assert!(types.has_node_type("nt:unstructured").unwrap());
/// session.logout();
/// repo.shutdown().unwrap();
/// ```
pub struct Repository {
    store: Arc<NodeStore>,
    registry: Arc<NodeTypeRegistry>,
    admin: Credentials,
}

impl Repository {
    /// Builds a repository over `store`, registering the built-in node types
    /// if the store has none yet.
    ///
    /// # Errors
    ///
    /// Read and commit errors.
    pub fn create(store: Arc<NodeStore>) -> CoreResult<Self> {
        let config = store.segments().config().clone();
        let registry = Arc::new(NodeTypeRegistry::new(Arc::clone(&store)));
        if !registry.has_type("nt:base")? {
            let outcome = registry.register_builtins()?;
            info!(types = outcome.added.len(), "bootstrapped node types");
        }
        Ok(Self {
            store,
            registry,
            admin: Credentials::new(config.admin_user, config.admin_password),
        })
    }

    /// Opens (or creates) the archive in `path`.
    ///
    /// # Errors
    ///
    /// The errors of [`NodeStore::open`] and [`Repository::create`].
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        Self::create(Arc::new(NodeStore::open(path, config)?))
    }

    /// A repository that lives in memory.
    ///
    /// # Errors
    ///
    /// Commit errors while bootstrapping.
    pub fn in_memory(config: Config) -> CoreResult<Self> {
        Self::create(Arc::new(NodeStore::in_memory(config)?))
    }

    /// Starts a session.
    ///
    /// # Errors
    ///
    /// [`CoreError::LoginFailed`] for unknown credentials,
    /// [`CoreError::StoreClosed`] after [`shutdown`](Self::shutdown).
    pub fn login(&self, credentials: &Credentials) -> CoreResult<Session> {
        if self.store.segments().is_closed() {
            return Err(CoreError::StoreClosed);
        }
        if *credentials != self.admin {
            return Err(CoreError::LoginFailed {
                user: credentials.user.clone(),
            });
        }
        Ok(Session {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            user: credentials.user.clone(),
        })
    }

    /// The underlying node store.
    #[must_use]
    pub fn node_store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    /// The node type registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.registry
    }

    /// Closes the underlying store. Idempotent.
    ///
    /// # Errors
    ///
    /// Flush or sync errors.
    pub fn shutdown(&self) -> CoreResult<()> {
        self.store.segments().close()
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// A logged-in user's view of the repository.
#[derive(Debug)]
pub struct Session {
    store: Arc<NodeStore>,
    registry: Arc<NodeTypeRegistry>,
    user: String,
}

impl Session {
    /// The logged-in user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user
    }

    /// The current root node.
    ///
    /// # Errors
    ///
    /// Read errors, [`CoreError::StoreClosed`].
    pub fn root_node(&self) -> CoreResult<NodeState> {
        self.store.current_root()
    }

    /// The node at an absolute path.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] for a relative or malformed path,
    /// [`CoreError::NotFound`] if no node is there.
    pub fn get_node(&self, path: &str) -> CoreResult<NodeState> {
        if !path.starts_with('/') {
            return Err(CoreError::invalid_path(path));
        }
        self.root_node()?
            .node_at(path)?
            .ok_or_else(|| CoreError::not_found(format!("node {path}")))
    }

    /// True if a node exists at the absolute path.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] for a relative or malformed path.
    pub fn node_exists(&self, path: &str) -> CoreResult<bool> {
        match self.get_node(path) {
            Ok(_) => Ok(true),
            Err(CoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Stages changes on the current root with `f` and commits them.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, plus commit errors.
    pub fn edit<F>(&self, f: F) -> CoreResult<NodeState>
    where
        F: FnOnce(&mut NodeBuilder) -> CoreResult<()>,
    {
        self.store.edit(f)
    }

    /// The session's workspace.
    #[must_use]
    pub fn workspace(&self) -> Workspace<'_> {
        Workspace { session: self }
    }

    /// Ends the session.
    pub fn logout(self) {}
}

/// The single workspace of a repository.
#[derive(Debug, Clone, Copy)]
pub struct Workspace<'a> {
    session: &'a Session,
}

impl<'a> Workspace<'a> {
    /// Workspace name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        "default"
    }

    /// Access to node type registration.
    #[must_use]
    pub fn node_type_manager(&self) -> NodeTypeManager<'a> {
        NodeTypeManager {
            registry: &self.session.registry,
        }
    }
}

/// Node type queries and registration for a session.
#[derive(Debug, Clone, Copy)]
pub struct NodeTypeManager<'a> {
    registry: &'a NodeTypeRegistry,
}

impl NodeTypeManager<'_> {
    /// True if `name` is registered.
    ///
    /// # Errors
    ///
    /// Read errors.
    pub fn has_node_type(&self, name: &str) -> CoreResult<bool> {
        self.registry.has_type(name)
    }

    /// The registered type `name`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if no such type is registered.
    pub fn get_node_type(&self, name: &str) -> CoreResult<NodeType> {
        let definition = self.registry.lookup(name)?;
        let supertypes = self.registry.supertypes(name)?;
        let effective = self.registry.effective_properties(name)?;
        Ok(NodeType {
            definition,
            supertypes,
            effective,
        })
    }

    /// Every registered type.
    ///
    /// # Errors
    ///
    /// Read errors.
    pub fn all_node_types(&self) -> CoreResult<Vec<NodeType>> {
        self.registry
            .list_types()?
            .iter()
            .map(|def| self.get_node_type(&def.name.to_string()))
            .collect()
    }

    /// Registers the namespaces and types declared in CND text.
    ///
    /// # Errors
    ///
    /// Syntax and registration errors; nothing is registered on error.
    pub fn register_node_types(
        &self,
        cnd: &str,
        allow_update: bool,
    ) -> CoreResult<RegistrationOutcome> {
        cnd::import(self.registry, cnd, allow_update)
    }

    /// Registers or updates one type.
    ///
    /// # Errors
    ///
    /// Registration errors.
    pub fn register_node_type(
        &self,
        definition: TypeDefinition,
        allow_update: bool,
    ) -> CoreResult<RegistrationOutcome> {
        self.registry.register(vec![definition], allow_update)
    }

    /// Removes a type.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`], [`CoreError::InUse`].
    pub fn unregister_node_type(&self, name: &str) -> CoreResult<()> {
        self.registry.unregister(name)
    }
}

/// A registered node type together with what it inherits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeType {
    definition: TypeDefinition,
    supertypes: Vec<QualifiedName>,
    effective: Vec<PropertyDefinition>,
}

impl NodeType {
    /// Type name.
    #[must_use]
    pub fn name(&self) -> &QualifiedName {
        &self.definition.name
    }

    /// The stored definition.
    #[must_use]
    pub fn definition(&self) -> &TypeDefinition {
        &self.definition
    }

    /// Property definitions declared by this type.
    #[must_use]
    pub fn declared_property_definitions(&self) -> &[PropertyDefinition] {
        &self.definition.properties
    }

    /// Child node definitions declared by this type.
    #[must_use]
    pub fn declared_child_node_definitions(&self) -> &[ChildNodeDefinition] {
        &self.definition.children
    }

    /// Declared and inherited property definitions.
    #[must_use]
    pub fn property_definitions(&self) -> &[PropertyDefinition] {
        &self.effective
    }

    /// All supertypes, nearest first.
    #[must_use]
    pub fn supertypes(&self) -> &[QualifiedName] {
        &self.supertypes
    }

    /// Supertypes named in the definition.
    #[must_use]
    pub fn declared_supertypes(&self) -> &[QualifiedName] {
        &self.definition.supertypes
    }

    /// True for mixin types.
    #[must_use]
    pub fn is_mixin(&self) -> bool {
        self.definition.is_mixin
    }

    /// True for abstract types.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.definition.is_abstract
    }

    /// True if this type is `name` or inherits from it.
    #[must_use]
    pub fn is_node_type(&self, name: &str) -> bool {
        self.definition.name.to_string() == name
            || self.supertypes.iter().any(|s| s.to_string() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PropertyState;
    use tempfile::tempdir;

    fn admin() -> Credentials {
        Credentials::new("admin", "admin")
    }

    #[test]
    fn login_checks_credentials() {
        let repo = Repository::in_memory(Config::default()).unwrap();
        let session = repo.login(&admin()).unwrap();
        assert_eq!(session.user_id(), "admin");

        let err = repo.login(&Credentials::new("admin", "wrong")).unwrap_err();
        assert!(matches!(err, CoreError::LoginFailed { ref user } if user == "admin"));

        let custom = Repository::in_memory(Config::default().admin_credentials("root", "s3cret")).unwrap();
        assert!(custom.login(&admin()).is_err());
        custom.login(&Credentials::new("root", "s3cret")).unwrap();
    }

    #[test]
    fn credentials_hide_the_password() {
        let debug = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn bootstrap_registers_builtins_once() {
        let repo = Repository::in_memory(Config::default()).unwrap();
        let head = repo.node_store().head();
        let again = Repository::create(Arc::clone(repo.node_store())).unwrap();
        assert_eq!(again.node_store().head(), head);

        let session = repo.login(&admin()).unwrap();
        assert!(session.node_exists("/jcr:system/jcr:nodeTypes/nt/nt:base").unwrap());
        assert!(!session.node_exists("/nowhere").unwrap());
        assert!(matches!(session.get_node("relative"), Err(CoreError::InvalidPath { .. })));
    }

    #[test]
    fn node_type_manager_reports_definitions() {
        let repo = Repository::in_memory(Config::default()).unwrap();
        let session = repo.login(&admin()).unwrap();
        let types = session.workspace().node_type_manager();

        types
            .register_node_types(
                "<'test'='urn:test'>\n[test:Doc] > nt:hierarchyNode, mix:title\n - test:body (string) mandatory",
                false,
            )
            .unwrap();

        let doc = types.get_node_type("test:Doc").unwrap();
        assert_eq!(doc.name().to_string(), "test:Doc");
        assert_eq!(doc.declared_property_definitions().len(), 1);
        assert!(doc.declared_child_node_definitions().is_empty());
        assert!(doc.is_node_type("nt:base"));
        assert!(doc.is_node_type("mix:title"));
        assert!(!doc.is_node_type("nt:folder"));
        assert!(!doc.is_mixin());

        let names: Vec<&str> = doc
            .property_definitions()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert!(names.contains(&"test:body"));
        assert!(names.contains(&"jcr:title"));
        assert!(names.contains(&"jcr:primaryType"));

        assert!(types.all_node_types().unwrap().len() > 10);
        assert!(matches!(types.get_node_type("test:Nope"), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn sessions_edit_content() {
        let repo = Repository::in_memory(Config::default()).unwrap();
        let session = repo.login(&admin()).unwrap();
        session
            .edit(|root| {
                let node = root.at_path_or_create("content/page")?;
                node.set_property("jcr:title", PropertyState::string("Home"));
                Ok(())
            })
            .unwrap();
        let page = session.get_node("/content/page").unwrap();
        assert_eq!(page.property("jcr:title").and_then(PropertyState::as_str), Some("Home"));
    }

    #[test]
    fn shutdown_then_reopen() {
        let dir = tempdir().unwrap();
        {
            let repo = Repository::open(dir.path(), Config::default()).unwrap();
            let session = repo.login(&admin()).unwrap();
            session
                .workspace()
                .node_type_manager()
                .register_node_types("<'test'='urn:test'>\n[test:T] > nt:base", false)
                .unwrap();
            session.logout();
            repo.shutdown().unwrap();
            repo.shutdown().unwrap();
            assert!(matches!(repo.login(&admin()), Err(CoreError::StoreClosed)));
        }

        let repo = Repository::open(dir.path(), Config::default()).unwrap();
        let session = repo.login(&admin()).unwrap();
        assert!(session.workspace().node_type_manager().has_node_type("test:T").unwrap());
    }
}

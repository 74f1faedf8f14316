//! Test fixtures and repository helpers.
//!
//! Fixtures own a temporary directory and can close and reopen the store
//! inside it, which is how tests simulate a process restart.

use arbor_core::{
    Config, CoreResult, Credentials, NodeState, NodeStore, PropertyState, Repository, Session,
    JCR_PRIMARY_TYPE,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Namespace URI used by the test types.
pub const TEST_NAMESPACE: &str = "http://www.apache.org/jackrabbit/test";

/// `test:MyType` with one mandatory and one optional property.
pub const MY_TYPE_V1: &str = "<'test'='http://www.apache.org/jackrabbit/test'>
[test:MyType] > nt:unstructured
 - test:mandatory (string) mandatory
 - test:optional (string)
";

/// `test:MyType` with both properties optional.
pub const MY_TYPE_V2: &str = "<'test'='http://www.apache.org/jackrabbit/test'>
[test:MyType] > nt:unstructured
 - test:mandatory (string)
 - test:optional (string)
";

/// `test:MyType` without the optional property.
pub const MY_TYPE_WITHOUT_OPTIONAL: &str = "<'test'='http://www.apache.org/jackrabbit/test'>
[test:MyType] > nt:unstructured
 - test:mandatory (string) mandatory
";

/// A node store in a temporary directory.
pub struct TestStore {
    store: Option<Arc<NodeStore>>,
    config: Config,
    dir: TempDir,
}

impl TestStore {
    /// Creates a store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a store with `config`.
    pub fn with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = NodeStore::open(dir.path(), config.clone()).expect("Failed to open node store");
        Self {
            store: Some(Arc::new(store)),
            config,
            dir,
        }
    }

    /// The archive directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The open store.
    pub fn store(&self) -> &Arc<NodeStore> {
        self.store.as_ref().expect("Store is closed")
    }

    /// Closes the store, leaving the archive on disk.
    pub fn close(&mut self) {
        if let Some(store) = self.store.take() {
            store.segments().close().expect("Failed to close store");
        }
    }

    /// Closes and opens the store again.
    pub fn reopen(&mut self) -> &Arc<NodeStore> {
        self.try_reopen().expect("Failed to reopen node store")
    }

    /// Closes and opens the store again, returning the open error.
    pub fn try_reopen(&mut self) -> CoreResult<&Arc<NodeStore>> {
        self.close();
        let store = NodeStore::open(self.dir.path(), self.config.clone())?;
        Ok(&*self.store.insert(Arc::new(store)))
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = NodeStore;

    fn deref(&self) -> &Self::Target {
        self.store()
    }
}

/// A repository in a temporary directory.
pub struct TestRepository {
    repo: Option<Repository>,
    config: Config,
    dir: TempDir,
}

impl TestRepository {
    /// Creates a repository with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a repository with `config`.
    pub fn with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let repo = Repository::open(dir.path(), config.clone()).expect("Failed to open repository");
        Self {
            repo: Some(repo),
            config,
            dir,
        }
    }

    /// The archive directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The open repository.
    pub fn repository(&self) -> &Repository {
        self.repo.as_ref().expect("Repository is shut down")
    }

    /// Logs in with the configured admin credentials.
    pub fn login(&self) -> Session {
        let credentials = Credentials::new(&self.config.admin_user, &self.config.admin_password);
        self.repository().login(&credentials).expect("Failed to log in")
    }

    /// Shuts the repository down, leaving the archive on disk.
    pub fn shutdown(&mut self) {
        if let Some(repo) = self.repo.take() {
            repo.shutdown().expect("Failed to shut down repository");
        }
    }

    /// Shuts down and opens the repository again.
    pub fn reopen(&mut self) -> &Repository {
        self.shutdown();
        let repo = Repository::open(self.dir.path(), self.config.clone())
            .expect("Failed to reopen repository");
        self.repo.insert(repo)
    }
}

impl Default for TestRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestRepository {
    type Target = Repository;

    fn deref(&self) -> &Self::Target {
        self.repository()
    }
}

/// Runs a test with an in-memory repository.
pub fn with_memory_repository<F, R>(f: F) -> R
where
    F: FnOnce(&Repository) -> R,
{
    let repo = Repository::in_memory(Config::default()).expect("Failed to open repository");
    f(&repo)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Adds `count` nodes of `node_type` under `/content`, each with the
    /// properties in `properties`.
    pub fn populate(
        session: &Session,
        node_type: &str,
        count: usize,
        properties: &[(&str, &str)],
    ) -> NodeState {
        session
            .edit(|root| {
                let content = root.at_path_or_create("/content")?;
                content.set_property(JCR_PRIMARY_TYPE, PropertyState::name("nt:unstructured"));
                for i in 0..count {
                    let node = content.child_or_create(&format!("node{i}"))?;
                    node.set_property(JCR_PRIMARY_TYPE, PropertyState::name(node_type));
                    for (name, value) in properties {
                        node.set_property(*name, PropertyState::string(*value));
                    }
                }
                Ok(())
            })
            .expect("Failed to populate content")
    }

    /// A repository with the first version of `test:MyType` registered and
    /// `count` instances of it under `/content`.
    pub fn upgradable_repository(count: usize) -> TestRepository {
        let repo = TestRepository::new();
        repo.login()
            .workspace()
            .node_type_manager()
            .register_node_types(MY_TYPE_V1, false)
            .expect("Failed to register test:MyType");
        populate(
            &repo.login(),
            "test:MyType",
            count,
            &[("test:mandatory", "present")],
        );
        repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_has_builtins() {
        let repo = TestRepository::new();
        assert!(repo.registry().has_type("nt:unstructured").unwrap());
    }

    #[test]
    fn test_store_reopens() {
        let mut store = TestStore::new();
        store
            .edit(|root| {
                root.child_or_create("kept")?;
                Ok(())
            })
            .unwrap();

        let store = store.reopen();
        assert!(store.current_root().unwrap().has_child("kept"));
    }

    #[test]
    fn populated_scenario() {
        let repo = scenarios::upgradable_repository(3);
        let session = repo.login();
        assert!(session.node_exists("/content/node2").unwrap());
        assert!(!session.node_exists("/content/node3").unwrap());
    }

    #[test]
    fn memory_repository_logs_in() {
        with_memory_repository(|repo| {
            let session = repo.login(&Credentials::new("admin", "admin")).unwrap();
            assert_eq!(session.user_id(), "admin");
        });
    }
}

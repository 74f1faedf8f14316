//! A repository created in one process and upgraded in another.

use arbor_core::{CoreError, NodeTypeManager};
use arbor_testkit::prelude::*;

fn declared_flags(manager: &NodeTypeManager<'_>) -> Vec<(String, bool)> {
    manager
        .get_node_type("test:MyType")
        .unwrap()
        .declared_property_definitions()
        .iter()
        .map(|p| (p.name.clone(), p.mandatory))
        .collect()
}

fn property_definition_children(repo: &TestRepository) -> Vec<String> {
    let session = repo.login();
    let node = session
        .get_node("/jcr:system/jcr:nodeTypes/test/test:MyType")
        .unwrap();
    node.child_names()
        .into_iter()
        .filter(|name| name.starts_with("jcr:propertyDefinition"))
        .map(String::from)
        .collect()
}

#[test]
fn relaxing_mandatory_survives_restart() {
    let mut repo = scenarios::upgradable_repository(5);
    {
        let session = repo.login();
        let manager = session.workspace().node_type_manager();
        assert_eq!(
            declared_flags(&manager),
            vec![
                ("test:mandatory".to_string(), true),
                ("test:optional".to_string(), false),
            ]
        );
    }

    repo.reopen();
    let outcome = repo
        .login()
        .workspace()
        .node_type_manager()
        .register_node_types(MY_TYPE_V2, true)
        .unwrap();
    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.updated[0].to_string(), "test:MyType");

    let check = |repo: &TestRepository| {
        let session = repo.login();
        let manager = session.workspace().node_type_manager();
        assert!(declared_flags(&manager).iter().all(|(_, mandatory)| !mandatory));
        assert_eq!(
            property_definition_children(repo),
            vec!["jcr:propertyDefinition", "jcr:propertyDefinition[2]"]
        );
        assert!(session.node_exists("/content/node4").unwrap());
        let node = session.get_node("/content/node0").unwrap();
        assert_eq!(node.primary_type(), Some("test:MyType"));
    };

    check(&repo);
    repo.reopen();
    check(&repo);
}

#[test]
fn registering_the_same_document_twice_is_a_noop() {
    let repo = scenarios::upgradable_repository(1);
    let head = repo.node_store().head();

    let outcome = repo
        .login()
        .workspace()
        .node_type_manager()
        .register_node_types(MY_TYPE_V1, true)
        .unwrap();
    assert!(outcome.is_noop());
    assert_eq!(outcome.unchanged.len(), 1);
    assert_eq!(repo.node_store().head(), head);
}

#[test]
fn removing_a_property_is_rejected() {
    let repo = scenarios::upgradable_repository(2);
    let before = repo.registry().lookup("test:MyType").unwrap();
    let head = repo.node_store().head();

    let err = repo
        .login()
        .workspace()
        .node_type_manager()
        .register_node_types(MY_TYPE_WITHOUT_OPTIONAL, true)
        .unwrap_err();
    assert!(matches!(err, CoreError::IncompatibleChange { .. }), "{err}");
    assert_eq!(repo.registry().lookup("test:MyType").unwrap(), before);
    assert_eq!(repo.node_store().head(), head);
}

#[test]
fn update_without_permission_changes_nothing() {
    let repo = scenarios::upgradable_repository(2);
    let head = repo.node_store().head();
    let before = std::fs::read(last_archive_file(repo.path()).unwrap()).unwrap();

    let err = repo
        .login()
        .workspace()
        .node_type_manager()
        .register_node_types(MY_TYPE_V2, false)
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyExists { .. }), "{err}");
    assert_eq!(repo.node_store().head(), head);
    assert_eq!(
        std::fs::read(last_archive_file(repo.path()).unwrap()).unwrap(),
        before
    );
}

#[test]
fn tightening_back_is_rejected() {
    let repo = scenarios::upgradable_repository(1);
    let manager_session = repo.login();
    let manager = manager_session.workspace().node_type_manager();
    manager.register_node_types(MY_TYPE_V2, true).unwrap();

    let err = manager.register_node_types(MY_TYPE_V1, true).unwrap_err();
    assert!(matches!(err, CoreError::IncompatibleChange { .. }), "{err}");
    assert!(declared_flags(&manager).iter().all(|(_, mandatory)| !mandatory));
}

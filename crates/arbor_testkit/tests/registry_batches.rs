//! Batch semantics of the node type registry.

use arbor_core::nodetype::{ChildNodeDefinition, PropertyDefinition};
use arbor_core::{cnd, CoreError, QualifiedName, TypeDefinition, ValueType};
use arbor_testkit::prelude::*;
use proptest::prelude::*;

fn name(s: &str) -> QualifiedName {
    QualifiedName::parse(s).unwrap()
}

fn repo_with_namespace() -> TestRepository {
    let repo = TestRepository::new();
    repo.registry().register_namespace("test", TEST_NAMESPACE).unwrap();
    repo
}

#[test]
fn invalid_member_rejects_whole_batch() {
    let repo = repo_with_namespace();
    let head = repo.node_store().head();

    let good = TypeDefinition::new(name("test:Good")).with_supertype(name("nt:base"));
    let bad = TypeDefinition::new(name("test:Bad")).with_supertype(name("test:Missing"));
    let err = repo.registry().register(vec![good, bad], false).unwrap_err();

    assert!(matches!(err, CoreError::InvalidDefinition { .. }), "{err}");
    assert!(!repo.registry().has_type("test:Good").unwrap());
    assert_eq!(repo.node_store().head(), head);
}

#[test]
fn impossible_date_default_is_rejected() {
    let repo = repo_with_namespace();
    let head = repo.node_store().head();

    let text = "[test:D] > nt:base\n - test:when (date) = '2024-13-45Tgarbage'";
    let err = cnd::import(repo.registry(), text, false).unwrap_err();

    assert!(matches!(err, CoreError::InvalidDefinition { .. }), "{err}");
    assert!(!repo.registry().has_type("test:D").unwrap());
    assert_eq!(repo.node_store().head(), head);

    let text = "[test:D] > nt:base\n - test:when (date) = '2024-12-31T23:59:59Z'";
    cnd::import(repo.registry(), text, false).unwrap();
}

#[test]
fn batch_may_reference_its_own_members() {
    let repo = repo_with_namespace();
    let text = "
        [test:Child] > test:Parent
        [test:Parent] > nt:base
         + test:item (test:Child)
    ";
    let outcome = cnd::import(repo.registry(), text, false).unwrap();
    assert_eq!(outcome.added.len(), 2);
    assert_eq!(
        repo.registry().supertypes("test:Child").unwrap(),
        vec![name("test:Parent"), name("nt:base")]
    );
}

#[test]
fn cyclic_batch_is_rejected() {
    let repo = repo_with_namespace();
    let text = "[test:A] > test:B\n[test:B] > test:A";
    let err = cnd::import(repo.registry(), text, false).unwrap_err();
    assert!(matches!(err, CoreError::InvalidDefinition { .. }), "{err}");
}

#[test]
fn syntax_error_registers_nothing() {
    let repo = repo_with_namespace();
    let head = repo.node_store().head();
    let err = cnd::import(repo.registry(), "[test:Ok] > nt:base\n[test:Broken", false).unwrap_err();
    assert!(matches!(err, CoreError::Syntax { .. }), "{err}");
    assert!(!repo.registry().has_type("test:Ok").unwrap());
    assert_eq!(repo.node_store().head(), head);
}

#[test]
fn adding_optional_items_is_compatible() {
    let repo = repo_with_namespace();
    let v1 = TypeDefinition::new(name("test:Doc")).with_supertype(name("nt:base"));
    repo.registry().register(vec![v1.clone()], false).unwrap();

    let v2 = v1
        .with_property(PropertyDefinition::new("test:title", ValueType::String))
        .with_child(ChildNodeDefinition::new("test:part").requires(name("nt:base")));
    let outcome = repo.registry().register(vec![v2.clone()], true).unwrap();
    assert_eq!(outcome.updated, vec![name("test:Doc")]);
    assert_eq!(repo.registry().lookup("test:Doc").unwrap(), v2);
}

#[test]
fn adding_mandatory_property_is_incompatible() {
    let repo = repo_with_namespace();
    let v1 = TypeDefinition::new(name("test:Doc")).with_supertype(name("nt:base"));
    repo.registry().register(vec![v1.clone()], false).unwrap();

    let v2 = v1.with_property(PropertyDefinition::new("test:title", ValueType::String).mandatory(true));
    let err = repo.registry().register(vec![v2], true).unwrap_err();
    assert!(matches!(err, CoreError::IncompatibleChange { .. }), "{err}");
}

#[test]
fn unregister_refuses_types_in_use() {
    let repo = scenarios::upgradable_repository(1);
    let err = repo.registry().unregister("test:MyType").unwrap_err();
    assert!(matches!(err, CoreError::InUse { .. }), "{err}");

    repo.login()
        .edit(|root| {
            root.at_path_or_create("/content")?.remove_child("node0");
            Ok(())
        })
        .unwrap();
    repo.registry().unregister("test:MyType").unwrap();
    assert!(!repo.registry().has_type("test:MyType").unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn generated_batches_register_and_read_back(batch in type_batch_strategy(4)) {
        let repo = repo_with_namespace();
        let outcome = repo.registry().register(batch.clone(), false).unwrap();
        prop_assert_eq!(outcome.added.len(), batch.len());
        for def in &batch {
            let stored = repo.registry().lookup(&def.name.to_string()).unwrap();
            prop_assert_eq!(&stored, def);
        }

        let again = repo.registry().register(batch.clone(), true).unwrap();
        prop_assert!(again.is_noop());
        prop_assert_eq!(again.unchanged.len(), batch.len());
    }
}

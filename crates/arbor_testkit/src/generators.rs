//! Property-based test generators using proptest.
//!
//! Generated type definitions always pass registry validation once the
//! `test` namespace is registered and the built-in types are present.

use arbor_core::nodetype::{ChildNodeDefinition, PropertyDefinition};
use arbor_core::{QualifiedName, TypeDefinition, ValueType};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Prefix used by generated names.
pub const TEST_PREFIX: &str = "test";

/// Strategy for local names.
pub fn local_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for names in the `test` namespace.
pub fn qualified_name_strategy() -> impl Strategy<Value = QualifiedName> {
    local_name_strategy().prop_map(|local| {
        QualifiedName::parse(&format!("{TEST_PREFIX}:{local}")).expect("Invalid generated name")
    })
}

/// Strategy for property value types.
pub fn value_type_strategy() -> impl Strategy<Value = ValueType> {
    prop::sample::select(ValueType::ALL.to_vec())
}

/// Strategy for a named property definition without defaults.
pub fn property_definition_strategy(name: String) -> impl Strategy<Value = PropertyDefinition> {
    (value_type_strategy(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        move |(ty, mandatory, protected, multiple)| {
            PropertyDefinition::new(name.clone(), ty)
                .mandatory(mandatory)
                .protected(protected)
                .multiple(multiple)
        },
    )
}

/// Strategy for an optional child definition requiring `nt:base`.
pub fn child_definition_strategy(name: String) -> impl Strategy<Value = ChildNodeDefinition> {
    any::<bool>().prop_map(move |sns| {
        ChildNodeDefinition::new(name.clone())
            .requires(QualifiedName::parse("nt:base").expect("Invalid builtin name"))
            .same_name_siblings(sns)
    })
}

/// Strategy for a primary type extending `nt:base`.
pub fn type_definition_strategy() -> impl Strategy<Value = TypeDefinition> {
    (
        qualified_name_strategy(),
        prop::collection::btree_set(local_name_strategy(), 0..6),
        prop::collection::btree_set(local_name_strategy(), 0..3),
        any::<bool>(),
    )
        .prop_flat_map(|(name, props, children, orderable)| {
            let props: Vec<_> = props
                .into_iter()
                .map(|local| property_definition_strategy(format!("{TEST_PREFIX}:p{local}")))
                .collect();
            let children: Vec<_> = children
                .into_iter()
                .map(|local| child_definition_strategy(format!("{TEST_PREFIX}:c{local}")))
                .collect();
            (Just(name), props, children, Just(orderable))
        })
        .prop_map(|(name, props, children, orderable)| {
            let mut def = TypeDefinition::new(name)
                .with_supertype(QualifiedName::parse("nt:base").expect("Invalid builtin name"));
            def.orderable = orderable;
            def.properties = props;
            def.children = children;
            def
        })
}

/// Strategy for a batch of types with distinct names.
pub fn type_batch_strategy(max: usize) -> impl Strategy<Value = Vec<TypeDefinition>> {
    prop::collection::vec(type_definition_strategy(), 1..=max.max(1)).prop_map(|defs| {
        let mut seen = BTreeSet::new();
        defs.into_iter()
            .filter(|def| seen.insert(def.name.clone()))
            .collect()
    })
}

/// Strategy for segment payloads up to `max_len` bytes.
pub fn segment_payload_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

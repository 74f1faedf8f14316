//! Compatibility of an updated type definition with the registered one.
//!
//! An update is accepted only if every node that was valid under the old
//! definition is still valid under the new one. [`check_compatibility`] is a
//! pure function: it lists every difference and marks the ones that would
//! invalidate existing content as breaking.

use crate::node::ValueType;
use crate::nodetype::definition::{ChildNodeDefinition, PropertyDefinition, TypeDefinition};
use serde::Serialize;
use std::collections::BTreeSet;

/// Kind of difference between two definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The definitions are for different types.
    NameChanged,
    /// A supertype was added.
    SupertypeAdded,
    /// A supertype was removed.
    SupertypeRemoved,
    /// The same supertypes are listed in a different order.
    SupertypesReordered,
    /// The mixin flag changed.
    MixinChanged,
    /// The abstract flag changed.
    AbstractChanged,
    /// The orderable flag changed.
    OrderableChanged,
    /// The primary item changed.
    PrimaryItemChanged,
    /// A property or child definition was added.
    DefinitionAdded,
    /// A property or child definition was removed.
    DefinitionRemoved,
    /// A property's required type changed.
    TypeChanged,
    /// A property's required type became `Undefined`.
    TypeWidened,
    /// A property switched between single and multiple.
    MultiplicityChanged,
    /// Mandatory became optional.
    MandatoryRelaxed,
    /// Optional became mandatory.
    MandatoryTightened,
    /// Protected became unprotected.
    ProtectedRelaxed,
    /// Unprotected became protected.
    ProtectedTightened,
    /// The autocreated flag changed.
    AutocreatedChanged,
    /// Default values or the default child type changed.
    DefaultsChanged,
    /// Value constraints now accept at least what they did.
    ConstraintsRelaxed,
    /// Value constraints now reject something they accepted.
    ConstraintsTightened,
    /// Required child types now accept at least what they did.
    RequiredTypesRelaxed,
    /// Required child types now reject something they accepted.
    RequiredTypesTightened,
    /// Same-name siblings became allowed.
    SameNameSiblingsRelaxed,
    /// Same-name siblings became disallowed.
    SameNameSiblingsTightened,
}

/// One difference found by [`check_compatibility`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionChange {
    /// What kind of change it is.
    pub kind: ChangeKind,
    /// Which item changed, e.g. `property test:title` or `type`.
    pub item: String,
    /// Human-readable description.
    pub description: String,
    /// Whether existing content could become invalid.
    pub breaking: bool,
}

/// Outcome of comparing an old and a new definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityVerdict {
    /// Every difference found.
    pub changes: Vec<DefinitionChange>,
}

impl CompatibilityVerdict {
    /// True when no change is breaking.
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        self.changes.iter().all(|c| !c.breaking)
    }

    /// True when the definitions are identical.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }

    /// The breaking changes.
    pub fn breaking_changes(&self) -> impl Iterator<Item = &DefinitionChange> {
        self.changes.iter().filter(|c| c.breaking)
    }

    /// Why the update is rejected, or `None` if it is compatible.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<String> {
        let reasons: Vec<&str> = self
            .breaking_changes()
            .map(|c| c.description.as_str())
            .collect();
        (!reasons.is_empty()).then(|| reasons.join("; "))
    }

    fn push(&mut self, kind: ChangeKind, item: &str, description: String, breaking: bool) {
        self.changes.push(DefinitionChange {
            kind,
            item: item.to_string(),
            description,
            breaking,
        });
    }
}

/// Compares a registered definition with its proposed replacement.
#[must_use]
pub fn check_compatibility(old: &TypeDefinition, new: &TypeDefinition) -> CompatibilityVerdict {
    let mut verdict = CompatibilityVerdict::default();

    if old.name != new.name {
        verdict.push(
            ChangeKind::NameChanged,
            "type",
            format!("cannot replace {} with {}", old.name, new.name),
            true,
        );
        return verdict;
    }

    compare_type_attributes(old, new, &mut verdict);

    for old_prop in &old.properties {
        let key = old_prop.key();
        let item = format!("property {key}");
        match new.property(&key) {
            Some(new_prop) => compare_properties(&item, old_prop, new_prop, &mut verdict),
            None => verdict.push(
                ChangeKind::DefinitionRemoved,
                &item,
                format!("{item} removed"),
                true,
            ),
        }
    }
    for new_prop in &new.properties {
        let key = new_prop.key();
        if old.property(&key).is_none() {
            let item = format!("property {key}");
            let breaking = new_prop.mandatory && new_prop.default_values.is_empty();
            let description = if breaking {
                format!("{item} added as mandatory without a default")
            } else {
                format!("{item} added")
            };
            verdict.push(ChangeKind::DefinitionAdded, &item, description, breaking);
        }
    }

    for old_child in &old.children {
        let item = format!("child {}", old_child.name);
        match new.child(&old_child.name) {
            Some(new_child) => compare_children(&item, old_child, new_child, &mut verdict),
            None => verdict.push(
                ChangeKind::DefinitionRemoved,
                &item,
                format!("{item} removed"),
                true,
            ),
        }
    }
    for new_child in &new.children {
        if old.child(&new_child.name).is_none() {
            let item = format!("child {}", new_child.name);
            let breaking = new_child.mandatory && new_child.default_primary_type.is_none();
            let description = if breaking {
                format!("{item} added as mandatory without a default type")
            } else {
                format!("{item} added")
            };
            verdict.push(ChangeKind::DefinitionAdded, &item, description, breaking);
        }
    }

    verdict
}

fn compare_type_attributes(old: &TypeDefinition, new: &TypeDefinition, verdict: &mut CompatibilityVerdict) {
    for supertype in &old.supertypes {
        if !new.supertypes.contains(supertype) {
            verdict.push(
                ChangeKind::SupertypeRemoved,
                "type",
                format!("supertype {supertype} removed"),
                true,
            );
        }
    }
    for supertype in &new.supertypes {
        if !old.supertypes.contains(supertype) {
            verdict.push(
                ChangeKind::SupertypeAdded,
                "type",
                format!("supertype {supertype} added"),
                false,
            );
        }
    }
    let same_set = old.supertypes.len() == new.supertypes.len()
        && old.supertypes.iter().all(|s| new.supertypes.contains(s));
    if same_set && old.supertypes != new.supertypes {
        verdict.push(
            ChangeKind::SupertypesReordered,
            "type",
            "supertypes reordered".to_string(),
            false,
        );
    }
    if old.is_mixin != new.is_mixin {
        verdict.push(
            ChangeKind::MixinChanged,
            "type",
            format!("mixin changed from {} to {}", old.is_mixin, new.is_mixin),
            true,
        );
    }
    if old.is_abstract != new.is_abstract {
        verdict.push(
            ChangeKind::AbstractChanged,
            "type",
            format!("abstract changed to {}", new.is_abstract),
            false,
        );
    }
    if old.orderable != new.orderable {
        verdict.push(
            ChangeKind::OrderableChanged,
            "type",
            format!("orderable changed to {}", new.orderable),
            false,
        );
    }
    if old.primary_item != new.primary_item {
        verdict.push(
            ChangeKind::PrimaryItemChanged,
            "type",
            format!("primary item changed to {:?}", new.primary_item),
            false,
        );
    }
}

fn compare_properties(
    item: &str,
    old: &PropertyDefinition,
    new: &PropertyDefinition,
    verdict: &mut CompatibilityVerdict,
) {
    if old.required_type != new.required_type {
        if new.required_type == ValueType::Undefined {
            verdict.push(
                ChangeKind::TypeWidened,
                item,
                format!("{item} widened from {} to UNDEFINED", old.required_type),
                false,
            );
        } else {
            verdict.push(
                ChangeKind::TypeChanged,
                item,
                format!(
                    "{item} type changed from {} to {}",
                    old.required_type, new.required_type
                ),
                true,
            );
        }
    }
    if old.multiplicity != new.multiplicity {
        verdict.push(
            ChangeKind::MultiplicityChanged,
            item,
            format!("{item} multiplicity changed to {:?}", new.multiplicity),
            true,
        );
    }
    compare_mandatory(item, old.mandatory, new.mandatory, verdict);
    compare_protected(item, old.protected, new.protected, verdict);
    if old.autocreated != new.autocreated {
        verdict.push(
            ChangeKind::AutocreatedChanged,
            item,
            format!("{item} autocreated changed to {}", new.autocreated),
            false,
        );
    }
    if old.default_values != new.default_values {
        verdict.push(
            ChangeKind::DefaultsChanged,
            item,
            format!("{item} default values changed"),
            false,
        );
    }
    if old.value_constraints != new.value_constraints {
        // Constraints are alternatives: an empty list accepts everything, and
        // otherwise the new list must keep every old alternative.
        let new_set: BTreeSet<&String> = new.value_constraints.iter().collect();
        let relaxed = new.value_constraints.is_empty()
            || (!old.value_constraints.is_empty()
                && old.value_constraints.iter().all(|c| new_set.contains(c)));
        if relaxed {
            verdict.push(
                ChangeKind::ConstraintsRelaxed,
                item,
                format!("{item} value constraints relaxed"),
                false,
            );
        } else {
            verdict.push(
                ChangeKind::ConstraintsTightened,
                item,
                format!("{item} value constraints narrowed"),
                true,
            );
        }
    }
}

fn compare_children(
    item: &str,
    old: &ChildNodeDefinition,
    new: &ChildNodeDefinition,
    verdict: &mut CompatibilityVerdict,
) {
    if old.required_primary_types != new.required_primary_types {
        // A child must satisfy every required type, so requiring a subset
        // accepts at least what was accepted before.
        let narrowed = new
            .required_primary_types
            .iter()
            .any(|t| !old.required_primary_types.contains(t));
        if narrowed {
            verdict.push(
                ChangeKind::RequiredTypesTightened,
                item,
                format!("{item} requires new primary types"),
                true,
            );
        } else {
            verdict.push(
                ChangeKind::RequiredTypesRelaxed,
                item,
                format!("{item} requires fewer primary types"),
                false,
            );
        }
    }
    if old.default_primary_type != new.default_primary_type {
        verdict.push(
            ChangeKind::DefaultsChanged,
            item,
            format!("{item} default type changed"),
            false,
        );
    }
    compare_mandatory(item, old.mandatory, new.mandatory, verdict);
    compare_protected(item, old.protected, new.protected, verdict);
    if old.autocreated != new.autocreated {
        verdict.push(
            ChangeKind::AutocreatedChanged,
            item,
            format!("{item} autocreated changed to {}", new.autocreated),
            false,
        );
    }
    match (old.same_name_siblings, new.same_name_siblings) {
        (true, false) => verdict.push(
            ChangeKind::SameNameSiblingsTightened,
            item,
            format!("{item} no longer allows same-name siblings"),
            true,
        ),
        (false, true) => verdict.push(
            ChangeKind::SameNameSiblingsRelaxed,
            item,
            format!("{item} allows same-name siblings"),
            false,
        ),
        _ => {}
    }
}

fn compare_mandatory(item: &str, old: bool, new: bool, verdict: &mut CompatibilityVerdict) {
    match (old, new) {
        (true, false) => verdict.push(
            ChangeKind::MandatoryRelaxed,
            item,
            format!("{item} is no longer mandatory"),
            false,
        ),
        (false, true) => verdict.push(
            ChangeKind::MandatoryTightened,
            item,
            format!("{item} became mandatory"),
            true,
        ),
        _ => {}
    }
}

fn compare_protected(item: &str, old: bool, new: bool, verdict: &mut CompatibilityVerdict) {
    match (old, new) {
        (true, false) => verdict.push(
            ChangeKind::ProtectedRelaxed,
            item,
            format!("{item} is no longer protected"),
            false,
        ),
        (false, true) => verdict.push(
            ChangeKind::ProtectedTightened,
            item,
            format!("{item} became protected"),
            true,
        ),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodetype::definition::RESIDUAL;
    use crate::nodetype::name::QualifiedName;
    use proptest::prelude::*;

    fn qn(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn my_type(mandatory: bool) -> TypeDefinition {
        TypeDefinition::new(qn("test:MyType"))
            .with_supertype(qn("nt:base"))
            .with_property(PropertyDefinition::new("test:mandatory", ValueType::String).mandatory(mandatory))
            .with_property(PropertyDefinition::new("test:optional", ValueType::String))
    }

    fn kinds(verdict: &CompatibilityVerdict) -> Vec<ChangeKind> {
        verdict.changes.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn identical_definitions_are_unchanged() {
        let verdict = check_compatibility(&my_type(true), &my_type(true));
        assert!(verdict.is_unchanged());
        assert!(verdict.is_compatible());
        assert_eq!(verdict.rejection_reason(), None);
    }

    #[test]
    fn relaxing_mandatory_is_compatible() {
        let verdict = check_compatibility(&my_type(true), &my_type(false));
        assert!(verdict.is_compatible());
        assert_eq!(kinds(&verdict), vec![ChangeKind::MandatoryRelaxed]);
    }

    #[test]
    fn tightening_mandatory_is_rejected() {
        let verdict = check_compatibility(&my_type(false), &my_type(true));
        assert!(!verdict.is_compatible());
        assert_eq!(
            verdict.rejection_reason().unwrap(),
            "property test:mandatory became mandatory"
        );
    }

    #[test]
    fn removing_a_property_is_rejected() {
        let mut new = my_type(true);
        new.properties.retain(|p| p.name != "test:optional");
        let verdict = check_compatibility(&my_type(true), &new);
        assert_eq!(kinds(&verdict), vec![ChangeKind::DefinitionRemoved]);
        assert!(!verdict.is_compatible());
    }

    #[test]
    fn type_changes() {
        let mut widened = my_type(true);
        widened.properties[1].required_type = ValueType::Undefined;
        assert!(check_compatibility(&my_type(true), &widened).is_compatible());

        let mut changed = my_type(true);
        changed.properties[1].required_type = ValueType::Long;
        let verdict = check_compatibility(&my_type(true), &changed);
        assert_eq!(kinds(&verdict), vec![ChangeKind::TypeChanged]);
        assert!(!verdict.is_compatible());

        let mut multi = my_type(true);
        multi.properties[1].multiplicity = crate::nodetype::definition::Multiplicity::Multiple;
        assert!(!check_compatibility(&my_type(true), &multi).is_compatible());
    }

    #[test]
    fn added_properties() {
        let optional = my_type(true)
            .with_property(PropertyDefinition::new("test:extra", ValueType::Long));
        assert!(check_compatibility(&my_type(true), &optional).is_compatible());

        let mandatory = my_type(true)
            .with_property(PropertyDefinition::new("test:extra", ValueType::Long).mandatory(true));
        assert!(!check_compatibility(&my_type(true), &mandatory).is_compatible());

        let defaulted = my_type(true).with_property(
            PropertyDefinition::new("test:extra", ValueType::Long)
                .mandatory(true)
                .default_values(["0"]),
        );
        assert!(check_compatibility(&my_type(true), &defaulted).is_compatible());
    }

    #[test]
    fn protection_and_constraints() {
        let mut protected = my_type(true);
        protected.properties[0].protected = true;
        assert!(!check_compatibility(&my_type(true), &protected).is_compatible());
        assert!(check_compatibility(&protected, &my_type(true)).is_compatible());

        let mut constrained = my_type(true);
        constrained.properties[0].value_constraints = vec!["a".into(), "b".into()];
        assert!(!check_compatibility(&my_type(true), &constrained).is_compatible());

        let mut fewer = constrained.clone();
        fewer.properties[0].value_constraints = vec!["a".into()];
        assert_eq!(
            kinds(&check_compatibility(&constrained, &fewer)),
            vec![ChangeKind::ConstraintsTightened]
        );
        assert_eq!(
            kinds(&check_compatibility(&fewer, &constrained)),
            vec![ChangeKind::ConstraintsRelaxed]
        );
        assert!(check_compatibility(&constrained, &my_type(true)).is_compatible());
    }

    #[test]
    fn child_definitions() {
        let base = my_type(true).with_child(
            ChildNodeDefinition::new(RESIDUAL)
                .requires(qn("nt:base"))
                .requires(qn("mix:title"))
                .same_name_siblings(true),
        );

        let mut fewer = base.clone();
        fewer.children[0].required_primary_types = vec![qn("nt:base")];
        assert!(check_compatibility(&base, &fewer).is_compatible());
        assert!(!check_compatibility(&fewer, &base).is_compatible());

        let mut no_sns = base.clone();
        no_sns.children[0].same_name_siblings = false;
        assert!(!check_compatibility(&base, &no_sns).is_compatible());
        assert!(check_compatibility(&no_sns, &base).is_compatible());

        let dropped = my_type(true);
        assert!(!check_compatibility(&base, &dropped).is_compatible());
    }

    #[test]
    fn supertypes_and_flags() {
        let with_mixin = my_type(true).with_supertype(qn("mix:title"));
        assert!(check_compatibility(&my_type(true), &with_mixin).is_compatible());
        assert!(!check_compatibility(&with_mixin, &my_type(true)).is_compatible());

        let mut reordered = with_mixin.clone();
        reordered.supertypes.reverse();
        let verdict = check_compatibility(&with_mixin, &reordered);
        assert_eq!(kinds(&verdict), vec![ChangeKind::SupertypesReordered]);
        assert!(verdict.is_compatible() && !verdict.is_unchanged());

        let mixin = my_type(true).mixin(true);
        assert!(!check_compatibility(&my_type(true), &mixin).is_compatible());

        let mut orderable = my_type(true);
        orderable.orderable = true;
        orderable.is_abstract = true;
        assert!(check_compatibility(&my_type(true), &orderable).is_compatible());
    }

    #[test]
    fn different_types_never_compatible() {
        let other = TypeDefinition::new(qn("test:Other"));
        let verdict = check_compatibility(&my_type(true), &other);
        assert_eq!(kinds(&verdict), vec![ChangeKind::NameChanged]);
    }

    proptest! {
        #[test]
        fn mandatory_direction_decides(old in any::<bool>(), new in any::<bool>()) {
            let verdict = check_compatibility(&my_type(old), &my_type(new));
            prop_assert_eq!(verdict.is_compatible(), old || !new);
            prop_assert_eq!(verdict.is_unchanged(), old == new);
        }
    }
}

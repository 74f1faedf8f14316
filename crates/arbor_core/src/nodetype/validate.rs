//! Structural checks on type definitions and inheritance.

use crate::error::{CoreError, CoreResult};
use crate::node::{Value, ValueType};
use crate::nodetype::definition::{DefinitionKey, PropertyDefinition, TypeDefinition};
use crate::nodetype::name::QualifiedName;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Type definitions by name.
pub type TypeSet = BTreeMap<QualifiedName, TypeDefinition>;

/// Checks `def` on its own and against the other types in `types`.
///
/// `types` must already contain `def`. `namespaces` holds the registered
/// prefixes.
pub(crate) fn check_definition(
    def: &TypeDefinition,
    types: &TypeSet,
    namespaces: &BTreeMap<String, String>,
) -> CoreResult<()> {
    let name = def.name.to_string();
    let invalid = |message: String| CoreError::invalid_definition(name.as_str(), message);

    if !namespaces.contains_key(def.name.prefix()) {
        return Err(invalid(format!("unknown namespace prefix '{}'", def.name.prefix())));
    }

    let mut seen = BTreeSet::new();
    for supertype in &def.supertypes {
        if supertype == &def.name {
            return Err(invalid("a type cannot be its own supertype".into()));
        }
        if !seen.insert(supertype) {
            return Err(invalid(format!("supertype {supertype} listed twice")));
        }
        let Some(parent) = types.get(supertype) else {
            return Err(invalid(format!("unknown supertype {supertype}")));
        };
        if def.is_mixin && !parent.is_mixin {
            return Err(invalid(format!("mixin cannot extend primary type {supertype}")));
        }
    }

    let mut keys = BTreeSet::new();
    for prop in &def.properties {
        if !keys.insert(prop.key()) {
            return Err(invalid(format!("duplicate property definition {}", prop.key())));
        }
        check_property(prop).map_err(|m| invalid(format!("property {}: {m}", prop.key())))?;
    }

    let mut child_names = BTreeSet::new();
    for child in &def.children {
        if !child_names.insert(child.name.as_str()) {
            return Err(invalid(format!("duplicate child definition {}", child.name)));
        }
        if child.is_residual() && (child.mandatory || child.autocreated) {
            return Err(invalid("residual child cannot be mandatory or autocreated".into()));
        }
        for ty in child.required_primary_types.iter().chain(&child.default_primary_type) {
            if !types.contains_key(ty) {
                return Err(invalid(format!("child {} refers to unknown type {ty}", child.name)));
            }
        }
        if child.autocreated && child.default_primary_type.is_none() {
            return Err(invalid(format!(
                "autocreated child {} needs a default type",
                child.name
            )));
        }
    }

    effective_properties(&def.name, types).map(|_| ())
}

fn check_property(prop: &PropertyDefinition) -> Result<(), String> {
    if prop.is_residual() && (prop.mandatory || prop.autocreated) {
        return Err("residual property cannot be mandatory or autocreated".into());
    }
    if !prop.multiplicity.is_multiple() && prop.default_values.len() > 1 {
        return Err("single-valued property has several defaults".into());
    }
    for text in &prop.default_values {
        Value::parse(prop.required_type, text)?;
    }
    Ok(())
}

/// All supertypes of `name`, transitively, nearest first.
///
/// # Errors
///
/// [`CoreError::NotFound`] for an unknown type and
/// [`CoreError::InvalidDefinition`] for an inheritance cycle.
pub fn supertype_closure(name: &QualifiedName, types: &TypeSet) -> CoreResult<Vec<QualifiedName>> {
    let mut out = Vec::new();
    let mut seen = BTreeSet::new();
    let mut stack = Vec::new();
    visit(name, types, &mut stack, &mut seen, &mut out)?;
    Ok(out)
}

fn visit(
    name: &QualifiedName,
    types: &TypeSet,
    stack: &mut Vec<QualifiedName>,
    seen: &mut BTreeSet<QualifiedName>,
    out: &mut Vec<QualifiedName>,
) -> CoreResult<()> {
    let def = types
        .get(name)
        .ok_or_else(|| CoreError::not_found(format!("node type {name}")))?;
    stack.push(name.clone());
    for supertype in &def.supertypes {
        if stack.contains(supertype) {
            return Err(CoreError::invalid_definition(
                name.to_string(),
                format!("supertype cycle through {supertype}"),
            ));
        }
        if seen.insert(supertype.clone()) {
            out.push(supertype.clone());
            visit(supertype, types, stack, seen, out)?;
        }
    }
    stack.pop();
    Ok(())
}

/// Declared plus inherited property definitions of `name`.
///
/// Declarations closer to `name` hide inherited ones with the same key.
///
/// # Errors
///
/// [`CoreError::InvalidDefinition`] when two definitions of the same name
/// require different types, plus the errors of [`supertype_closure`].
pub fn effective_properties(
    name: &QualifiedName,
    types: &TypeSet,
) -> CoreResult<Vec<PropertyDefinition>> {
    let mut order = vec![name.clone()];
    order.extend(supertype_closure(name, types)?);

    let mut out: Vec<PropertyDefinition> = Vec::new();
    let mut keys: BTreeSet<DefinitionKey> = BTreeSet::new();
    let mut named_types: HashMap<String, (ValueType, QualifiedName)> = HashMap::new();

    for owner in &order {
        let Some(def) = types.get(owner) else { continue };
        for prop in &def.properties {
            if !prop.is_residual() && prop.required_type != ValueType::Undefined {
                match named_types.get(&prop.name) {
                    Some((ty, from)) if *ty != prop.required_type => {
                        return Err(CoreError::invalid_definition(
                            name.to_string(),
                            format!(
                                "property {} is {} in {from} but {} in {owner}",
                                prop.name, ty, prop.required_type
                            ),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        named_types.insert(prop.name.clone(), (prop.required_type, owner.clone()));
                    }
                }
            }
            if keys.insert(prop.key()) {
                out.push(prop.clone());
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodetype::definition::{ChildNodeDefinition, RESIDUAL};

    fn qn(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn namespaces() -> BTreeMap<String, String> {
        [("nt", "internal"), ("mix", "internal"), ("test", "http://example.com/test")]
            .into_iter()
            .map(|(p, u)| (p.to_string(), u.to_string()))
            .collect()
    }

    fn base_set() -> TypeSet {
        let base = TypeDefinition::new(qn("nt:base"))
            .with_property(PropertyDefinition::new("jcr:primaryType", ValueType::Name).mandatory(true));
        let title = TypeDefinition::new(qn("mix:title"))
            .mixin(true)
            .with_property(PropertyDefinition::new("jcr:title", ValueType::String));
        [base, title].into_iter().map(|d| (d.name.clone(), d)).collect()
    }

    fn with(mut types: TypeSet, def: &TypeDefinition) -> TypeSet {
        types.insert(def.name.clone(), def.clone());
        types
    }

    #[test]
    fn accepts_a_plain_type() {
        let def = TypeDefinition::new(qn("test:Doc"))
            .with_supertype(qn("nt:base"))
            .with_supertype(qn("mix:title"))
            .with_property(PropertyDefinition::new("test:size", ValueType::Long).default_values(["0"]));
        check_definition(&def, &with(base_set(), &def), &namespaces()).unwrap();
    }

    #[test]
    fn rejects_structural_errors() {
        let cases = [
            TypeDefinition::new(qn("test:Doc")).with_supertype(qn("test:Missing")),
            TypeDefinition::new(qn("test:Doc")).with_supertype(qn("test:Doc")),
            TypeDefinition::new(qn("test:Doc"))
                .with_property(PropertyDefinition::new("test:a", ValueType::String))
                .with_property(PropertyDefinition::new("test:a", ValueType::Long)),
            TypeDefinition::new(qn("test:Doc"))
                .with_property(PropertyDefinition::new("test:n", ValueType::Long).default_values(["x"])),
            TypeDefinition::new(qn("test:Doc"))
                .with_property(PropertyDefinition::new(RESIDUAL, ValueType::Undefined).mandatory(true)),
            TypeDefinition::new(qn("test:Doc"))
                .with_child(ChildNodeDefinition::new("test:c").requires(qn("test:Missing"))),
            TypeDefinition::new(qn("test:Doc")).mixin(true).with_supertype(qn("nt:base")),
            TypeDefinition::new(qn("other:Doc")),
        ];
        for def in cases {
            let result = check_definition(&def, &with(base_set(), &def), &namespaces());
            assert!(
                matches!(result, Err(CoreError::InvalidDefinition { .. })),
                "{def:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn default_dates_must_be_real_dates() {
        for text in ["2024-13-45", "2024-13-45Tgarbage", "2024-02-30", "2024-01-01Tnoon"] {
            let def = TypeDefinition::new(qn("test:Event"))
                .with_property(PropertyDefinition::new("test:when", ValueType::Date).default_values([text]));
            let result = check_definition(&def, &with(base_set(), &def), &namespaces());
            assert!(
                matches!(result, Err(CoreError::InvalidDefinition { .. })),
                "{text} gave {result:?}"
            );
        }

        let def = TypeDefinition::new(qn("test:Event")).with_property(
            PropertyDefinition::new("test:when", ValueType::Date).default_values(["2024-02-29T12:00:00Z"]),
        );
        check_definition(&def, &with(base_set(), &def), &namespaces()).unwrap();
    }

    #[test]
    fn residual_keys_allow_one_of_each_multiplicity() {
        let def = TypeDefinition::new(qn("test:Bag"))
            .with_property(PropertyDefinition::new(RESIDUAL, ValueType::Undefined))
            .with_property(PropertyDefinition::new(RESIDUAL, ValueType::Undefined).multiple(true));
        check_definition(&def, &with(base_set(), &def), &namespaces()).unwrap();
    }

    #[test]
    fn closure_is_transitive_and_detects_cycles() {
        let a = TypeDefinition::new(qn("test:A")).with_supertype(qn("nt:base"));
        let b = TypeDefinition::new(qn("test:B")).with_supertype(qn("test:A"));
        let types = with(with(base_set(), &a), &b);
        let closure = supertype_closure(&qn("test:B"), &types).unwrap();
        assert_eq!(closure, vec![qn("test:A"), qn("nt:base")]);

        let x = TypeDefinition::new(qn("test:X")).with_supertype(qn("test:Y"));
        let y = TypeDefinition::new(qn("test:Y")).with_supertype(qn("test:X"));
        let types = with(with(base_set(), &x), &y);
        assert!(matches!(
            supertype_closure(&qn("test:X"), &types),
            Err(CoreError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn effective_properties_merge_and_conflict() {
        let doc = TypeDefinition::new(qn("test:Doc"))
            .with_supertype(qn("nt:base"))
            .with_supertype(qn("mix:title"))
            .with_property(PropertyDefinition::new("jcr:title", ValueType::String).mandatory(true));
        let types = with(base_set(), &doc);
        let props = effective_properties(&doc.name, &types).unwrap();
        let names: Vec<&str> = props.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["jcr:title", "jcr:primaryType"]);
        assert!(props[0].mandatory);

        let bad = TypeDefinition::new(qn("test:Bad"))
            .with_supertype(qn("mix:title"))
            .with_property(PropertyDefinition::new("jcr:title", ValueType::Long));
        let types = with(base_set(), &bad);
        assert!(effective_properties(&bad.name, &types).is_err());

        let loose = TypeDefinition::new(qn("test:Loose"))
            .with_supertype(qn("mix:title"))
            .with_property(PropertyDefinition::new("jcr:title", ValueType::Undefined));
        let types = with(base_set(), &loose);
        assert!(effective_properties(&loose.name, &types).is_ok());
    }
}

//! Mapping between type definitions and the nodes that store them.
//!
//! ```text
//! /jcr:system/jcr:nodeTypes/<prefix>                 jcr:uri
//! /jcr:system/jcr:nodeTypes/<prefix>/<prefix:local>  nt:nodeType
//!     jcr:propertyDefinition, jcr:propertyDefinition[2], ...
//!     jcr:childNodeDefinition, jcr:childNodeDefinition[2], ...
//! ```

use crate::error::{CoreError, CoreResult};
use crate::node::{NodeBuilder, NodeState, PropertyState, ValueType, JCR_PRIMARY_TYPE};
use crate::nodetype::definition::{
    ChildNodeDefinition, Multiplicity, PropertyDefinition, TypeDefinition,
};
use crate::nodetype::name::QualifiedName;
use crate::nodetype::validate::TypeSet;
use std::collections::BTreeMap;

/// Path of the registry subtree.
pub const NODE_TYPES_PATH: &str = "/jcr:system/jcr:nodeTypes";
/// Name of the system node below the root.
pub const JCR_SYSTEM: &str = "jcr:system";

pub(crate) const NT_NODE_TYPE: &str = "nt:nodeType";
pub(crate) const NT_PROPERTY_DEFINITION: &str = "nt:propertyDefinition";
pub(crate) const NT_CHILD_NODE_DEFINITION: &str = "nt:childNodeDefinition";
pub(crate) const REP_NAMESPACE: &str = "rep:NodeTypeNamespace";
pub(crate) const REP_SYSTEM: &str = "rep:system";
pub(crate) const REP_NODE_TYPES: &str = "rep:nodeTypes";

const PROPERTY_DEFINITION: &str = "jcr:propertyDefinition";
const CHILD_NODE_DEFINITION: &str = "jcr:childNodeDefinition";

const JCR_URI: &str = "jcr:uri";
const JCR_NODE_TYPE_NAME: &str = "jcr:nodeTypeName";
const JCR_SUPERTYPES: &str = "jcr:supertypes";
const JCR_IS_MIXIN: &str = "jcr:isMixin";
const JCR_IS_ABSTRACT: &str = "jcr:isAbstract";
const JCR_ORDERABLE: &str = "jcr:hasOrderableChildNodes";
const JCR_PRIMARY_ITEM: &str = "jcr:primaryItemName";
const JCR_NAME: &str = "jcr:name";
const JCR_REQUIRED_TYPE: &str = "jcr:requiredType";
const JCR_MULTIPLE: &str = "jcr:multiple";
const JCR_MANDATORY: &str = "jcr:mandatory";
const JCR_AUTOCREATED: &str = "jcr:autoCreated";
const JCR_PROTECTED: &str = "jcr:protected";
const JCR_DEFAULT_VALUES: &str = "jcr:defaultValues";
const JCR_VALUE_CONSTRAINTS: &str = "jcr:valueConstraints";
const JCR_REQUIRED_PRIMARY_TYPES: &str = "jcr:requiredPrimaryTypes";
const JCR_DEFAULT_PRIMARY_TYPE: &str = "jcr:defaultPrimaryType";
const JCR_SNS: &str = "jcr:sameNameSiblings";

/// Name of the `n`th (1-based) definition child: `base`, `base[2]`, ...
pub(crate) fn definition_child_name(base: &str, n: usize) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}[{n}]")
    }
}

/// Path of the node holding type `name`.
#[must_use]
pub fn type_path(name: &QualifiedName) -> String {
    format!("{NODE_TYPES_PATH}/{}/{name}", name.prefix())
}

/// Everything the registry subtree of one root holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Registered namespaces, prefix to URI.
    pub namespaces: BTreeMap<String, String>,
    /// Registered types.
    pub types: TypeSet,
}

impl RegistrySnapshot {
    /// Reads the registry subtree of `root`. A root without one yields an
    /// empty snapshot.
    ///
    /// # Errors
    ///
    /// [`CoreError::Corrupt`] for a definition node that cannot be decoded,
    /// read errors.
    pub fn load(root: &NodeState) -> CoreResult<Self> {
        let mut snapshot = Self::default();
        let Some(types_node) = root.node_at(NODE_TYPES_PATH)? else {
            return Ok(snapshot);
        };
        for (prefix, ns_node) in types_node.children()? {
            let uri = ns_node
                .property(JCR_URI)
                .and_then(PropertyState::as_str)
                .ok_or_else(|| CoreError::corrupt(format!("namespace {prefix} has no jcr:uri")))?;
            snapshot.namespaces.insert(prefix.clone(), uri.to_string());
            for (_, type_node) in ns_node.children()? {
                if type_node.primary_type() == Some(NT_NODE_TYPE) {
                    let def = read_definition(&type_node)?;
                    snapshot.types.insert(def.name.clone(), def);
                }
            }
        }
        Ok(snapshot)
    }
}

/// Creates the containers of the registry subtree below `root` if missing.
pub(crate) fn ensure_registry_root(root: &mut NodeBuilder) -> CoreResult<&mut NodeBuilder> {
    let system = root.child_or_create(JCR_SYSTEM)?;
    if !system.has_property(JCR_PRIMARY_TYPE) {
        system.set_property(JCR_PRIMARY_TYPE, PropertyState::name(REP_SYSTEM));
    }
    let types = system.child_or_create("jcr:nodeTypes")?;
    if !types.has_property(JCR_PRIMARY_TYPE) {
        types.set_property(JCR_PRIMARY_TYPE, PropertyState::name(REP_NODE_TYPES));
    }
    Ok(types)
}

/// Writes a namespace node below the registry root.
pub(crate) fn write_namespace(types: &mut NodeBuilder, prefix: &str, uri: &str) -> CoreResult<()> {
    let ns = types.child_or_create(prefix)?;
    ns.set_property(JCR_PRIMARY_TYPE, PropertyState::name(REP_NAMESPACE));
    ns.set_property(JCR_URI, PropertyState::string(uri));
    Ok(())
}

/// Fills an empty builder with the nodes for `def`.
pub(crate) fn write_definition(node: &mut NodeBuilder, def: &TypeDefinition) -> CoreResult<()> {
    node.set_orderable(true);
    node.set_property(JCR_PRIMARY_TYPE, PropertyState::name(NT_NODE_TYPE));
    node.set_property(JCR_NODE_TYPE_NAME, PropertyState::name(def.name.to_string()));
    node.set_property(
        JCR_SUPERTYPES,
        PropertyState::names(def.supertypes.iter().map(ToString::to_string)),
    );
    node.set_property(JCR_IS_MIXIN, PropertyState::boolean(def.is_mixin));
    node.set_property(JCR_IS_ABSTRACT, PropertyState::boolean(def.is_abstract));
    node.set_property(JCR_ORDERABLE, PropertyState::boolean(def.orderable));
    if let Some(item) = &def.primary_item {
        node.set_property(JCR_PRIMARY_ITEM, PropertyState::name(item.as_str()));
    }

    for (i, prop) in def.properties.iter().enumerate() {
        let child = node.child_or_create(&definition_child_name(PROPERTY_DEFINITION, i + 1))?;
        write_property(child, prop);
    }
    for (i, def_child) in def.children.iter().enumerate() {
        let child = node.child_or_create(&definition_child_name(CHILD_NODE_DEFINITION, i + 1))?;
        write_child(child, def_child);
    }
    Ok(())
}

fn write_property(node: &mut NodeBuilder, prop: &PropertyDefinition) {
    node.set_property(JCR_PRIMARY_TYPE, PropertyState::name(NT_PROPERTY_DEFINITION));
    node.set_property(JCR_NAME, PropertyState::name(prop.name.as_str()));
    node.set_property(JCR_REQUIRED_TYPE, PropertyState::string(prop.required_type.as_str()));
    node.set_property(JCR_MULTIPLE, PropertyState::boolean(prop.multiplicity.is_multiple()));
    node.set_property(JCR_MANDATORY, PropertyState::boolean(prop.mandatory));
    node.set_property(JCR_AUTOCREATED, PropertyState::boolean(prop.autocreated));
    node.set_property(JCR_PROTECTED, PropertyState::boolean(prop.protected));
    if !prop.default_values.is_empty() {
        node.set_property(JCR_DEFAULT_VALUES, PropertyState::strings(prop.default_values.iter().cloned()));
    }
    if !prop.value_constraints.is_empty() {
        node.set_property(
            JCR_VALUE_CONSTRAINTS,
            PropertyState::strings(prop.value_constraints.iter().cloned()),
        );
    }
}

fn write_child(node: &mut NodeBuilder, child: &ChildNodeDefinition) {
    node.set_property(JCR_PRIMARY_TYPE, PropertyState::name(NT_CHILD_NODE_DEFINITION));
    node.set_property(JCR_NAME, PropertyState::name(child.name.as_str()));
    node.set_property(
        JCR_REQUIRED_PRIMARY_TYPES,
        PropertyState::names(child.required_primary_types.iter().map(ToString::to_string)),
    );
    if let Some(default) = &child.default_primary_type {
        node.set_property(JCR_DEFAULT_PRIMARY_TYPE, PropertyState::name(default.to_string()));
    }
    node.set_property(JCR_MANDATORY, PropertyState::boolean(child.mandatory));
    node.set_property(JCR_AUTOCREATED, PropertyState::boolean(child.autocreated));
    node.set_property(JCR_PROTECTED, PropertyState::boolean(child.protected));
    node.set_property(JCR_SNS, PropertyState::boolean(child.same_name_siblings));
}

/// Decodes the type stored at `node`.
///
/// # Errors
///
/// [`CoreError::Corrupt`] when a required property is missing or malformed.
pub(crate) fn read_definition(node: &NodeState) -> CoreResult<TypeDefinition> {
    let name = qualified(required_str(node, JCR_NODE_TYPE_NAME)?)?;
    let mut def = TypeDefinition::new(name);
    def.supertypes = names(node, JCR_SUPERTYPES)?;
    def.is_mixin = flag(node, JCR_IS_MIXIN);
    def.is_abstract = flag(node, JCR_IS_ABSTRACT);
    def.orderable = flag(node, JCR_ORDERABLE);
    def.primary_item = node
        .property(JCR_PRIMARY_ITEM)
        .and_then(PropertyState::as_str)
        .map(String::from);

    for (_, child) in node.children()? {
        match child.primary_type() {
            Some(NT_PROPERTY_DEFINITION) => def.properties.push(read_property(&child)?),
            Some(NT_CHILD_NODE_DEFINITION) => def.children.push(read_child(&child)?),
            _ => {}
        }
    }
    Ok(def)
}

fn read_property(node: &NodeState) -> CoreResult<PropertyDefinition> {
    let type_name = required_str(node, JCR_REQUIRED_TYPE)?;
    let required_type = ValueType::parse(type_name)
        .ok_or_else(|| CoreError::corrupt(format!("unknown property type {type_name}")))?;
    Ok(PropertyDefinition {
        name: required_str(node, JCR_NAME)?.to_string(),
        required_type,
        multiplicity: Multiplicity::from_multiple(flag(node, JCR_MULTIPLE)),
        mandatory: flag(node, JCR_MANDATORY),
        autocreated: flag(node, JCR_AUTOCREATED),
        protected: flag(node, JCR_PROTECTED),
        default_values: strings(node, JCR_DEFAULT_VALUES),
        value_constraints: strings(node, JCR_VALUE_CONSTRAINTS),
    })
}

fn read_child(node: &NodeState) -> CoreResult<ChildNodeDefinition> {
    Ok(ChildNodeDefinition {
        name: required_str(node, JCR_NAME)?.to_string(),
        required_primary_types: names(node, JCR_REQUIRED_PRIMARY_TYPES)?,
        default_primary_type: node
            .property(JCR_DEFAULT_PRIMARY_TYPE)
            .and_then(PropertyState::as_str)
            .map(qualified)
            .transpose()?,
        mandatory: flag(node, JCR_MANDATORY),
        autocreated: flag(node, JCR_AUTOCREATED),
        protected: flag(node, JCR_PROTECTED),
        same_name_siblings: flag(node, JCR_SNS),
    })
}

fn required_str<'a>(node: &'a NodeState, name: &str) -> CoreResult<&'a str> {
    node.property(name)
        .and_then(PropertyState::as_str)
        .ok_or_else(|| CoreError::corrupt(format!("definition node {} lacks {name}", node.id())))
}

fn flag(node: &NodeState, name: &str) -> bool {
    node.property(name)
        .and_then(PropertyState::as_bool)
        .unwrap_or(false)
}

fn strings(node: &NodeState, name: &str) -> Vec<String> {
    node.property(name)
        .map(|p| p.as_strings().into_iter().map(String::from).collect())
        .unwrap_or_default()
}

fn names(node: &NodeState, name: &str) -> CoreResult<Vec<QualifiedName>> {
    node.property(name)
        .map(|p| p.as_strings().into_iter().map(qualified).collect())
        .unwrap_or_else(|| Ok(Vec::new()))
}

fn qualified(text: &str) -> CoreResult<QualifiedName> {
    QualifiedName::parse(text).map_err(|_| CoreError::corrupt(format!("bad type name '{text}'")))
}

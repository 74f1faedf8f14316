//! Node type definitions.

use crate::node::ValueType;
use crate::nodetype::name::QualifiedName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used by residual definitions, which match any property or child.
pub const RESIDUAL: &str = "*";

/// Whether a property holds one value or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    /// One value.
    Single,
    /// Any number of values.
    Multiple,
}

impl Multiplicity {
    /// Multiplicity from the `multiple` flag.
    #[must_use]
    pub const fn from_multiple(multiple: bool) -> Self {
        if multiple {
            Self::Multiple
        } else {
            Self::Single
        }
    }

    /// True for [`Multiplicity::Multiple`].
    #[must_use]
    pub const fn is_multiple(self) -> bool {
        matches!(self, Self::Multiple)
    }
}

/// Identity of a property definition within its type.
///
/// Named definitions are keyed by name. A type may declare one single and
/// one multi-valued residual definition, so residuals are keyed by
/// multiplicity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefinitionKey {
    /// A named property.
    Named(String),
    /// A residual property of the given multiplicity.
    Residual(Multiplicity),
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Residual(Multiplicity::Single) => f.write_str("*"),
            Self::Residual(Multiplicity::Multiple) => f.write_str("* (multiple)"),
        }
    }
}

/// Declaration of a property allowed on nodes of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property name, or [`RESIDUAL`].
    pub name: String,
    /// Required value type.
    pub required_type: ValueType,
    /// Single or multiple.
    pub multiplicity: Multiplicity,
    /// Must be present on every node of the type.
    pub mandatory: bool,
    /// Created automatically with the node.
    pub autocreated: bool,
    /// Only the repository may change it.
    pub protected: bool,
    /// Default values, as text.
    pub default_values: Vec<String>,
    /// Value constraints, as text.
    pub value_constraints: Vec<String>,
}

impl PropertyDefinition {
    /// An optional single-valued property.
    pub fn new(name: impl Into<String>, required_type: ValueType) -> Self {
        Self {
            name: name.into(),
            required_type,
            multiplicity: Multiplicity::Single,
            mandatory: false,
            autocreated: false,
            protected: false,
            default_values: Vec::new(),
            value_constraints: Vec::new(),
        }
    }

    /// Sets the mandatory flag.
    #[must_use]
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    /// Makes the property multi-valued.
    #[must_use]
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiplicity = Multiplicity::from_multiple(multiple);
        self
    }

    /// Sets the autocreated flag.
    #[must_use]
    pub fn autocreated(mut self, autocreated: bool) -> Self {
        self.autocreated = autocreated;
        self
    }

    /// Sets the protected flag.
    #[must_use]
    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Sets default values.
    #[must_use]
    pub fn default_values<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.default_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets value constraints.
    #[must_use]
    pub fn value_constraints<S: Into<String>>(
        mut self,
        constraints: impl IntoIterator<Item = S>,
    ) -> Self {
        self.value_constraints = constraints.into_iter().map(Into::into).collect();
        self
    }

    /// True for a residual definition.
    #[must_use]
    pub fn is_residual(&self) -> bool {
        self.name == RESIDUAL
    }

    /// Key identifying this definition within its type.
    #[must_use]
    pub fn key(&self) -> DefinitionKey {
        if self.is_residual() {
            DefinitionKey::Residual(self.multiplicity)
        } else {
            DefinitionKey::Named(self.name.clone())
        }
    }
}

/// Declaration of a child node allowed under nodes of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildNodeDefinition {
    /// Child name, or [`RESIDUAL`].
    pub name: String,
    /// The child must be of all of these types.
    pub required_primary_types: Vec<QualifiedName>,
    /// Type given to the child when none is specified.
    pub default_primary_type: Option<QualifiedName>,
    /// Must be present on every node of the type.
    pub mandatory: bool,
    /// Created automatically with the node.
    pub autocreated: bool,
    /// Only the repository may change it.
    pub protected: bool,
    /// Several children may share the name.
    pub same_name_siblings: bool,
}

impl ChildNodeDefinition {
    /// An optional child that may be of any type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_primary_types: Vec::new(),
            default_primary_type: None,
            mandatory: false,
            autocreated: false,
            protected: false,
            same_name_siblings: false,
        }
    }

    /// Adds a required primary type.
    #[must_use]
    pub fn requires(mut self, ty: QualifiedName) -> Self {
        self.required_primary_types.push(ty);
        self
    }

    /// Sets the default primary type.
    #[must_use]
    pub fn default_type(mut self, ty: QualifiedName) -> Self {
        self.default_primary_type = Some(ty);
        self
    }

    /// Sets the mandatory flag.
    #[must_use]
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    /// Sets the same-name-siblings flag.
    #[must_use]
    pub fn same_name_siblings(mut self, sns: bool) -> Self {
        self.same_name_siblings = sns;
        self
    }

    /// True for a residual definition.
    #[must_use]
    pub fn is_residual(&self) -> bool {
        self.name == RESIDUAL
    }
}

/// A node type: its place in the hierarchy and what its nodes may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Type name.
    pub name: QualifiedName,
    /// Direct supertypes.
    pub supertypes: Vec<QualifiedName>,
    /// Mixin types are added to nodes on top of their primary type.
    pub is_mixin: bool,
    /// Abstract types cannot be a node's primary type.
    pub is_abstract: bool,
    /// Children keep insertion order.
    pub orderable: bool,
    /// Name of the primary item, if any.
    pub primary_item: Option<String>,
    /// Declared property definitions, in declaration order.
    pub properties: Vec<PropertyDefinition>,
    /// Declared child node definitions, in declaration order.
    pub children: Vec<ChildNodeDefinition>,
}

impl TypeDefinition {
    /// A concrete primary type with no supertypes or definitions.
    pub fn new(name: QualifiedName) -> Self {
        Self {
            name,
            supertypes: Vec::new(),
            is_mixin: false,
            is_abstract: false,
            orderable: false,
            primary_item: None,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds a supertype.
    #[must_use]
    pub fn with_supertype(mut self, supertype: QualifiedName) -> Self {
        self.supertypes.push(supertype);
        self
    }

    /// Adds a property definition.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds a child node definition.
    #[must_use]
    pub fn with_child(mut self, child: ChildNodeDefinition) -> Self {
        self.children.push(child);
        self
    }

    /// Marks the type as a mixin.
    #[must_use]
    pub fn mixin(mut self, mixin: bool) -> Self {
        self.is_mixin = mixin;
        self
    }

    /// Declared property definition for `key`.
    #[must_use]
    pub fn property(&self, key: &DefinitionKey) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| &p.key() == key)
    }

    /// Declared named property definition.
    #[must_use]
    pub fn named_property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.property(&DefinitionKey::Named(name.to_string()))
    }

    /// Declared child node definition by name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&ChildNodeDefinition> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Every type name this definition refers to, other than itself.
    pub fn references(&self) -> impl Iterator<Item = &QualifiedName> {
        self.supertypes
            .iter()
            .chain(self.children.iter().flat_map(|c| {
                c.required_primary_types
                    .iter()
                    .chain(c.default_primary_type.iter())
            }))
            .filter(move |n| *n != &self.name)
    }
}

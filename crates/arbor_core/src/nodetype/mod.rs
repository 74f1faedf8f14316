//! Node type registry.
//!
//! Type definitions are stored as nodes below `/jcr:system/jcr:nodeTypes`
//! in the same node store as the content they describe. Re-registering a
//! type updates its definition in place, provided the change keeps all
//! existing content valid (see [`check_compatibility`]).

mod builtin;
mod compat;
mod definition;
mod name;
mod persist;
mod registry;
mod validate;

pub use builtin::BUILTIN_NODE_TYPES;
pub use compat::{check_compatibility, ChangeKind, CompatibilityVerdict, DefinitionChange};
pub use definition::{
    ChildNodeDefinition, DefinitionKey, Multiplicity, PropertyDefinition, TypeDefinition, RESIDUAL,
};
pub use name::{is_prefix, QualifiedName};
pub use persist::{type_path, RegistrySnapshot, JCR_SYSTEM, NODE_TYPES_PATH};
pub use registry::{ContentScan, NodeTypeRegistry, RegistrationOutcome, TypeUsage};
pub use validate::{effective_properties, supertype_closure, TypeSet};

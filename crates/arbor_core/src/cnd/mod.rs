//! Compact node type definitions (CND).
//!
//! ```text
//! <'test'='http://example.com/test'>
//! [test:MyType] > nt:unstructured
//!   - test:mandatory (string) mandatory
//!   - test:optional (string)
//! ```

mod lexer;
mod parser;

pub use parser::CndDocument;

use crate::error::CoreResult;
use crate::nodetype::{NodeTypeRegistry, RegistrationOutcome, TypeDefinition};
use parser::Parser;

/// Parses CND text into namespaces and type definitions.
///
/// # Errors
///
/// [`CoreError::Syntax`](crate::CoreError::Syntax) with the offending line.
pub fn parse_document(text: &str) -> CoreResult<CndDocument> {
    Parser::new(text)?.document()
}

/// Parses CND text and returns only the type definitions.
///
/// # Errors
///
/// [`CoreError::Syntax`](crate::CoreError::Syntax) with the offending line.
pub fn parse(text: &str) -> CoreResult<Vec<TypeDefinition>> {
    parse_document(text).map(|doc| doc.types)
}

/// Registers the namespaces and types declared in `text`, as one batch.
///
/// # Errors
///
/// Syntax errors, and every error of [`NodeTypeRegistry::register_document`].
pub fn import(
    registry: &NodeTypeRegistry,
    text: &str,
    allow_update: bool,
) -> CoreResult<RegistrationOutcome> {
    let doc = parse_document(text)?;
    registry.register_document(&doc.namespaces, doc.types, allow_update)
}

//! Prefixed names such as `nt:base`.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `prefix:local` name.
///
/// Type names always carry a prefix; the prefix must be a registered
/// namespace for the name to be used in a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName {
    prefix: String,
    local: String,
}

impl QualifiedName {
    /// Parses `prefix:local`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] if either part is empty or holds a
    /// character that cannot appear in a name.
    pub fn parse(name: &str) -> CoreResult<Self> {
        let invalid = || CoreError::invalid_path(name);
        let (prefix, local) = name.split_once(':').ok_or_else(invalid)?;
        if !is_prefix(prefix) || !is_local_name(local) {
            return Err(invalid());
        }
        Ok(Self {
            prefix: prefix.to_string(),
            local: local.to_string(),
        })
    }

    /// Namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Local part.
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }
}

/// True for a valid namespace prefix: a letter or `_`, then letters,
/// digits, `_`, `-` or `.`.
#[must_use]
pub fn is_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn is_local_name(local: &str) -> bool {
    !local.is_empty()
        && local != "."
        && local != ".."
        && !local
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | ':' | '[' | ']' | '|' | '*' | '\'' | '"'))
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local)
    }
}

impl FromStr for QualifiedName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<QualifiedName> for String {
    fn from(name: QualifiedName) -> Self {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_names() {
        let name = QualifiedName::parse("test:MyType").unwrap();
        assert_eq!(name.prefix(), "test");
        assert_eq!(name.local(), "MyType");
        assert_eq!(name.to_string(), "test:MyType");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["MyType", ":x", "test:", "1x:y", "a:b/c", "a:b c", "a:*", "a:b:c"] {
            assert!(QualifiedName::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn ordering_groups_by_prefix() {
        let mut names: Vec<QualifiedName> = ["nt:folder", "mix:title", "nt:base"]
            .iter()
            .map(|n| n.parse().unwrap())
            .collect();
        names.sort();
        let sorted: Vec<String> = names.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, vec!["mix:title", "nt:base", "nt:folder"]);
    }

    #[test]
    fn serde_goes_through_validation() {
        let name = QualifiedName::parse("nt:base").unwrap();
        let bytes = arbor_codec::to_canonical_cbor(&name).unwrap();
        assert_eq!(bytes, arbor_codec::to_canonical_cbor("nt:base").unwrap());
        assert_eq!(arbor_codec::from_cbor::<QualifiedName>(&bytes).unwrap(), name);

        let bad = arbor_codec::to_canonical_cbor("no-prefix").unwrap();
        assert!(arbor_codec::from_cbor::<QualifiedName>(&bad).is_err());
    }
}

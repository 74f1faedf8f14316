//! Path and name helpers.

use crate::error::{CoreError, CoreResult};

/// Splits an absolute or relative path into names.
///
/// `"/"` and `""` name the starting node itself.
pub(crate) fn split_path(path: &str) -> CoreResult<Vec<&str>> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed
        .split('/')
        .map(|name| {
            validate_name(name).map_err(|_| CoreError::invalid_path(path))?;
            Ok(name)
        })
        .collect()
}

/// Checks that `name` can be used as a child node name.
pub(crate) fn validate_name(name: &str) -> CoreResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(CoreError::invalid_path(name));
    }
    Ok(())
}

/// Joins a parent path and a child name.
pub(crate) fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_paths() {
        assert!(split_path("/").unwrap().is_empty());
        assert!(split_path("").unwrap().is_empty());
        assert_eq!(
            split_path("/jcr:system/jcr:nodeTypes").unwrap(),
            vec!["jcr:system", "jcr:nodeTypes"]
        );
        assert_eq!(split_path("a/b/").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn rejects_bad_paths() {
        assert!(matches!(split_path("/a//b"), Err(CoreError::InvalidPath { .. })));
        assert!(split_path("/a/../b").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name("jcr:propertyDefinition[2]").is_ok());
    }

    #[test]
    fn joins() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }
}

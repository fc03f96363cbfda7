//! Path Confinement
//!
//! Every filesystem tool resolves model-supplied paths through this module.
//! A path is accepted only if it stays inside the project root after
//! lexical normalization, so neither absolute paths nor `..` traversal can
//! escape the sandbox.

use std::path::{Component, Path, PathBuf};

/// Resolve `requested` against `root`, rejecting anything that would land
/// outside the root. Accepts both plain relative paths and absolute paths
/// that already point inside the root (models frequently echo the root
/// back).
pub fn resolve_in_root(root: &Path, requested: &str) -> Result<PathBuf, String> {
    let requested_path = Path::new(requested);

    let relative = if requested_path.is_absolute() {
        match requested_path.strip_prefix(root) {
            Ok(stripped) => stripped.to_path_buf(),
            Err(_) => {
                return Err(format!(
                    "Path '{}' is outside the project root",
                    requested
                ))
            }
        }
    } else {
        requested_path.to_path_buf()
    };

    let mut normalized = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(format!(
                        "Path '{}' escapes the project root",
                        requested
                    ));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("Path '{}' is not relative", requested))
            }
        }
    }

    Ok(root.join(normalized))
}

/// Render `path` relative to `root` with forward slashes, for artifact
/// lists and messages.
pub fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_relative_path() {
        let root = Path::new("/project");
        let resolved = resolve_in_root(root, "src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/main.rs"));
    }

    #[test]
    fn test_curdir_components_ignored() {
        let root = Path::new("/project");
        let resolved = resolve_in_root(root, "./src/./lib.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/lib.rs"));
    }

    #[test]
    fn test_internal_parent_dirs_allowed() {
        let root = Path::new("/project");
        let resolved = resolve_in_root(root, "src/../docs/readme.md").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/docs/readme.md"));
    }

    #[test]
    fn test_traversal_escape_rejected() {
        let root = Path::new("/project");
        assert!(resolve_in_root(root, "../etc/passwd").is_err());
        assert!(resolve_in_root(root, "src/../../outside").is_err());
    }

    #[test]
    fn test_absolute_inside_root_accepted() {
        let root = Path::new("/project");
        let resolved = resolve_in_root(root, "/project/src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/main.rs"));
    }

    #[test]
    fn test_absolute_outside_root_rejected() {
        let root = Path::new("/project");
        assert!(resolve_in_root(root, "/etc/passwd").is_err());
    }

    #[test]
    fn test_relative_display() {
        let root = Path::new("/project");
        assert_eq!(
            relative_display(root, Path::new("/project/src/main.rs")),
            "src/main.rs"
        );
    }
}

//! Project Analyzer
//!
//! Pre-plan scan of the project directory: a gitignore-aware file tree and
//! the contents of key manifest files, injected into the planning prompt so
//! the model knows what already exists on disk.

use std::path::Path;

use ignore::WalkBuilder;

use swarm_core::text::truncate_chars;

/// File-tree entries are capped to keep the planning prompt bounded.
const MAX_TREE_ENTRIES: usize = 400;
/// Characters of each key file included in the prompt.
const KEY_FILE_CAP: usize = 2000;

/// Manifests and docs worth showing the planner whole.
const KEY_FILES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "Cargo.toml",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "README.md",
];

#[derive(Debug, Clone)]
pub struct ProjectAnalysis {
    pub file_tree: String,
    pub key_files: Vec<(String, String)>,
}

impl ProjectAnalysis {
    /// Render for prompt injection.
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        if self.file_tree.is_empty() {
            rendered.push_str("(empty directory)\n");
        } else {
            rendered.push_str(&self.file_tree);
        }
        for (name, content) in &self.key_files {
            rendered.push_str(&format!("\n--- {} ---\n{}\n", name, content));
        }
        rendered
    }

    pub fn is_empty_project(&self) -> bool {
        self.file_tree.is_empty()
    }
}

/// Scan the project root.
pub fn analyze_project(root: &Path) -> ProjectAnalysis {
    let mut entries = Vec::new();
    let walker = WalkBuilder::new(root).require_git(false).build();
    for entry in walker.flatten() {
        if entry.path() == root {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        entries.push(if is_dir {
            format!("{}/", relative)
        } else {
            relative
        });
        if entries.len() > MAX_TREE_ENTRIES {
            break;
        }
    }
    entries.sort();

    let truncated = entries.len() > MAX_TREE_ENTRIES;
    let mut file_tree = entries
        .into_iter()
        .take(MAX_TREE_ENTRIES)
        .collect::<Vec<_>>()
        .join("\n");
    if truncated {
        file_tree.push_str("\n... (tree truncated)");
    }

    let mut key_files = Vec::new();
    for name in KEY_FILES {
        let path = root.join(name);
        if let Ok(content) = std::fs::read_to_string(&path) {
            key_files.push((name.to_string(), truncate_chars(&content, KEY_FILE_CAP)));
        }
    }

    ProjectAnalysis {
        file_tree,
        key_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_analyze_lists_files_and_key_contents() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.ts"), "export {}").unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "demo", "scripts": {"build": "tsc"}}"#,
        )
        .unwrap();

        let analysis = analyze_project(dir.path());
        assert!(analysis.file_tree.contains("src/"));
        assert!(analysis.file_tree.contains("src/index.ts"));
        assert_eq!(analysis.key_files.len(), 1);
        assert_eq!(analysis.key_files[0].0, "package.json");

        let rendered = analysis.render();
        assert!(rendered.contains("--- package.json ---"));
        assert!(rendered.contains("\"name\": \"demo\""));
    }

    #[test]
    fn test_empty_project() {
        let dir = TempDir::new().unwrap();
        let analysis = analyze_project(dir.path());
        assert!(analysis.is_empty_project());
        assert!(analysis.render().contains("(empty directory)"));
    }

    #[test]
    fn test_gitignored_files_excluded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "node_modules/\n").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/big.js"), "x").unwrap();
        std::fs::write(dir.path().join("app.js"), "x").unwrap();

        let analysis = analyze_project(dir.path());
        assert!(analysis.file_tree.contains("app.js"));
        assert!(!analysis.file_tree.contains("node_modules/big.js"));
    }
}

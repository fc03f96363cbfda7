//! Worker Tool Catalog
//!
//! Builds the registry of tools every worker receives. Registration order
//! is the order the definitions are sent to the model.

use std::sync::Arc;

use crate::impls::{
    ExecuteCommandTool, ExecuteSqlTool, GlobFilesTool, InitDatabaseTool, ListDirectoryTool,
    ListTablesTool, PatchFileTool, ReadFileTool, SearchFilesTool, WebReaderTool, WebSearchTool,
    WriteFileTool,
};
use crate::trait_def::ToolRegistry;

/// The full worker tool catalog.
pub fn worker_toolset() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ReadFileTool));
    registry.register(Arc::new(WriteFileTool));
    registry.register(Arc::new(ListDirectoryTool));
    registry.register(Arc::new(ExecuteCommandTool));
    registry.register(Arc::new(SearchFilesTool));
    registry.register(Arc::new(PatchFileTool));
    registry.register(Arc::new(WebSearchTool));
    registry.register(Arc::new(WebReaderTool));
    registry.register(Arc::new(GlobFilesTool));
    registry.register(Arc::new(InitDatabaseTool));
    registry.register(Arc::new(ExecuteSqlTool));
    registry.register(Arc::new(ListTablesTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_and_order() {
        let registry = worker_toolset();
        assert_eq!(
            registry.names(),
            vec![
                "read_file",
                "write_file",
                "list_directory",
                "execute_command",
                "search_files",
                "patch_file",
                "web_search",
                "web_reader",
                "glob_files",
                "init_database",
                "execute_sql",
                "list_tables",
            ]
        );
    }

    #[test]
    fn test_definitions_have_schemas() {
        let registry = worker_toolset();
        for definition in registry.definitions() {
            assert!(!definition.description.is_empty(), "{}", definition.name);
            assert_eq!(definition.parameters.schema_type, "object");
        }
    }
}

//! Worker tool implementations, one module per tool.

pub mod database;
pub mod glob;
pub mod list_dir;
pub mod patch;
pub mod read;
pub mod search;
pub mod shell;
pub mod web;
pub mod write;

pub use database::{ExecuteSqlTool, InitDatabaseTool, ListTablesTool};
pub use glob::GlobFilesTool;
pub use list_dir::ListDirectoryTool;
pub use patch::PatchFileTool;
pub use read::ReadFileTool;
pub use search::SearchFilesTool;
pub use shell::ExecuteCommandTool;
pub use web::{WebReaderTool, WebSearchTool};
pub use write::WriteFileTool;

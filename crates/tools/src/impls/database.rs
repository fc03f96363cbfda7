//! SQLite Tools: init_database, execute_sql, list_tables
//!
//! A worker can create and query a SQLite database under the project root.
//! Connections are opened per call; the database file is a normal project
//! artifact.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;

use swarm_llm::ParameterSchema;

use crate::path_guard::{relative_display, resolve_in_root};
use crate::trait_def::{Tool, ToolContext, ToolResult};

const DEFAULT_DB_NAME: &str = "swarm.db";
const MAX_ROWS: usize = 100;

fn database_path(ctx: &ToolContext, args: &Value) -> Result<PathBuf, String> {
    let name = args
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_DB_NAME);
    resolve_in_root(&ctx.project_root, name)
}

fn name_schema() -> (String, ParameterSchema) {
    (
        "name".to_string(),
        ParameterSchema::string(Some(
            "Database file name relative to the project root (defaults to swarm.db)",
        )),
    )
}

/// Create (or open) a project database file.
pub struct InitDatabaseTool;

#[async_trait]
impl Tool for InitDatabaseTool {
    fn name(&self) -> &str {
        "init_database"
    }

    fn description(&self) -> &str {
        "Create a SQLite database file in the project (or open an existing one)."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        let (key, schema) = name_schema();
        properties.insert(key, schema);
        ParameterSchema::object(None, properties, vec![])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let path = match database_path(ctx, &args) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return ToolResult::err(format!("Failed to create directories: {}", e));
            }
        }
        match Connection::open(&path) {
            Ok(_) => {
                let relative = relative_display(&ctx.project_root, &path);
                ctx.record_artifact(&relative);
                ToolResult::ok(format!("Database ready at {}", relative))
            }
            Err(e) => ToolResult::err(format!("Failed to open database: {}", e)),
        }
    }
}

/// Run a SQL statement or query.
pub struct ExecuteSqlTool;

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn name(&self) -> &str {
        "execute_sql"
    }

    fn description(&self) -> &str {
        "Execute SQL against a project database. SELECT queries return rows; other statements return the affected row count."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "sql".to_string(),
            ParameterSchema::string(Some("The SQL statement to execute")),
        );
        let (key, schema) = name_schema();
        properties.insert(key, schema);
        ParameterSchema::object(None, properties, vec!["sql".to_string()])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(sql) = args.get("sql").and_then(|v| v.as_str()) else {
            return ToolResult::err("Missing required parameter: sql");
        };
        let path = match database_path(ctx, &args) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };
        let connection = match Connection::open(&path) {
            Ok(c) => c,
            Err(e) => return ToolResult::err(format!("Failed to open database: {}", e)),
        };

        let head = sql.trim_start().to_lowercase();
        if head.starts_with("select") || head.starts_with("with") || head.starts_with("pragma") {
            match run_query(&connection, sql) {
                Ok(output) => ToolResult::ok(output),
                Err(e) => ToolResult::err(format!("Query failed: {}", e)),
            }
        } else {
            match connection.execute(sql, []) {
                Ok(count) => ToolResult::ok(format!("{} row(s) affected", count)),
                Err(e) => ToolResult::err(format!("Statement failed: {}", e)),
            }
        }
    }
}

fn run_query(connection: &Connection, sql: &str) -> rusqlite::Result<String> {
    let mut statement = connection.prepare(sql)?;
    let column_names: Vec<String> = statement
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let column_count = column_names.len();

    let mut output = column_names.join(" | ");
    output.push('\n');

    let mut rows = statement.query([])?;
    let mut row_count = 0usize;
    while let Some(row) = rows.next()? {
        if row_count >= MAX_ROWS {
            output.push_str(&format!("... (truncated at {} rows)\n", MAX_ROWS));
            break;
        }
        let rendered: Vec<String> = (0..column_count)
            .map(|index| match row.get_ref(index) {
                Ok(value) => render_value(value),
                Err(_) => "?".to_string(),
            })
            .collect();
        output.push_str(&rendered.join(" | "));
        output.push('\n');
        row_count += 1;
    }

    output.push_str(&format!("({} row(s))", row_count));
    Ok(output)
}

fn render_value(value: rusqlite::types::ValueRef<'_>) -> String {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// List the tables of a project database.
pub struct ListTablesTool;

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        "list_tables"
    }

    fn description(&self) -> &str {
        "List the tables in a project database."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = HashMap::new();
        let (key, schema) = name_schema();
        properties.insert(key, schema);
        ParameterSchema::object(None, properties, vec![])
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let path = match database_path(ctx, &args) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };
        if !path.exists() {
            return ToolResult::err("Database does not exist. Use init_database first.");
        }
        let connection = match Connection::open(&path) {
            Ok(c) => c,
            Err(e) => return ToolResult::err(format!("Failed to open database: {}", e)),
        };

        let result: rusqlite::Result<Vec<String>> = (|| {
            let mut statement = connection.prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let names = statement
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })();

        match result {
            Ok(names) if names.is_empty() => ToolResult::ok("(no tables)"),
            Ok(names) => ToolResult::ok(names.join("\n")),
            Err(e) => ToolResult::err(format!("Failed to list tables: {}", e)),
        }
    }
}

//! Relational store access for the structured-query path.

use askroute_core::{AppError, AppResult};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Rows shown per table in the schema description.
const SAMPLE_ROWS: usize = 3;

const DEFAULT_MAX_ROWS: usize = 1000;

/// The relational store the structured-query path runs against.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Text describing tables and columns, fed to the query-writing prompt.
    async fn get_schema_description(&self) -> AppResult<String>;

    /// Run a read-only query and render its rows as text.
    async fn execute_read_query(&self, query: &str) -> AppResult<String>;
}

/// Executor over a SQLite database file, always opened read-only.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    path: PathBuf,
    max_rows: usize,
}

impl SqliteExecutor {
    pub fn new(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(AppError::Config(format!(
                "Database not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            path,
            max_rows: DEFAULT_MAX_ROWS,
        })
    }

    /// Cap on rows rendered from one query.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> AppResult<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            AppError::Execution(format!(
                "Failed to open database {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn get_schema_description(&self) -> AppResult<String> {
        let conn = self.open()?;
        tokio::task::spawn_blocking(move || describe_schema(&conn))
            .await
            .map_err(|e| AppError::Execution(format!("Schema task failed: {}", e)))?
    }

    async fn execute_read_query(&self, query: &str) -> AppResult<String> {
        let conn = self.open()?;
        // A caller timeout drops this future; the guard then stops the statement.
        let guard = InterruptOnDrop::new(conn.get_interrupt_handle());
        let query = query.to_string();
        let max_rows = self.max_rows;

        let result = tokio::task::spawn_blocking(move || run_query(&conn, &query, max_rows))
            .await
            .map_err(|e| AppError::Execution(format!("Query task failed: {}", e)))?;

        guard.disarm();
        result
    }
}

/// Executor used when no database is configured.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredExecutor;

#[async_trait]
impl QueryExecutor for UnconfiguredExecutor {
    async fn get_schema_description(&self) -> AppResult<String> {
        Err(not_configured())
    }

    async fn execute_read_query(&self, _query: &str) -> AppResult<String> {
        Err(not_configured())
    }
}

fn not_configured() -> AppError {
    AppError::Execution(
        "No database configured. Set `database.path` in config or pass --database.".to_string(),
    )
}

struct InterruptOnDrop {
    handle: Option<InterruptHandle>,
}

impl InterruptOnDrop {
    fn new(handle: InterruptHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Interrupting abandoned query");
            handle.interrupt();
        }
    }
}

fn execution_error(e: rusqlite::Error) -> AppError {
    AppError::Execution(e.to_string())
}

fn describe_schema(conn: &Connection) -> AppResult<String> {
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL \
             ORDER BY name",
        )
        .map_err(execution_error)?;
    let tables = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(execution_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(execution_error)?;

    let mut sections = Vec::with_capacity(tables.len());
    for (name, sql) in tables {
        let mut section = sql.trim().to_string();
        match sample_rows(conn, &name) {
            Ok(sample) => {
                section.push_str("\n\n");
                section.push_str(&sample);
            }
            Err(e) => warn!("Could not sample rows from {}: {}", name, e),
        }
        sections.push(section);
    }

    Ok(sections.join("\n\n"))
}

fn sample_rows(conn: &Connection, table: &str) -> AppResult<String> {
    let sql = format!(
        "SELECT * FROM \"{}\" LIMIT {}",
        table.replace('"', "\"\""),
        SAMPLE_ROWS
    );
    let mut stmt = conn.prepare(&sql).map_err(execution_error)?;
    let header = stmt.column_names().join("\t");
    let width = stmt.column_count();

    let mut lines = vec![
        "/*".to_string(),
        format!("{} rows from {} table:", SAMPLE_ROWS, table),
        header,
    ];
    let mut rows = stmt.query([]).map_err(execution_error)?;
    while let Some(row) = rows.next().map_err(execution_error)? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(render_plain(row.get_ref(i).map_err(execution_error)?));
        }
        lines.push(cells.join("\t"));
    }
    lines.push("*/".to_string());
    Ok(lines.join("\n"))
}

fn run_query(conn: &Connection, query: &str, max_rows: usize) -> AppResult<String> {
    let mut stmt = conn.prepare(query).map_err(execution_error)?;
    if !stmt.readonly() {
        return Err(AppError::Validation(
            "Refusing to execute a statement that writes to the database".to_string(),
        ));
    }

    let width = stmt.column_count();
    let mut rendered = Vec::new();
    let mut rows = stmt.query([]).map_err(execution_error)?;
    while let Some(row) = rows.next().map_err(execution_error)? {
        if rendered.len() == max_rows {
            warn!("Query result truncated at {} rows", max_rows);
            break;
        }
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(render_literal(row.get_ref(i).map_err(execution_error)?));
        }
        rendered.push(render_tuple(&cells));
    }

    debug!("Query returned {} rows", rendered.len());
    Ok(format!("[{}]", rendered.join(", ")))
}

fn render_tuple(cells: &[String]) -> String {
    match cells {
        [single] => format!("({},)", single),
        _ => format!("({})", cells.join(", ")),
    }
}

/// Cell rendered the way it reads inside a result row: strings quoted.
fn render_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(bytes) => format!(
            "'{}'",
            String::from_utf8_lossy(bytes).replace('\'', "\\'")
        ),
        other => render_plain(other),
    }
}

fn render_plain(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "None".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => format!("<blob {} bytes>", bytes.len()),
    }
}

//! Read-only `SQLite` structured-query provider.
//!
//! Every call opens its own read-only connection on a blocking thread
//! (`spawn_blocking`), so the provider itself is `Send + Sync` and can be
//! shared across requests. Rows are rendered as a tuple-list literal such
//! as `[('522001', 'Nguyen Van A', 3.2)]`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::StructuredQuery;
use crate::error::AgentError;

/// Provider name used in errors.
const PROVIDER: &str = "structured query";
/// Maximum rows rendered for one statement.
const MAX_ROWS: usize = 200;
/// Sample rows shown per table by `describe`.
const SAMPLE_ROWS: usize = 3;

/// Structured-query provider backed by a `SQLite` database file.
#[derive(Debug, Clone)]
pub struct SqliteQuery {
    path: PathBuf,
}

impl SqliteQuery {
    /// Opens the database once to verify it is readable.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Capability`] if the file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let path = path.into();
        open_read_only(&path)?;
        Ok(Self { path })
    }

    /// Path of the backing database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_read_only(path: &Path) -> Result<Connection, AgentError> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|e| {
        AgentError::capability(PROVIDER, format!("cannot open {}: {e}", path.display()))
    })
}

fn db_error(e: &rusqlite::Error) -> AgentError {
    AgentError::capability(PROVIDER, e.to_string())
}

/// Normalizes a statement and rejects anything but a single `SELECT`/`WITH`.
fn validate_statement(statement: &str) -> Result<&str, AgentError> {
    let trimmed = statement.trim().trim_end_matches(';').trim_end();
    if trimmed.is_empty() {
        return Err(AgentError::capability(PROVIDER, "empty statement"));
    }
    if trimmed.contains(';') {
        return Err(AgentError::capability(
            PROVIDER,
            "only a single statement is allowed",
        ));
    }
    let keyword = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if keyword != "SELECT" && keyword != "WITH" {
        return Err(AgentError::capability(
            PROVIDER,
            format!("only SELECT statements are allowed, got {keyword}"),
        ));
    }
    Ok(trimmed)
}

fn run_query(path: &Path, statement: &str) -> Result<String, AgentError> {
    let statement = validate_statement(statement)?;
    let conn = open_read_only(path)?;
    let mut stmt = conn.prepare(statement).map_err(|e| db_error(&e))?;
    if !stmt.readonly() {
        return Err(AgentError::capability(
            PROVIDER,
            "statement would modify the database",
        ));
    }

    let columns = stmt.column_count();
    let mut rows = stmt.query([]).map_err(|e| db_error(&e))?;
    let mut rendered = Vec::new();
    while let Some(row) = rows.next().map_err(|e| db_error(&e))? {
        if rendered.len() == MAX_ROWS {
            break;
        }
        let mut values = Vec::with_capacity(columns);
        for idx in 0..columns {
            let value = row.get_ref(idx).map_err(|e| db_error(&e))?;
            values.push(render_value(value));
        }
        rendered.push(render_tuple(&values));
    }

    debug!(rows = rendered.len(), "structured query executed");
    Ok(format!("[{}]", rendered.join(", ")))
}

fn run_describe(path: &Path, tables: &[String]) -> Result<String, AgentError> {
    let conn = open_read_only(path)?;
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(|e| db_error(&e))?;
    let known: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| db_error(&e))?
        .collect::<Result<_, _>>()
        .map_err(|e| db_error(&e))?;

    let selected: Vec<&(String, String)> = if tables.is_empty() {
        known.iter().collect()
    } else {
        let missing: Vec<&str> = tables
            .iter()
            .filter(|t| !known.iter().any(|(name, _)| name == *t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AgentError::capability(
                PROVIDER,
                format!("table_names {{{}}} not found in database", missing.join(", ")),
            ));
        }
        known
            .iter()
            .filter(|(name, _)| tables.contains(name))
            .collect()
    };

    let mut out = Vec::with_capacity(selected.len());
    for (name, ddl) in selected {
        out.push(describe_table(&conn, name, ddl)?);
    }
    Ok(out.join("\n\n"))
}

fn describe_table(conn: &Connection, name: &str, ddl: &str) -> Result<String, AgentError> {
    let quoted = name.replace('"', "\"\"");
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM \"{quoted}\" LIMIT {SAMPLE_ROWS}"))
        .map_err(|e| db_error(&e))?;
    let header = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join("\t");
    let columns = stmt.column_count();

    let mut body = String::new();
    let mut rows = stmt.query([]).map_err(|e| db_error(&e))?;
    while let Some(row) = rows.next().map_err(|e| db_error(&e))? {
        let mut values = Vec::with_capacity(columns);
        for idx in 0..columns {
            let value = row.get_ref(idx).map_err(|e| db_error(&e))?;
            values.push(render_cell(value));
        }
        let _ = writeln!(body, "{}", values.join("\t"));
    }

    Ok(format!(
        "{}\n\n/*\n{SAMPLE_ROWS} rows from {name} table:\n{header}\n{body}*/",
        ddl.trim()
    ))
}

/// Renders one value as a literal inside a row tuple.
fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "None".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => render_float(f),
        ValueRef::Text(bytes) => quote_text(&String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => {
            let mut out = String::from("b'");
            for b in bytes {
                if b.is_ascii_graphic() && *b != b'\'' && *b != b'\\' {
                    out.push(char::from(*b));
                } else {
                    let _ = write!(out, "\\x{b:02x}");
                }
            }
            out.push('\'');
            out
        }
    }
}

/// Renders one value as a bare cell for the schema sample.
fn render_cell(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        other => render_value(other),
    }
}

#[allow(clippy::float_cmp)]
fn render_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("{sign}inf")
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn quote_text(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn render_tuple(values: &[String]) -> String {
    if values.len() == 1 {
        format!("({},)", values[0])
    } else {
        format!("({})", values.join(", "))
    }
}

#[async_trait]
impl StructuredQuery for SqliteQuery {
    async fn execute(&self, statement: &str) -> Result<String, AgentError> {
        let path = self.path.clone();
        let statement = statement.to_string();
        tokio::task::spawn_blocking(move || run_query(&path, &statement))
            .await
            .map_err(|e| AgentError::capability(PROVIDER, format!("query task failed: {e}")))?
    }

    async fn describe(&self, tables: &[String]) -> Result<String, AgentError> {
        let path = self.path.clone();
        let tables = tables.to_vec();
        tokio::task::spawn_blocking(move || run_describe(&path, &tables))
            .await
            .map_err(|e| AgentError::capability(PROVIDER, format!("schema task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sample_db() -> (tempfile::TempDir, SqliteQuery) {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("university.db");
        let conn = Connection::open(&path).unwrap_or_else(|_| unreachable!());
        conn.execute_batch(
            "CREATE TABLE students (id TEXT PRIMARY KEY, name TEXT, gpa REAL, advisor TEXT);
             INSERT INTO students VALUES ('522001', 'Nguyen Van A', 3.2, NULL);
             INSERT INTO students VALUES ('522002', 'O''Brien', 3.0, 'Dr. Tran');",
        )
        .unwrap_or_else(|_| unreachable!());
        drop(conn);
        let query = SqliteQuery::open(&path).unwrap_or_else(|_| unreachable!());
        (dir, query)
    }

    #[tokio::test]
    async fn test_execute_renders_tuple_list() {
        let (_dir, db) = sample_db();
        let rows = db
            .execute("SELECT id, name, gpa, advisor FROM students ORDER BY id;")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            rows,
            "[('522001', 'Nguyen Van A', 3.2, None), ('522002', \"O'Brien\", 3.0, 'Dr. Tran')]"
        );
    }

    #[tokio::test]
    async fn test_execute_single_column_and_empty() {
        let (_dir, db) = sample_db();
        let rows = db
            .execute("SELECT id FROM students WHERE id = '522001'")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(rows, "[('522001',)]");
        let none = db
            .execute("SELECT id FROM students WHERE id = 'missing'")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(none, "[]");
    }

    #[test_case("DELETE FROM students"; "delete")]
    #[test_case("SELECT 1; DROP TABLE students"; "stacked statements")]
    #[test_case("   "; "empty")]
    fn test_validate_rejects(statement: &str) {
        assert!(validate_statement(statement).is_err());
    }

    #[tokio::test]
    async fn test_execute_reports_sql_errors() {
        let (_dir, db) = sample_db();
        let result = db.execute("SELECT * FROM nowhere").await;
        assert!(matches!(result, Err(AgentError::Capability { .. })));
    }

    #[tokio::test]
    async fn test_describe_tables() {
        let (_dir, db) = sample_db();
        let schema = db.describe(&[]).await.unwrap_or_else(|_| unreachable!());
        assert!(schema.contains("CREATE TABLE students"));
        assert!(schema.contains("3 rows from students table:"));
        assert!(schema.contains("id\tname\tgpa\tadvisor"));

        let missing = db.describe(&["courses".to_string()]).await;
        assert!(missing.is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        assert!(SqliteQuery::open(dir.path().join("absent.db")).is_err());
    }

    #[test]
    fn test_render_float() {
        assert_eq!(render_float(3.0), "3.0");
        assert_eq!(render_float(3.25), "3.25");
        assert_eq!(render_float(-0.5), "-0.5");
    }
}

//! Database connection management
//!
//! This module defines the [`SqlConnection`] capability the engine executes
//! against, and [`DatabaseConn`], the bundled SQLite implementation of it.

use std::time::Duration;

use anyhow::{anyhow, Result};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use thiserror::Error;

use crate::config::DatabaseConfiguration;
use crate::database::core::value::{Row, SqlValue};

/// Failure reported by a connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// A unique or primary key constraint rejected the statement
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("{0}")]
    Other(String),
}

/// A live, caller-owned database connection
///
/// The engine only ever borrows a connection for the duration of one call.
/// Statement timeouts, isolation and busy handling are properties of the
/// implementation, never of the engine.
pub trait SqlConnection {
    /// Execute one statement with bound parameters, returning affected rows
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, DriverError>;

    /// Execute one or more `;`-separated statements without parameters
    fn execute_batch(&self, sql: &str) -> Result<(), DriverError>;

    /// Run a query with bound parameters and materialize every row
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DriverError>;

    fn begin(&self) -> Result<(), DriverError>;

    fn commit(&self) -> Result<(), DriverError>;

    fn rollback(&self) -> Result<(), DriverError>;
}

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db = DatabaseConn {
            conn: Self::connect(path)?,
        };
        db.configure()?;
        Ok(db)
    }

    fn connect(path: Option<&str>) -> Result<Connection> {
        match path {
            Some(p) => Connection::open(p)
                .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e)),
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e)),
        }
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    /// Open the database named by a configuration
    ///
    /// `:memory:` selects an in-memory database. The configured busy timeout
    /// is applied so concurrent writers wait for the lock instead of failing.
    pub fn from_config(config: &DatabaseConfiguration) -> Result<Self> {
        let path = match config.database.as_str() {
            ":memory:" | "" => None,
            p => Some(p),
        };
        let conn = Self::connect(path)?;
        // set before configure() so the journal mode switch also waits for the lock
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|e| anyhow!("Failed to set busy timeout: {}", e))?;
        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Configure the database with the settings the engine relies on
    fn configure(&self) -> Result<()> {
        // Enable WAL mode for better concurrent read/write performance
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to set journal mode: {}", e))?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| anyhow!("Failed to set synchronous mode: {}", e))?;

        // Foreign keys (and their ON DELETE CASCADE) are off by default in SQLite
        self.conn
            .execute("PRAGMA foreign_keys=ON", [])
            .map_err(|e| anyhow!("Failed to enable foreign keys: {}", e))?;

        Ok(())
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }

    /// Column names of a table, in definition order
    pub fn table_columns(&self, table_name: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(|e| anyhow!("Failed to inspect table: {}", e))?;
        let names = stmt
            .query_map([table_name], |row| row.get::<_, String>(0))
            .map_err(|e| anyhow!("Failed to inspect table: {}", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| anyhow!("Failed to read table info: {}", e))?;
        Ok(names)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Bool(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

fn driver_error(e: rusqlite::Error) -> DriverError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = e {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return DriverError::UniqueViolation(e.to_string());
        }
    }
    DriverError::Other(e.to_string())
}

impl SqlConnection for DatabaseConn {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, DriverError> {
        self.conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(driver_error)
    }

    fn execute_batch(&self, sql: &str) -> Result<(), DriverError> {
        self.conn.execute_batch(sql).map_err(driver_error)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DriverError> {
        let mut stmt = self.conn.prepare(sql).map_err(driver_error)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(driver_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(driver_error)? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(from_value_ref(row.get_ref(idx).map_err(driver_error)?));
            }
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }

    /// Takes the write lock up front so check-then-insert sequences cannot interleave
    fn begin(&self) -> Result<(), DriverError> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(driver_error)
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.conn.execute_batch("COMMIT").map_err(driver_error)
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.conn.execute_batch("ROLLBACK").map_err(driver_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_execute_with_params() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let affected = db
            .execute(
                "INSERT INTO test (id, name) VALUES (?, ?)",
                &[SqlValue::Integer(1), SqlValue::from("one")],
            )
            .unwrap();
        assert_eq!(affected, 1);
    }

    #[test]
    fn test_query_materializes_rows_in_order() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, score REAL);
             INSERT INTO test VALUES (1, 'a', 1.5), (2, 'b', NULL), (3, 'c', 3.0);",
        )
        .unwrap();

        let rows = db
            .query("SELECT * FROM test WHERE id >= ? ORDER BY id", &[SqlValue::Integer(2)])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns(), &["id", "name", "score"]);
        assert_eq!(rows[0].get("score"), Some(&SqlValue::Null));
        assert_eq!(rows[1].get("name"), Some(&SqlValue::Text("c".to_string())));
    }

    #[test]
    fn test_unique_violation_is_classified() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE test (id INTEGER PRIMARY KEY)")
            .unwrap();
        db.execute("INSERT INTO test (id) VALUES (?)", &[SqlValue::Integer(1)])
            .unwrap();

        let err = db
            .execute("INSERT INTO test (id) VALUES (?)", &[SqlValue::Integer(1)])
            .unwrap_err();
        assert!(matches!(err, DriverError::UniqueViolation(_)));
    }

    #[test]
    fn test_rollback_discards_ddl() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.begin().unwrap();
        db.execute_batch("CREATE TABLE scratch (id INTEGER)").unwrap();
        db.rollback().unwrap();

        assert!(!db.table_exists("scratch").unwrap());
    }

    #[test]
    fn test_table_columns() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE test_table (id INTEGER PRIMARY KEY, label TEXT)")
            .unwrap();

        assert!(db.table_exists("test_table").unwrap());
        assert!(!db.table_exists("nonexistent_table").unwrap());
        assert_eq!(db.table_columns("test_table").unwrap(), vec!["id", "label"]);
    }
}

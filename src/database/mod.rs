//! Database module
//!
//! Everything between a fluent table definition and the rows it produces:
//!
//! ```text
//! database/
//! ├── core/        # SqlValue, Row, SqlConnection and the SQLite DatabaseConn
//! ├── schema/      # SchemaBuilder and the column/constraint/filter model
//! ├── dialect/     # Dialect strategies and the DialectTranslator
//! ├── executor     # QueryExecutor, runs rendered statements
//! ├── mapper       # ResultMapper, typed row decoding
//! └── migration/   # MigrationTracker and the migration ledger
//! ```
//!
//! A statement flows one way: the builder produces a [`Schema`], the
//! translator renders it into a [`Statement`], and the executor runs it on the
//! caller's connection, consulting the migration ledger when the schema is
//! named as a migration.

pub mod core;
pub mod dialect;
pub mod executor;
pub mod mapper;
pub mod migration;
pub mod schema;

pub use self::core::{
    parse_timestamp, DatabaseConn, DriverError, Row, SqlConnection, SqlValue, DATE_FORMAT,
    TIMESTAMP_FORMAT,
};

pub use dialect::{
    Dialect, DialectKind, DialectTranslator, MysqlDialect, PostgresDialect, SqliteDialect,
    Statement, CREATED_AT_COLUMN, UPDATED_AT_COLUMN,
};

pub use executor::{ExecuteOutcome, QueryExecutor};

pub use mapper::ResultMapper;

pub use migration::{
    checksum, Migration, MigrationOutcome, MigrationStatus, MigrationTracker, LEDGER_SUFFIX,
};

pub use schema::{
    ColumnKind, ColumnSpec, ColumnValue, ConstraintSpec, Location, OperationKind, Schema,
    SchemaBuilder, WhereSpec,
};

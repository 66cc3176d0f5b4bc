#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! schemaforge - fluent table definitions and idempotent migrations
//!
//! Tables and queries are declared with a chained [`SchemaBuilder`], rendered
//! into SQL for the configured dialect (SQLite, MySQL/MariaDB or PostgreSQL)
//! and executed on a connection the caller owns. Statements tagged with a
//! migration name are recorded in a `<prefix>migrations` ledger and run at
//! most once.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting of ledger records | `tabled` |
//! | `cli` | The `schemaforge` binary | All above + `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`database`]**: builder, dialects, executor, result mapping and the ledger
//! - **[`config`]**: [`DatabaseConfiguration`] loading from TOML and environment
//! - **[`diagnostics`]**: the [`DiagnosticSink`] every component reports to
//! - **[`error`]**: the [`SchemaError`] taxonomy
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use schemaforge::*;
//!
//! let config = DatabaseConfiguration::in_memory("zessentials_");
//! let conn = DatabaseConn::from_config(&config)?;
//! let sink = TracingSink;
//!
//! SchemaBuilder::create("players", |table| {
//!     table.uuid("id").primary();
//!     table.string("name", 16);
//!     table.decimal("balance").default_value(0);
//!     table.timestamps();
//!     table.migration("create_players_table");
//! })
//! .execute(&conn, &config, &sink)?;
//!
//! let rich = SchemaBuilder::select("players", |query| {
//!     query.where_op("balance", ">=", 1000);
//! })
//! .execute_select_count(&conn, &config, &sink)?;
//! ```

pub mod config;
pub mod database;
pub mod diagnostics;
pub mod error;

// =============================================================================
// Configuration
// =============================================================================

pub use config::DatabaseConfiguration;

// =============================================================================
// Errors and diagnostics
// =============================================================================

pub use diagnostics::{DiagnosticLevel, DiagnosticSink, MemorySink, TracingSink};
pub use error::{Result, SchemaError};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

pub use database::{DatabaseConn, DriverError, Row, SqlConnection, SqlValue};

pub use database::{
    ColumnKind, Location, OperationKind, Schema, SchemaBuilder, CREATED_AT_COLUMN,
    UPDATED_AT_COLUMN,
};

pub use database::{Dialect, DialectKind, DialectTranslator, Statement};

pub use database::{ExecuteOutcome, QueryExecutor, ResultMapper};

pub use database::{Migration, MigrationOutcome, MigrationStatus, MigrationTracker};

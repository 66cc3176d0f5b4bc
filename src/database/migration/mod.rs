//! Migration ledger
//!
//! Named statements are recorded in a `<prefix>migrations` table together with
//! a SHA-256 checksum of the rendered SQL and its parameters. A recorded name
//! with the same checksum is skipped; a recorded name with a different checksum
//! is a [`SchemaError::MigrationConflict`] and nothing is executed.
//!
//! # Concurrency
//!
//! The check, the statement and the ledger insert share one transaction,
//! opened with `begin()` (`BEGIN IMMEDIATE` on SQLite, which takes the write
//! lock up front). The ledger's primary key on the migration name is the last
//! line of defense: a process that loses the race gets a unique violation,
//! rolls back, and re-reads the winner's record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::DatabaseConfiguration;
use crate::database::core::{DriverError, Row, SqlConnection};
use crate::database::dialect::{DialectTranslator, Statement};
use crate::database::executor::run_statement;
use crate::database::mapper::ResultMapper;
use crate::database::schema::SchemaBuilder;
use crate::diagnostics::DiagnosticSink;
use crate::error::{Result, SchemaError};

/// Ledger table name, appended to the configured table prefix
pub const LEDGER_SUFFIX: &str = "migrations";

/// One ledger record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct Migration {
    pub name: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

impl Migration {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Migration {
            name: row.get_string("migration")?,
            checksum: row.get_string("checksum")?,
            applied_at: row.get_timestamp("applied_at")?,
        })
    }
}

/// State of a migration name relative to a checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    Pending,
    Applied,
    /// Recorded under a different checksum
    Conflicted { recorded: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Applied,
    AlreadyApplied,
}

/// Checksum of a rendered statement: SHA-256 over the SQL and every bound parameter
pub fn checksum(statement: &Statement) -> String {
    let mut hasher = Sha256::new();
    hasher.update(statement.sql.as_bytes());
    for param in &statement.params {
        hasher.update([0u8]);
        hasher.update(param.kind_name().as_bytes());
        hasher.update(b":");
        hasher.update(param.to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

enum Attempt {
    Done(MigrationOutcome),
    LostRace,
}

/// Reads and writes the migration ledger
pub struct MigrationTracker<'a> {
    translator: DialectTranslator,
    mapper: ResultMapper,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> MigrationTracker<'a> {
    pub fn new(config: &DatabaseConfiguration, sink: &'a dyn DiagnosticSink) -> Self {
        let mut mapper = ResultMapper::new();
        mapper.register(Migration::from_row);
        Self {
            translator: DialectTranslator::new(config),
            mapper,
            sink,
        }
    }

    /// Prefixed name of the ledger table
    pub fn ledger_table(&self) -> String {
        self.translator.table_name(LEDGER_SUFFIX)
    }

    fn fail(&self, err: SchemaError) -> SchemaError {
        self.sink.error(&err.to_string());
        err
    }

    fn render(&self, builder: SchemaBuilder) -> Result<Statement> {
        let schema = builder.build()?;
        self.translator.render(&schema, schema.operation())
    }

    /// Create the ledger table if it does not exist yet
    pub fn ensure_ledger(&self, conn: &dyn SqlConnection) -> Result<()> {
        let statement = self.render(SchemaBuilder::create(LEDGER_SUFFIX, |table| {
            table.string("migration", 255).primary();
            table.string("checksum", 64);
            table.timestamp("applied_at");
        }))?;
        conn.execute_batch(&statement.sql)
            .map_err(|e| self.fail(SchemaError::sql(&statement.sql, e)))
    }

    /// Ledger record for `name`, if any
    pub fn lookup(&self, conn: &dyn SqlConnection, name: &str) -> Result<Option<Migration>> {
        let statement = self.render(SchemaBuilder::select(LEDGER_SUFFIX, |query| {
            query.where_eq("migration", name);
        }))?;
        let rows = conn
            .query(&statement.sql, &statement.params)
            .map_err(|e| self.fail(SchemaError::sql(&statement.sql, e)))?;
        match rows.first() {
            Some(row) => self.mapper.decode::<Migration>(row).map(Some),
            None => Ok(None),
        }
    }

    /// Whether `name` is pending, applied with `checksum`, or recorded with another checksum
    pub fn status(
        &self,
        conn: &dyn SqlConnection,
        name: &str,
        checksum: &str,
    ) -> Result<MigrationStatus> {
        self.ensure_ledger(conn)?;
        Ok(match self.lookup(conn, name)? {
            None => MigrationStatus::Pending,
            Some(m) if m.checksum == checksum => MigrationStatus::Applied,
            Some(m) => MigrationStatus::Conflicted {
                recorded: m.checksum,
            },
        })
    }

    /// Every ledger record, oldest first
    pub fn applied(&self, conn: &dyn SqlConnection) -> Result<Vec<Migration>> {
        self.ensure_ledger(conn)?;
        let statement = self.render(SchemaBuilder::select(LEDGER_SUFFIX, |_| {}))?;
        let rows = conn
            .query(&statement.sql, &statement.params)
            .map_err(|e| self.fail(SchemaError::sql(&statement.sql, e)))?;
        let mut migrations = self.mapper.decode_all::<Migration>(&rows)?;
        migrations.sort_by(|a, b| {
            a.applied_at
                .cmp(&b.applied_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(migrations)
    }

    /// Remove the record of `name` so it runs again next time; returns whether a record existed
    pub fn forget(&self, conn: &dyn SqlConnection, name: &str) -> Result<bool> {
        self.ensure_ledger(conn)?;
        let statement = self.render(SchemaBuilder::delete(LEDGER_SUFFIX, |query| {
            query.where_eq("migration", name);
        }))?;
        let removed = conn
            .execute(&statement.sql, &statement.params)
            .map_err(|e| self.fail(SchemaError::sql(&statement.sql, e)))?;
        if removed > 0 {
            self.sink.info(&format!("forgot migration '{}'", name));
        }
        Ok(removed > 0)
    }

    fn check_recorded(
        &self,
        conn: &dyn SqlConnection,
        name: &str,
        current: &str,
    ) -> Result<Option<MigrationOutcome>> {
        match self.lookup(conn, name)? {
            None => Ok(None),
            Some(recorded) if recorded.checksum == current => {
                self.sink
                    .debug(&format!("migration '{}' already applied, skipping", name));
                Ok(Some(MigrationOutcome::AlreadyApplied))
            }
            Some(recorded) => Err(self.fail(SchemaError::MigrationConflict {
                name: name.to_string(),
                recorded: recorded.checksum,
                current: current.to_string(),
            })),
        }
    }

    /// Run `statement` as migration `name`, at most once per name
    pub fn apply(
        &self,
        conn: &dyn SqlConnection,
        name: &str,
        statement: &Statement,
        ddl: bool,
    ) -> Result<MigrationOutcome> {
        let current = checksum(statement);
        self.ensure_ledger(conn)?;

        if let Some(outcome) = self.check_recorded(conn, name, &current)? {
            return Ok(outcome);
        }

        conn.begin()
            .map_err(|e| self.fail(SchemaError::sql("BEGIN", e)))?;

        match self.attempt(conn, name, statement, ddl, &current) {
            Ok(Attempt::Done(outcome)) => {
                if let Err(e) = conn.commit() {
                    self.rollback(conn);
                    return Err(self.fail(SchemaError::sql("COMMIT", e)));
                }
                if outcome == MigrationOutcome::Applied {
                    self.sink.info(&format!("applied migration '{}'", name));
                }
                Ok(outcome)
            }
            Ok(Attempt::LostRace) => {
                self.rollback(conn);
                self.sink.debug(&format!(
                    "migration '{}' was recorded concurrently, re-reading ledger",
                    name
                ));
                match self.check_recorded(conn, name, &current)? {
                    Some(outcome) => Ok(outcome),
                    None => Err(self.fail(SchemaError::sql(
                        self.ledger_table(),
                        format!("ledger record for '{}' vanished after a conflict", name),
                    ))),
                }
            }
            Err(e) => {
                self.rollback(conn);
                Err(e)
            }
        }
    }

    fn attempt(
        &self,
        conn: &dyn SqlConnection,
        name: &str,
        statement: &Statement,
        ddl: bool,
        current: &str,
    ) -> Result<Attempt> {
        if let Some(outcome) = self.check_recorded(conn, name, current)? {
            return Ok(Attempt::Done(outcome));
        }

        run_statement(conn, statement, ddl)
            .map_err(|e| self.fail(SchemaError::sql(&statement.sql, e)))?;

        let record = self.render(SchemaBuilder::insert(LEDGER_SUFFIX, |row| {
            row.string_value("migration", name);
            row.string_value("checksum", current);
            row.timestamp_value("applied_at", Utc::now());
        }))?;
        match conn.execute(&record.sql, &record.params) {
            Ok(_) => Ok(Attempt::Done(MigrationOutcome::Applied)),
            Err(DriverError::UniqueViolation(_)) => Ok(Attempt::LostRace),
            Err(e) => Err(self.fail(SchemaError::sql(&record.sql, e))),
        }
    }

    fn rollback(&self, conn: &dyn SqlConnection) {
        if let Err(e) = conn.rollback() {
            self.sink.warn(&format!("rollback failed: {}", e));
        }
    }
}

//! Statement execution
//!
//! The [`QueryExecutor`] renders a built [`Schema`] through the configured
//! dialect and runs it on a caller-owned connection. Statements that carry a
//! migration name go through the [`MigrationTracker`] instead of being run
//! directly. Every failure is reported to the diagnostic sink before it is
//! returned.

use crate::config::DatabaseConfiguration;
use crate::database::core::{DriverError, Row, SqlConnection, SqlValue};
use crate::database::dialect::{DialectTranslator, Statement};
use crate::database::mapper::ResultMapper;
use crate::database::migration::{MigrationOutcome, MigrationTracker};
use crate::database::schema::{OperationKind, Schema};
use crate::diagnostics::DiagnosticSink;
use crate::error::{Result, SchemaError};

/// Result of [`QueryExecutor::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Ran without a migration name
    Executed { rows_affected: usize },
    /// Ran as a migration and was recorded in the ledger
    Applied,
    /// Skipped, the ledger already records this migration with the same checksum
    AlreadyApplied,
}

/// Run one statement on a connection
///
/// DDL without parameters goes through `execute_batch` since ALTER TABLE may
/// render several `;`-separated statements.
pub(crate) fn run_statement(
    conn: &dyn SqlConnection,
    statement: &Statement,
    ddl: bool,
) -> std::result::Result<usize, DriverError> {
    if ddl && statement.params.is_empty() {
        conn.execute_batch(&statement.sql)?;
        Ok(0)
    } else {
        conn.execute(&statement.sql, &statement.params)
    }
}

pub struct QueryExecutor<'a> {
    config: &'a DatabaseConfiguration,
    translator: DialectTranslator,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(config: &'a DatabaseConfiguration, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            config,
            translator: DialectTranslator::new(config),
            sink,
        }
    }

    pub fn translator(&self) -> &DialectTranslator {
        &self.translator
    }

    fn fail(&self, err: SchemaError) -> SchemaError {
        self.sink.error(&err.to_string());
        err
    }

    fn render(&self, schema: &Schema, operation: OperationKind) -> Result<Statement> {
        let statement = self
            .translator
            .render(schema, operation)
            .map_err(|e| self.fail(e))?;
        self.sink.debug(&format!(
            "{} on '{}': {}",
            self.translator.dialect().name(),
            schema.table(),
            statement.sql
        ));
        Ok(statement)
    }

    fn query(&self, conn: &dyn SqlConnection, statement: &Statement) -> Result<Vec<Row>> {
        conn.query(&statement.sql, &statement.params)
            .map_err(|e| self.fail(SchemaError::sql(&statement.sql, e)))
    }

    /// Run a DDL or DML statement
    ///
    /// With a migration name attached, the statement runs at most once per
    /// name and checksum; see [`MigrationTracker::apply`].
    pub fn execute(&self, schema: Schema, conn: &dyn SqlConnection) -> Result<ExecuteOutcome> {
        let operation = schema.operation();
        if matches!(operation, OperationKind::Select | OperationKind::SelectCount) {
            return Err(self.fail(SchemaError::validation(format!(
                "select on table '{}' must run through execute_select or execute_select_count",
                schema.table()
            ))));
        }

        let statement = self.render(&schema, operation)?;

        match schema.migration() {
            Some(name) => {
                let tracker = MigrationTracker::new(self.config, self.sink);
                match tracker.apply(conn, name, &statement, operation.is_ddl())? {
                    MigrationOutcome::Applied => Ok(ExecuteOutcome::Applied),
                    MigrationOutcome::AlreadyApplied => Ok(ExecuteOutcome::AlreadyApplied),
                }
            }
            None => {
                let rows_affected = run_statement(conn, &statement, operation.is_ddl())
                    .map_err(|e| self.fail(SchemaError::sql(&statement.sql, e)))?;
                self.sink.debug(&format!(
                    "'{}': {} rows affected",
                    schema.table(),
                    rows_affected
                ));
                Ok(ExecuteOutcome::Executed { rows_affected })
            }
        }
    }

    /// Rows matching the schema's filters
    pub fn execute_select(&self, schema: Schema, conn: &dyn SqlConnection) -> Result<Vec<Row>> {
        if schema.operation() != OperationKind::Select {
            return Err(self.fail(SchemaError::validation(format!(
                "execute_select needs a select builder, table '{}' was built for {:?}",
                schema.table(),
                schema.operation()
            ))));
        }
        let statement = self.render(&schema, OperationKind::Select)?;
        self.query(conn, &statement)
    }

    /// Number of rows `execute_select` would return for the same schema
    pub fn execute_select_count(&self, schema: Schema, conn: &dyn SqlConnection) -> Result<u64> {
        if schema.operation() != OperationKind::Select {
            return Err(self.fail(SchemaError::validation(format!(
                "execute_select_count needs a select builder, table '{}' was built for {:?}",
                schema.table(),
                schema.operation()
            ))));
        }
        let statement = self.render(&schema, OperationKind::SelectCount)?;
        let rows = self.query(conn, &statement)?;

        let value = rows.first().and_then(|row| row.iter().next().map(|(_, v)| v));
        match value {
            Some(SqlValue::Integer(n)) if *n >= 0 => Ok(*n as u64),
            other => Err(self.fail(SchemaError::mapping(format!(
                "count on table '{}' returned {:?}",
                schema.table(),
                other
            )))),
        }
    }

    /// Rows matching the schema's filters, decoded as `T`
    ///
    /// Fails as a whole if any row does not decode.
    pub fn execute_select_as<T: 'static>(
        &self,
        mapper: &ResultMapper,
        schema: Schema,
        conn: &dyn SqlConnection,
    ) -> Result<Vec<T>> {
        let rows = self.execute_select(schema, conn)?;
        mapper.decode_all::<T>(&rows).map_err(|e| self.fail(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::DatabaseConn;
    use crate::database::schema::{Location, SchemaBuilder};
    use crate::diagnostics::{DiagnosticLevel, MemorySink};

    #[derive(Debug, PartialEq)]
    struct Home {
        name: String,
        location: Location,
    }

    fn setup() -> (DatabaseConn, DatabaseConfiguration, MemorySink) {
        let config = DatabaseConfiguration::in_memory("ess_");
        let conn = DatabaseConn::from_config(&config).unwrap();
        let sink = MemorySink::new();

        SchemaBuilder::create("players", |table| {
            table.uuid("id").primary();
            table.string("name", 16);
            table.decimal("balance").default_value(0);
            table.timestamps();
        })
        .execute(&conn, &config, &sink)
        .unwrap();

        for (name, balance) in [("Steve", 10.0), ("Alex", 25.5), ("Herobrine", 0.0)] {
            SchemaBuilder::insert("players", |row| {
                row.uuid_value("id", uuid::Uuid::new_v4());
                row.string_value("name", name);
                row.decimal_value("balance", balance);
            })
            .execute(&conn, &config, &sink)
            .unwrap();
        }

        (conn, config, sink)
    }

    #[test]
    fn test_create_and_insert() {
        let (conn, _config, _sink) = setup();
        assert!(conn.table_exists("ess_players").unwrap());
        assert_eq!(
            conn.table_columns("ess_players").unwrap(),
            vec!["id", "name", "balance", "created_at", "updated_at"]
        );
    }

    #[test]
    fn test_count_matches_select() {
        let (conn, config, sink) = setup();

        let filters = |query: &mut SchemaBuilder| {
            query.where_op("balance", ">", 5);
        };
        let rows = SchemaBuilder::select("players", filters)
            .execute_select(&conn, &config, &sink)
            .unwrap();
        let count = SchemaBuilder::select("players", filters)
            .execute_select_count(&conn, &config, &sink)
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(count, rows.len() as u64);

        let none = SchemaBuilder::select("players", |query| {
            query.where_eq("name", "Notch");
        })
        .execute_select_count(&conn, &config, &sink)
        .unwrap();
        assert_eq!(none, 0);
    }

    #[test]
    fn test_update_and_delete_report_rows() {
        let (conn, config, sink) = setup();

        let updated = SchemaBuilder::update("players", |row| {
            row.decimal_value("balance", 100.0);
            row.where_eq("name", "Steve");
        })
        .execute(&conn, &config, &sink)
        .unwrap();
        assert_eq!(updated, ExecuteOutcome::Executed { rows_affected: 1 });

        let deleted = SchemaBuilder::delete("players", |row| {
            row.where_op("balance", "<", 50);
        })
        .execute(&conn, &config, &sink)
        .unwrap();
        assert_eq!(deleted, ExecuteOutcome::Executed { rows_affected: 2 });
    }

    #[test]
    fn test_sql_failure_is_logged_and_returned() {
        let config = DatabaseConfiguration::in_memory("");
        let conn = DatabaseConn::from_config(&config).unwrap();
        let sink = MemorySink::new();

        let err = SchemaBuilder::select("missing", |_| {})
            .execute_select(&conn, &config, &sink)
            .unwrap_err();
        assert!(matches!(err, SchemaError::SqlExecution { .. }));
        assert_eq!(sink.messages_at(DiagnosticLevel::Error).len(), 1);
    }

    #[test]
    fn test_validation_error_never_touches_connection() {
        let config = DatabaseConfiguration::in_memory("");
        let conn = DatabaseConn::from_config(&config).unwrap();
        let sink = MemorySink::new();

        let err = SchemaBuilder::create("players", |table| {
            table.primary();
            table.uuid("id");
        })
        .execute(&conn, &config, &sink)
        .unwrap_err();
        assert!(matches!(err, SchemaError::Validation(_)));
        assert!(!conn.table_exists("players").unwrap());

        let errors = sink.messages_at(DiagnosticLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("primary()"));
    }

    #[test]
    fn test_alter_populated_table_with_timestamps() {
        let (conn, config, sink) = setup();
        SchemaBuilder::create("kits", |table| {
            table.string("name", 32).primary();
        })
        .execute(&conn, &config, &sink)
        .unwrap();
        SchemaBuilder::insert("kits", |row| {
            row.string_value("name", "starter");
        })
        .execute(&conn, &config, &sink)
        .unwrap();

        let err = SchemaBuilder::alter("kits", |table| {
            table.timestamps();
        })
        .execute(&conn, &config, &sink)
        .unwrap_err();
        assert!(matches!(err, SchemaError::Validation(_)));
        assert_eq!(conn.table_columns("ess_kits").unwrap(), vec!["name"]);

        let added = SchemaBuilder::alter("kits", |table| {
            table.integer("uses").default_value(0);
        })
        .execute(&conn, &config, &sink)
        .unwrap();
        assert_eq!(added, ExecuteOutcome::Executed { rows_affected: 0 });
        assert_eq!(conn.table_columns("ess_kits").unwrap(), vec!["name", "uses"]);
    }

    #[test]
    fn test_typed_select_with_location() {
        let config = DatabaseConfiguration::in_memory("");
        let conn = DatabaseConn::from_config(&config).unwrap();
        let sink = MemorySink::new();

        SchemaBuilder::create("homes", |table| {
            table.string("name", 32).primary();
            table.location("location");
        })
        .execute(&conn, &config, &sink)
        .unwrap();

        let spawn = Location::new("world", 0.5, 64.0, -12.25, 180.0, -10.0);
        SchemaBuilder::insert("homes", |row| {
            row.string_value("name", "spawn");
            row.location_value("location", &spawn);
        })
        .execute(&conn, &config, &sink)
        .unwrap();

        let mut mapper = ResultMapper::new();
        mapper.register(|row: &Row| {
            Ok(Home {
                name: row.get_string("name")?,
                location: row.get_location("location")?,
            })
        });

        let homes: Vec<Home> = SchemaBuilder::select("homes", |query| {
            query.where_eq("name", "spawn");
        })
        .execute_select_as(&mapper, &conn, &config, &sink)
        .unwrap();
        assert_eq!(
            homes,
            vec![Home {
                name: "spawn".to_string(),
                location: spawn,
            }]
        );
    }

    #[test]
    fn test_typed_select_fails_as_a_whole() {
        let (conn, config, sink) = setup();

        let mut mapper = ResultMapper::new();
        mapper.register(|row: &Row| row.get_i64("name"));

        let err = SchemaBuilder::select("players", |_| {})
            .execute_select_as::<i64>(&mapper, &conn, &config, &sink)
            .unwrap_err();
        assert!(matches!(err, SchemaError::Mapping(_)));
    }

    #[test]
    fn test_select_through_execute_is_rejected() {
        let (conn, config, sink) = setup();
        let err = SchemaBuilder::select("players", |_| {})
            .execute(&conn, &config, &sink)
            .unwrap_err();
        assert!(matches!(err, SchemaError::Validation(_)));
    }
}

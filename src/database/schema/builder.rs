//! Fluent table builder
//!
//! A [`SchemaBuilder`] accumulates columns, constraints and filters through
//! `&mut self` calls and is consumed by exactly one terminal call. No SQL is
//! produced while the chain runs.
//!
//! ```rust,ignore
//! use schemaforge::{DatabaseConfiguration, DatabaseConn, SchemaBuilder, TracingSink};
//!
//! let config = DatabaseConfiguration::in_memory("zessentials_");
//! let conn = DatabaseConn::from_config(&config)?;
//!
//! SchemaBuilder::create("players", |table| {
//!     table.uuid("id").primary();
//!     table.string("name", 16);
//!     table.timestamps();
//!     table.migration("create_players_table");
//! })
//! .execute(&conn, &config, &TracingSink)?;
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::column::{
    ColumnKind, ColumnSpec, ColumnValue, ConstraintSpec, Location, WhereSpec,
    DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE, DEFAULT_STRING_LENGTH,
};
use crate::config::DatabaseConfiguration;
use crate::database::core::{Row, SqlConnection, SqlValue};
use crate::database::executor::{ExecuteOutcome, QueryExecutor};
use crate::database::mapper::ResultMapper;
use crate::diagnostics::DiagnosticSink;
use crate::error::{Result, SchemaError};

/// Statement a schema is rendered into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    CreateTable,
    AlterTable,
    Select,
    SelectCount,
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    /// Schema-changing statements, executed without bound parameters
    pub fn is_ddl(&self) -> bool {
        matches!(self, OperationKind::CreateTable | OperationKind::AlterTable)
    }
}

/// A fully built table description, ready for translation
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    operation: OperationKind,
    table: String,
    columns: Vec<ColumnSpec>,
    constraints: Vec<ConstraintSpec>,
    filters: Vec<WhereSpec>,
    migration: Option<String>,
}

impl Schema {
    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Table name without the configured prefix
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn constraints(&self) -> &[ConstraintSpec] {
        &self.constraints
    }

    pub fn filters(&self) -> &[WhereSpec] {
        &self.filters
    }

    /// Name of the migration this statement belongs to, if any
    pub fn migration(&self) -> Option<&str> {
        self.migration.as_deref()
    }
}

/// Mutable accumulator behind every table definition and query
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    /// Start an empty builder for `operation` on `table`
    pub fn new(operation: OperationKind, table: &str) -> Self {
        Self {
            schema: Schema {
                operation,
                table: table.to_string(),
                columns: Vec::new(),
                constraints: Vec::new(),
                filters: Vec::new(),
                migration: None,
            },
            error: None,
        }
    }

    fn with(operation: OperationKind, table: &str, f: impl FnOnce(&mut SchemaBuilder)) -> Self {
        let mut builder = Self::new(operation, table);
        f(&mut builder);
        builder
    }

    pub fn create(table: &str, f: impl FnOnce(&mut SchemaBuilder)) -> Self {
        Self::with(OperationKind::CreateTable, table, f)
    }

    pub fn alter(table: &str, f: impl FnOnce(&mut SchemaBuilder)) -> Self {
        Self::with(OperationKind::AlterTable, table, f)
    }

    pub fn insert(table: &str, f: impl FnOnce(&mut SchemaBuilder)) -> Self {
        Self::with(OperationKind::Insert, table, f)
    }

    pub fn update(table: &str, f: impl FnOnce(&mut SchemaBuilder)) -> Self {
        Self::with(OperationKind::Update, table, f)
    }

    pub fn delete(table: &str, f: impl FnOnce(&mut SchemaBuilder)) -> Self {
        Self::with(OperationKind::Delete, table, f)
    }

    pub fn select(table: &str, f: impl FnOnce(&mut SchemaBuilder)) -> Self {
        Self::with(OperationKind::Select, table, f)
    }

    // =========================================================================
    // Column declarations
    // =========================================================================

    fn push_column(&mut self, name: &str, kind: ColumnKind, value: Option<ColumnValue>) -> &mut Self {
        let mut column = ColumnSpec::new(name, kind);
        column.value = value;
        self.schema.columns.push(column);
        self
    }

    fn push_scalar(&mut self, name: &str, kind: ColumnKind, value: SqlValue) -> &mut Self {
        self.push_column(name, kind, Some(ColumnValue::Scalar(value)))
    }

    pub fn uuid(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::Uuid, None)
    }

    pub fn uuid_value(&mut self, name: &str, value: Uuid) -> &mut Self {
        self.push_scalar(name, ColumnKind::Uuid, value.into())
    }

    pub fn string(&mut self, name: &str, length: u32) -> &mut Self {
        self.push_column(name, ColumnKind::String(length), None)
    }

    pub fn string_value(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.push_scalar(
            name,
            ColumnKind::String(DEFAULT_STRING_LENGTH),
            SqlValue::Text(value.into()),
        )
    }

    pub fn text(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::Text, None)
    }

    pub fn text_value(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.push_scalar(name, ColumnKind::Text, SqlValue::Text(value.into()))
    }

    pub fn long_text(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::LongText, None)
    }

    /// Decimal column with the default precision and scale (65, 30)
    pub fn decimal(&mut self, name: &str) -> &mut Self {
        self.decimal_with(name, DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE)
    }

    pub fn decimal_with(&mut self, name: &str, precision: u32, scale: u32) -> &mut Self {
        self.push_column(name, ColumnKind::Decimal { precision, scale }, None)
    }

    pub fn decimal_value(&mut self, name: &str, value: f64) -> &mut Self {
        self.push_scalar(
            name,
            ColumnKind::Decimal {
                precision: DEFAULT_DECIMAL_PRECISION,
                scale: DEFAULT_DECIMAL_SCALE,
            },
            SqlValue::Real(value),
        )
    }

    pub fn big_int(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::BigInt, None)
    }

    pub fn big_int_value(&mut self, name: &str, value: i64) -> &mut Self {
        self.push_scalar(name, ColumnKind::BigInt, SqlValue::Integer(value))
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::Integer, None)
    }

    pub fn integer_value(&mut self, name: &str, value: i64) -> &mut Self {
        self.push_scalar(name, ColumnKind::Integer, SqlValue::Integer(value))
    }

    pub fn bool(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::Boolean, None)
    }

    pub fn bool_value(&mut self, name: &str, value: bool) -> &mut Self {
        self.push_scalar(name, ColumnKind::Boolean, SqlValue::Bool(value))
    }

    pub fn date(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::Date, None)
    }

    pub fn date_value(&mut self, name: &str, value: NaiveDate) -> &mut Self {
        self.push_scalar(name, ColumnKind::Date, value.into())
    }

    pub fn timestamp(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::Timestamp, None)
    }

    pub fn timestamp_value(&mut self, name: &str, value: DateTime<Utc>) -> &mut Self {
        self.push_scalar(name, ColumnKind::Timestamp, value.into())
    }

    /// Location group, expanded into six columns when rendered
    pub fn location(&mut self, name: &str) -> &mut Self {
        self.push_column(name, ColumnKind::Location, None)
    }

    pub fn location_value(&mut self, name: &str, value: &Location) -> &mut Self {
        self.push_column(
            name,
            ColumnKind::Location,
            Some(ColumnValue::Location(value.clone())),
        )
    }

    /// BIGINT auto-increment column acting as the table's primary key
    pub fn auto_increment(&mut self, name: &str) -> &mut Self {
        let mut column = ColumnSpec::new(name, ColumnKind::BigInt);
        column.auto_increment = true;
        self.schema.columns.push(column);
        self.schema
            .constraints
            .push(ConstraintSpec::PrimaryKey(vec![name.to_string()]));
        self
    }

    // =========================================================================
    // Modifiers
    // =========================================================================

    fn record_error(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(SchemaError::Validation(message));
        }
    }

    fn last_column_mut(&mut self, modifier: &str) -> Option<&mut ColumnSpec> {
        if self.schema.columns.is_empty() {
            self.record_error(format!(
                "{}() on table '{}' requires a preceding column declaration",
                modifier, self.schema.table
            ));
            return None;
        }
        self.schema.columns.last_mut()
    }

    /// Allow NULL in the most recent column
    pub fn nullable(&mut self) -> &mut Self {
        if let Some(column) = self.last_column_mut("nullable") {
            column.nullable = true;
        }
        self
    }

    /// Default value of the most recent column
    pub fn default_value(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        let value = value.into();
        if let Some(column) = self.last_column_mut("default_value") {
            column.default = Some(value);
        }
        self
    }

    // =========================================================================
    // Structural declarations
    // =========================================================================

    /// Add the most recent column to the primary key
    pub fn primary(&mut self) -> &mut Self {
        let Some(name) = self.last_column_mut("primary").map(|c| c.name.clone()) else {
            return self;
        };
        self.schema
            .constraints
            .push(ConstraintSpec::PrimaryKey(vec![name]));
        self
    }

    /// Primary key over explicit columns
    pub fn primary_key(&mut self, columns: &[&str]) -> &mut Self {
        self.schema.constraints.push(ConstraintSpec::PrimaryKey(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Foreign key from the most recent column to the same-named column of `reference_table`
    pub fn foreign_key(&mut self, reference_table: &str) -> &mut Self {
        let Some(name) = self.last_column_mut("foreign_key").map(|c| c.name.clone()) else {
            return self;
        };
        self.foreign_key_with(reference_table, &name, false)
    }

    /// Foreign key from the most recent column to `reference_table(reference_column)`
    pub fn foreign_key_with(
        &mut self,
        reference_table: &str,
        reference_column: &str,
        on_cascade: bool,
    ) -> &mut Self {
        let Some(column) = self.last_column_mut("foreign_key").map(|c| c.name.clone()) else {
            return self;
        };
        self.schema.constraints.push(ConstraintSpec::ForeignKey {
            column,
            reference_table: reference_table.to_string(),
            reference_column: reference_column.to_string(),
            on_cascade,
        });
        self
    }

    /// `created_at` and `updated_at` columns defaulting to the current time
    pub fn timestamps(&mut self) -> &mut Self {
        self.schema.constraints.push(ConstraintSpec::Timestamps);
        self
    }

    pub fn created_at(&mut self) -> &mut Self {
        self.schema.constraints.push(ConstraintSpec::CreatedAt);
        self
    }

    pub fn updated_at(&mut self) -> &mut Self {
        self.schema.constraints.push(ConstraintSpec::UpdatedAt);
        self
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// `column = value`
    pub fn where_eq(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.where_op(column, "=", value)
    }

    /// `column <operator> value`
    pub fn where_op(&mut self, column: &str, operator: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.schema
            .filters
            .push(WhereSpec::new(column, operator, value.into()));
        self
    }

    /// Run this statement as the named migration
    ///
    /// The ledger checksum covers the rendered SQL and every bound value. A data
    /// migration must bind the same values on each run: one built from
    /// `Utc::now()` or `Uuid::new_v4()` is reported as a `MigrationConflict` on the
    /// next start. Fix such values up front, or leave the statement unnamed.
    pub fn migration(&mut self, name: &str) -> &mut Self {
        self.schema.migration = Some(name.to_string());
        self
    }

    /// Finish the chain, surfacing the first misuse recorded along the way
    pub fn build(self) -> Result<Schema> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.schema),
        }
    }

    // =========================================================================
    // Terminal calls
    // =========================================================================

    fn build_reported(self, sink: &dyn DiagnosticSink) -> Result<Schema> {
        self.build().map_err(|e| {
            sink.error(&e.to_string());
            e
        })
    }

    /// Run the statement (DDL or DML), going through the migration ledger when named
    pub fn execute(
        self,
        conn: &dyn SqlConnection,
        config: &DatabaseConfiguration,
        sink: &dyn DiagnosticSink,
    ) -> Result<ExecuteOutcome> {
        QueryExecutor::new(config, sink).execute(self.build_reported(sink)?, conn)
    }

    /// Rows matching the filters, as generic column-name to value mappings
    pub fn execute_select(
        self,
        conn: &dyn SqlConnection,
        config: &DatabaseConfiguration,
        sink: &dyn DiagnosticSink,
    ) -> Result<Vec<Row>> {
        QueryExecutor::new(config, sink).execute_select(self.build_reported(sink)?, conn)
    }

    /// Number of rows matching the filters
    pub fn execute_select_count(
        self,
        conn: &dyn SqlConnection,
        config: &DatabaseConfiguration,
        sink: &dyn DiagnosticSink,
    ) -> Result<u64> {
        QueryExecutor::new(config, sink).execute_select_count(self.build_reported(sink)?, conn)
    }

    /// Rows matching the filters, decoded through the decoder registered for `T`
    pub fn execute_select_as<T: 'static>(
        self,
        mapper: &ResultMapper,
        conn: &dyn SqlConnection,
        config: &DatabaseConfiguration,
        sink: &dyn DiagnosticSink,
    ) -> Result<Vec<T>> {
        QueryExecutor::new(config, sink).execute_select_as(mapper, self.build_reported(sink)?, conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_accumulates_in_order() {
        let schema = SchemaBuilder::create("players", |table| {
            table.uuid("id").primary();
            table.string("name", 16);
            table.decimal("balance").default_value(0);
            table.timestamps();
        })
        .build()
        .unwrap();

        assert_eq!(schema.operation(), OperationKind::CreateTable);
        assert_eq!(schema.table(), "players");
        let names: Vec<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "balance"]);
        assert_eq!(schema.columns()[2].default, Some(SqlValue::Integer(0)));
        assert_eq!(
            schema.columns()[2].kind,
            ColumnKind::Decimal {
                precision: 65,
                scale: 30
            }
        );
        assert_eq!(
            schema.constraints(),
            &[
                ConstraintSpec::PrimaryKey(vec!["id".to_string()]),
                ConstraintSpec::Timestamps
            ]
        );
    }

    #[test]
    fn test_modifier_before_column_is_rejected() {
        let result = SchemaBuilder::create("players", |table| {
            table.nullable();
            table.uuid("id");
        })
        .build();

        match result {
            Err(SchemaError::Validation(message)) => assert!(message.contains("nullable")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_first_error_wins() {
        let result = SchemaBuilder::create("players", |table| {
            table.default_value("x");
            table.primary();
        })
        .build();

        match result {
            Err(SchemaError::Validation(message)) => assert!(message.contains("default_value")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_modifiers_touch_only_latest_column() {
        let schema = SchemaBuilder::create("homes", |table| {
            table.uuid("owner");
            table.string("name", 32).nullable();
        })
        .build()
        .unwrap();

        assert!(!schema.columns()[0].nullable);
        assert!(schema.columns()[1].nullable);
    }

    #[test]
    fn test_foreign_key_defaults_to_same_column() {
        let schema = SchemaBuilder::create("homes", |table| {
            table.uuid("player_id").foreign_key("players");
            table.uuid("owner_id").foreign_key_with("players", "id", true);
        })
        .build()
        .unwrap();

        assert_eq!(
            schema.constraints()[0],
            ConstraintSpec::ForeignKey {
                column: "player_id".to_string(),
                reference_table: "players".to_string(),
                reference_column: "player_id".to_string(),
                on_cascade: false,
            }
        );
        assert_eq!(
            schema.constraints()[1],
            ConstraintSpec::ForeignKey {
                column: "owner_id".to_string(),
                reference_table: "players".to_string(),
                reference_column: "id".to_string(),
                on_cascade: true,
            }
        );
    }

    #[test]
    fn test_filters_keep_declaration_order() {
        let schema = SchemaBuilder::select("players", |query| {
            query.where_eq("name", "Steve");
            query.where_op("balance", ">=", 10);
            query.where_eq("banned", SqlValue::Null);
        })
        .build()
        .unwrap();

        let columns: Vec<&str> = schema.filters().iter().map(|w| w.column.as_str()).collect();
        assert_eq!(columns, vec!["name", "balance", "banned"]);
        assert_eq!(schema.filters()[1].operator, ">=");
    }

    #[test]
    fn test_auto_increment_declares_primary_column() {
        let schema = SchemaBuilder::create("sanctions", |table| {
            table.auto_increment("id");
            table.uuid("player_id");
        })
        .build()
        .unwrap();

        assert!(schema.columns()[0].auto_increment);
        assert_eq!(schema.columns()[0].kind, ColumnKind::BigInt);
        assert_eq!(
            schema.constraints(),
            &[ConstraintSpec::PrimaryKey(vec!["id".to_string()])]
        );
    }

    #[test]
    fn test_value_overloads_attach_values() {
        let id = Uuid::new_v4();
        let schema = SchemaBuilder::insert("players", |row| {
            row.uuid_value("id", id);
            row.string_value("name", "Alex");
            row.bool_value("online", true);
        })
        .build()
        .unwrap();

        assert_eq!(
            schema.columns()[0].value,
            Some(ColumnValue::Scalar(SqlValue::from(id)))
        );
        assert_eq!(schema.columns()[1].kind, ColumnKind::String(255));
        assert_eq!(
            schema.columns()[2].value,
            Some(ColumnValue::Scalar(SqlValue::Bool(true)))
        );
    }

    #[test]
    fn test_migration_name_attached() {
        let schema = SchemaBuilder::create("players", |table| {
            table.uuid("id");
            table.migration("create_players");
        })
        .build()
        .unwrap();
        assert_eq!(schema.migration(), Some("create_players"));
    }
}

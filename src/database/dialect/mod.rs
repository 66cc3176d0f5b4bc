//! SQL dialects and schema translation
//!
//! A [`Dialect`] captures the syntax differences between database engines
//! (identifier quoting, placeholders, native column types). The
//! [`DialectTranslator`] walks a built [`Schema`] and renders it through a
//! dialect into a [`Statement`]: SQL text plus its bound parameters, in order.
//!
//! # Rendering rules
//!
//! - Tables are created with `CREATE TABLE IF NOT EXISTS`.
//! - Column definitions come first, in declaration order, followed by the
//!   `created_at`/`updated_at` columns, one merged `PRIMARY KEY` clause and the
//!   foreign keys.
//! - Filter values are always bound parameters; DDL never carries parameters,
//!   so column defaults are rendered as escaped literals.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfiguration;
use crate::database::core::SqlValue;
use crate::database::schema::{
    ColumnKind, ColumnSpec, ConstraintSpec, OperationKind, Schema, WhereSpec,
};
use crate::error::{Result, SchemaError};

/// Name of the column added by `created_at()` and `timestamps()`
pub const CREATED_AT_COLUMN: &str = "created_at";

/// Name of the column added by `updated_at()` and `timestamps()`
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Comparison operators accepted in filters
const ALLOWED_OPERATORS: &[&str] = &[
    "=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "IS", "IS NOT",
];

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Sqlite,
    Mysql,
    Postgres,
}

impl FromStr for DialectKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            "mysql" | "mariadb" => Ok(DialectKind::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            other => Err(anyhow::anyhow!(
                "Unknown dialect '{}': expected sqlite, mysql, mariadb or postgres",
                other
            )),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialectKind::Sqlite => "sqlite",
            DialectKind::Mysql => "mysql",
            DialectKind::Postgres => "postgres",
        };
        write!(f, "{}", name)
    }
}

impl DialectKind {
    /// The dialect implementation for this engine
    pub fn dialect(&self) -> Box<dyn Dialect> {
        match self {
            DialectKind::Sqlite => Box::new(SqliteDialect::new()),
            DialectKind::Mysql => Box::new(MysqlDialect::new()),
            DialectKind::Postgres => Box::new(PostgresDialect::new()),
        }
    }
}

/// SQL syntax strategy for one database engine
pub trait Dialect: Send + Sync {
    fn name(&self) -> &str;

    /// Quote an identifier, doubling any embedded quote character
    fn quote_ident(&self, name: &str) -> String;

    /// Placeholder for the `index`-th bound parameter (1-based)
    fn param_placeholder(&self, index: usize) -> String;

    /// Native types of a column kind, one per expanded column
    ///
    /// Every kind maps to exactly one type except `Location`, which maps to
    /// six types in `LOCATION_SUFFIXES` order.
    fn column_types(&self, kind: ColumnKind) -> Vec<String>;

    /// Full type and modifiers of an auto-increment column
    fn auto_increment_definition(&self) -> &'static str;

    /// Whether the auto-increment definition already declares the primary key
    fn auto_increment_is_primary_key(&self) -> bool {
        false
    }

    /// Default clause of the `updated_at` column
    fn updated_at_default(&self) -> &'static str {
        "DEFAULT CURRENT_TIMESTAMP"
    }

    /// Keyword sequence used by ALTER TABLE to add a column
    fn add_column_clause(&self) -> &'static str {
        "ADD COLUMN"
    }

    /// Whether ALTER TABLE can add primary and foreign keys
    fn supports_alter_constraints(&self) -> bool {
        true
    }

    /// Whether ALTER TABLE can add a column defaulting to `CURRENT_TIMESTAMP`
    fn supports_alter_timestamp_default(&self) -> bool {
        true
    }
}

/// Location component types shared by the dialects
pub(crate) fn location_types(world: &str, coordinate: &str, angle: &str) -> Vec<String> {
    vec![
        world.to_string(),
        coordinate.to_string(),
        coordinate.to_string(),
        coordinate.to_string(),
        angle.to_string(),
        angle.to_string(),
    ]
}

/// Rendered SQL text and its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String, params: Vec<SqlValue>) -> Self {
        Self { sql, params }
    }
}

/// Renders schemas into dialect-correct SQL
pub struct DialectTranslator {
    dialect: Box<dyn Dialect>,
    table_prefix: String,
    quote_identifiers: bool,
}

impl DialectTranslator {
    pub fn new(config: &DatabaseConfiguration) -> Self {
        Self {
            dialect: config.dialect.dialect(),
            table_prefix: config.table_prefix.clone(),
            quote_identifiers: config.quote_identifiers,
        }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Table name with the configured prefix, unquoted
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix, table)
    }

    /// Render `schema` as the given operation
    pub fn render(&self, schema: &Schema, operation: OperationKind) -> Result<Statement> {
        if schema.table().is_empty() {
            return Err(SchemaError::validation("table name must not be empty"));
        }

        match operation {
            OperationKind::CreateTable => self.render_create(schema),
            OperationKind::AlterTable => self.render_alter(schema),
            OperationKind::Select => self.render_select(schema, "*"),
            OperationKind::SelectCount => self.render_select(schema, "COUNT(*)"),
            OperationKind::Insert => self.render_insert(schema),
            OperationKind::Update => self.render_update(schema),
            OperationKind::Delete => self.render_delete(schema),
        }
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    fn ident(&self, name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(SchemaError::validation("identifier must not be empty"));
        }
        if self.quote_identifiers {
            return Ok(self.dialect.quote_ident(name));
        }

        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(name.to_string())
        } else {
            Err(SchemaError::validation(format!(
                "identifier '{}' must be quoted; enable quote_identifiers",
                name
            )))
        }
    }

    fn table_ident(&self, table: &str) -> Result<String> {
        self.ident(&self.table_name(table))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validate_definition(&self, schema: &Schema) -> Result<()> {
        let auto_increment_count = schema
            .columns()
            .iter()
            .filter(|c| c.auto_increment)
            .count();
        if auto_increment_count > 1 {
            return Err(SchemaError::validation(format!(
                "table '{}' declares {} auto-increment columns, at most one is allowed",
                schema.table(),
                auto_increment_count
            )));
        }

        let mut names: Vec<String> = Vec::new();
        for column in schema.columns() {
            if column.kind == ColumnKind::Location && column.default.is_some() {
                return Err(SchemaError::validation(format!(
                    "location column '{}' cannot carry a default value",
                    column.name
                )));
            }
            names.extend(column.expanded_names());
        }
        names.extend(timestamp_columns(schema).iter().map(|c| c.to_string()));

        for (idx, name) in names.iter().enumerate() {
            if names[..idx].contains(name) {
                return Err(SchemaError::validation(format!(
                    "column '{}' is declared more than once in table '{}'",
                    name,
                    schema.table()
                )));
            }
        }

        for constraint in schema.constraints() {
            match constraint {
                ConstraintSpec::PrimaryKey(columns) => {
                    for column in columns {
                        self.require_scalar_column(schema, column, "primary key")?;
                    }
                }
                ConstraintSpec::ForeignKey { column, .. } => {
                    self.require_scalar_column(schema, column, "foreign key")?;
                }
                ConstraintSpec::Timestamps
                | ConstraintSpec::CreatedAt
                | ConstraintSpec::UpdatedAt => {}
            }
        }

        Ok(())
    }

    fn require_scalar_column(&self, schema: &Schema, name: &str, role: &str) -> Result<()> {
        match schema.columns().iter().find(|c| c.name == name) {
            Some(column) if column.kind == ColumnKind::Location => Err(SchemaError::validation(
                format!("location column '{}' cannot be part of a {}", name, role),
            )),
            Some(_) => Ok(()),
            None => Err(SchemaError::validation(format!(
                "{} references column '{}', which table '{}' does not declare",
                role,
                name,
                schema.table()
            ))),
        }
    }

    // =========================================================================
    // DDL
    // =========================================================================

    fn column_definitions(&self, column: &ColumnSpec) -> Result<Vec<String>> {
        let name = self.ident(&column.name)?;

        if column.auto_increment {
            return Ok(vec![format!(
                "{} {}",
                name,
                self.dialect.auto_increment_definition()
            )]);
        }

        let types = self.dialect.column_types(column.kind);
        let names = column.expanded_names();

        let mut definitions = Vec::with_capacity(names.len());
        for (column_name, column_type) in names.iter().zip(types) {
            let mut definition = format!("{} {}", self.ident(column_name)?, column_type);
            if !column.nullable {
                definition.push_str(" NOT NULL");
            }
            if let Some(default) = &column.default {
                definition.push_str(" DEFAULT ");
                definition.push_str(&default.to_sql_literal());
            }
            definitions.push(definition);
        }
        Ok(definitions)
    }

    fn timestamp_definitions(&self, schema: &Schema) -> Result<Vec<String>> {
        timestamp_columns(schema)
            .into_iter()
            .map(|column| {
                let default = if column == UPDATED_AT_COLUMN {
                    self.dialect.updated_at_default()
                } else {
                    "DEFAULT CURRENT_TIMESTAMP"
                };
                Ok(format!("{} TIMESTAMP {}", self.ident(column)?, default))
            })
            .collect()
    }

    /// Primary key columns of every `PrimaryKey` constraint, merged and deduplicated
    fn primary_key_columns(&self, schema: &Schema) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for constraint in schema.constraints() {
            if let ConstraintSpec::PrimaryKey(pk) = constraint {
                for column in pk {
                    if !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
            }
        }
        columns
    }

    fn primary_key_clause(&self, schema: &Schema) -> Result<Option<String>> {
        let mut columns = self.primary_key_columns(schema);

        if self.dialect.auto_increment_is_primary_key() {
            if let Some(auto) = schema.columns().iter().find(|c| c.auto_increment) {
                if columns.len() > 1 || columns.first() != Some(&auto.name) {
                    return Err(SchemaError::validation(format!(
                        "{} requires auto-increment column '{}' to be the only primary key column",
                        self.dialect.name(),
                        auto.name
                    )));
                }
                columns.clear();
            }
        }

        if columns.is_empty() {
            return Ok(None);
        }
        let quoted = columns
            .iter()
            .map(|c| self.ident(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(format!("PRIMARY KEY ({})", quoted.join(", "))))
    }

    fn foreign_key_clauses(&self, schema: &Schema) -> Result<Vec<String>> {
        let mut clauses = Vec::new();
        for constraint in schema.constraints() {
            if let ConstraintSpec::ForeignKey {
                column,
                reference_table,
                reference_column,
                on_cascade,
            } = constraint
            {
                let mut clause = format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.ident(column)?,
                    self.table_ident(reference_table)?,
                    self.ident(reference_column)?
                );
                if *on_cascade {
                    clause.push_str(" ON DELETE CASCADE");
                }
                clauses.push(clause);
            }
        }
        Ok(clauses)
    }

    fn render_create(&self, schema: &Schema) -> Result<Statement> {
        self.validate_definition(schema)?;

        let mut parts = Vec::new();
        for column in schema.columns() {
            parts.extend(self.column_definitions(column)?);
        }
        parts.extend(self.timestamp_definitions(schema)?);

        if parts.is_empty() {
            return Err(SchemaError::validation(format!(
                "table '{}' declares no columns",
                schema.table()
            )));
        }

        if let Some(pk) = self.primary_key_clause(schema)? {
            parts.push(pk);
        }
        parts.extend(self.foreign_key_clauses(schema)?);

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table_ident(schema.table())?,
            parts.join(", ")
        );
        Ok(Statement::new(sql, Vec::new()))
    }

    /// One statement per added column or constraint, joined with `;`
    fn render_alter(&self, schema: &Schema) -> Result<Statement> {
        self.validate_definition(schema)?;

        if let Some(auto) = schema.columns().iter().find(|c| c.auto_increment) {
            return Err(SchemaError::validation(format!(
                "auto-increment column '{}' cannot be added to an existing table",
                auto.name
            )));
        }

        let timestamps = timestamp_columns(schema);
        if !timestamps.is_empty() && !self.dialect.supports_alter_timestamp_default() {
            return Err(SchemaError::validation(format!(
                "{} cannot add {} to existing table '{}': non-constant defaults are rejected",
                self.dialect.name(),
                timestamps.join(" and "),
                schema.table()
            )));
        }

        let table = self.table_ident(schema.table())?;
        let mut definitions = Vec::new();
        for column in schema.columns() {
            definitions.extend(self.column_definitions(column)?);
        }
        definitions.extend(self.timestamp_definitions(schema)?);

        let mut statements: Vec<String> = definitions
            .into_iter()
            .map(|def| {
                format!(
                    "ALTER TABLE {} {} {}",
                    table,
                    self.dialect.add_column_clause(),
                    def
                )
            })
            .collect();

        let mut constraints = Vec::new();
        if let Some(pk) = self.primary_key_clause(schema)? {
            constraints.push(pk);
        }
        constraints.extend(self.foreign_key_clauses(schema)?);

        if !constraints.is_empty() && !self.dialect.supports_alter_constraints() {
            return Err(SchemaError::validation(format!(
                "{} cannot add constraints to existing table '{}'",
                self.dialect.name(),
                schema.table()
            )));
        }
        statements.extend(
            constraints
                .into_iter()
                .map(|c| format!("ALTER TABLE {} ADD {}", table, c)),
        );

        if statements.is_empty() {
            return Err(SchemaError::validation(format!(
                "alter of table '{}' declares nothing to add",
                schema.table()
            )));
        }

        Ok(Statement::new(statements.join(";\n"), Vec::new()))
    }

    // =========================================================================
    // DML
    // =========================================================================

    /// `WHERE` clause for `filters`, pushing each value onto `params` in order
    fn where_clause(&self, filters: &[WhereSpec], params: &mut Vec<SqlValue>) -> Result<String> {
        if filters.is_empty() {
            return Ok(String::new());
        }

        let mut conditions = Vec::with_capacity(filters.len());
        for filter in filters {
            let column = self.ident(&filter.column)?;
            let operator = filter.operator.to_uppercase();
            if !ALLOWED_OPERATORS.contains(&operator.as_str()) {
                return Err(SchemaError::validation(format!(
                    "operator '{}' is not supported in filters",
                    filter.operator
                )));
            }

            let condition = match (operator.as_str(), filter.value.is_null()) {
                ("=" | "IS", true) => format!("{} IS NULL", column),
                ("!=" | "<>" | "IS NOT", true) => format!("{} IS NOT NULL", column),
                (_, true) => {
                    return Err(SchemaError::validation(format!(
                        "operator '{}' cannot compare column '{}' with NULL",
                        filter.operator, filter.column
                    )))
                }
                ("IS" | "IS NOT", false) => {
                    return Err(SchemaError::validation(format!(
                        "operator '{}' on column '{}' only accepts NULL",
                        filter.operator, filter.column
                    )))
                }
                (_, false) => {
                    params.push(filter.value.clone());
                    format!(
                        "{} {} {}",
                        column,
                        operator,
                        self.dialect.param_placeholder(params.len())
                    )
                }
            };
            conditions.push(condition);
        }

        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }

    fn render_select(&self, schema: &Schema, projection: &str) -> Result<Statement> {
        let mut params = Vec::new();
        let where_clause = self.where_clause(schema.filters(), &mut params)?;
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection,
            self.table_ident(schema.table())?,
            where_clause
        );
        Ok(Statement::new(sql, params))
    }

    /// Expanded column names and the values to write into them
    fn assignments(&self, schema: &Schema) -> Result<Vec<(String, SqlValue)>> {
        let mut assignments = Vec::new();
        for column in schema.columns() {
            let values = match (&column.value, &column.default) {
                (Some(_), _) => column.bound_values(),
                (None, Some(default)) if column.kind != ColumnKind::Location => {
                    Some(vec![default.clone()])
                }
                _ => None,
            };
            let values = values.ok_or_else(|| {
                SchemaError::validation(format!(
                    "column '{}' has no value to write into table '{}'",
                    column.name,
                    schema.table()
                ))
            })?;
            for (name, value) in column.expanded_names().into_iter().zip(values) {
                assignments.push((name, value));
            }
        }

        if assignments.is_empty() {
            return Err(SchemaError::validation(format!(
                "no column values to write into table '{}'",
                schema.table()
            )));
        }
        Ok(assignments)
    }

    fn render_insert(&self, schema: &Schema) -> Result<Statement> {
        let assignments = self.assignments(schema)?;

        let mut columns = Vec::with_capacity(assignments.len());
        let mut placeholders = Vec::with_capacity(assignments.len());
        let mut params = Vec::with_capacity(assignments.len());
        for (name, value) in assignments {
            columns.push(self.ident(&name)?);
            params.push(value);
            placeholders.push(self.dialect.param_placeholder(params.len()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_ident(schema.table())?,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(Statement::new(sql, params))
    }

    fn render_update(&self, schema: &Schema) -> Result<Statement> {
        let assignments = self.assignments(schema)?;

        let mut params = Vec::new();
        let mut sets = Vec::with_capacity(assignments.len());
        for (name, value) in assignments {
            params.push(value);
            sets.push(format!(
                "{} = {}",
                self.ident(&name)?,
                self.dialect.param_placeholder(params.len())
            ));
        }
        let where_clause = self.where_clause(schema.filters(), &mut params)?;

        let sql = format!(
            "UPDATE {} SET {}{}",
            self.table_ident(schema.table())?,
            sets.join(", "),
            where_clause
        );
        Ok(Statement::new(sql, params))
    }

    fn render_delete(&self, schema: &Schema) -> Result<Statement> {
        let mut params = Vec::new();
        let where_clause = self.where_clause(schema.filters(), &mut params)?;
        let sql = format!(
            "DELETE FROM {}{}",
            self.table_ident(schema.table())?,
            where_clause
        );
        Ok(Statement::new(sql, params))
    }
}

/// Timestamp columns requested by the schema's constraints, in canonical order
fn timestamp_columns(schema: &Schema) -> Vec<&'static str> {
    let mut created = false;
    let mut updated = false;
    for constraint in schema.constraints() {
        match constraint {
            ConstraintSpec::Timestamps => {
                created = true;
                updated = true;
            }
            ConstraintSpec::CreatedAt => created = true,
            ConstraintSpec::UpdatedAt => updated = true,
            ConstraintSpec::PrimaryKey(_) | ConstraintSpec::ForeignKey { .. } => {}
        }
    }

    let mut columns = Vec::new();
    if created {
        columns.push(CREATED_AT_COLUMN);
    }
    if updated {
        columns.push(UPDATED_AT_COLUMN);
    }
    columns
}

//! Error types for schema building, SQL execution and migrations.

use thiserror::Error;

/// Main error type for schemaforge operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Builder used incorrectly, detected before any SQL is generated
    #[error("Validation error: {0}")]
    Validation(String),

    /// The connection reported a failure executing generated SQL
    #[error("SQL execution failed: {message}\n  Statement: {statement}")]
    SqlExecution { statement: String, message: String },

    /// A result row could not be decoded into the requested type
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// A migration name recurs with a different checksum
    #[error("Migration '{name}' was applied with checksum {recorded}, but now renders {current}")]
    MigrationConflict {
        name: String,
        recorded: String,
        current: String,
    },
}

impl SchemaError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        SchemaError::Validation(message.into())
    }

    /// Create an SqlExecution error carrying the rendered statement
    pub fn sql(statement: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SchemaError::SqlExecution {
            statement: statement.into(),
            message: message.to_string(),
        }
    }

    /// Create a Mapping error
    pub fn mapping(message: impl Into<String>) -> Self {
        SchemaError::Mapping(message.into())
    }
}

/// Result type alias for schemaforge operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_error_includes_statement() {
        let err = SchemaError::sql("SELECT * FROM nowhere", "no such table: nowhere");
        let text = err.to_string();
        assert!(text.contains("no such table: nowhere"));
        assert!(text.contains("SELECT * FROM nowhere"));
    }

    #[test]
    fn test_conflict_message() {
        let err = SchemaError::MigrationConflict {
            name: "m1".to_string(),
            recorded: "aaa".to_string(),
            current: "bbb".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 'm1' was applied with checksum aaa, but now renders bbb"
        );
    }
}

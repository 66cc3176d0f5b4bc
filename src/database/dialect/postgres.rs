//! PostgreSQL dialect

use super::{location_types, Dialect};
use crate::database::schema::ColumnKind;

/// PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn column_types(&self, kind: ColumnKind) -> Vec<String> {
        let single = match kind {
            ColumnKind::Uuid => "UUID".to_string(),
            ColumnKind::String(length) => format!("VARCHAR({})", length),
            ColumnKind::Text | ColumnKind::LongText => "TEXT".to_string(),
            ColumnKind::Decimal { precision, scale } => {
                format!("DECIMAL({},{})", precision, scale)
            }
            ColumnKind::BigInt => "BIGINT".to_string(),
            ColumnKind::Integer => "INTEGER".to_string(),
            ColumnKind::Boolean => "BOOLEAN".to_string(),
            ColumnKind::Date => "DATE".to_string(),
            ColumnKind::Timestamp => "TIMESTAMP".to_string(),
            ColumnKind::Location => {
                return location_types("VARCHAR(255)", "DOUBLE PRECISION", "REAL")
            }
        };
        vec![single]
    }

    fn auto_increment_definition(&self) -> &'static str {
        "BIGSERIAL"
    }

    fn add_column_clause(&self) -> &'static str {
        "ADD COLUMN IF NOT EXISTS"
    }
}

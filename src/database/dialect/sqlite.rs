//! SQLite dialect

use super::{location_types, Dialect};
use crate::database::schema::ColumnKind;

/// SQLite dialect
///
/// Column types are declared with their portable names and resolved through
/// SQLite's type affinity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn column_types(&self, kind: ColumnKind) -> Vec<String> {
        let single = match kind {
            ColumnKind::Uuid => "VARCHAR(36)".to_string(),
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
            ColumnKind::Location => return location_types("VARCHAR(255)", "DOUBLE", "FLOAT"),
        };
        vec![single]
    }

    // Only an INTEGER PRIMARY KEY column aliases the rowid
    fn auto_increment_definition(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }

    fn auto_increment_is_primary_key(&self) -> bool {
        true
    }

    fn supports_alter_constraints(&self) -> bool {
        false
    }

    // ADD COLUMN only accepts constant defaults once the table has rows
    fn supports_alter_timestamp_default(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.quote_ident("players"), "\"players\"");
        assert_eq!(dialect.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(dialect.param_placeholder(3), "?");
    }
}

//! MySQL and MariaDB dialect

use super::{location_types, Dialect};
use crate::database::schema::ColumnKind;

/// MySQL dialect, also used for MariaDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn column_types(&self, kind: ColumnKind) -> Vec<String> {
        let single = match kind {
            ColumnKind::Uuid => "VARCHAR(36)".to_string(),
            ColumnKind::String(length) => format!("VARCHAR({})", length),
            ColumnKind::Text => "TEXT".to_string(),
            ColumnKind::LongText => "LONGTEXT".to_string(),
            ColumnKind::Decimal { precision, scale } => {
                format!("DECIMAL({},{})", precision, scale)
            }
            ColumnKind::BigInt => "BIGINT".to_string(),
            ColumnKind::Integer => "INT".to_string(),
            ColumnKind::Boolean => "BOOLEAN".to_string(),
            ColumnKind::Date => "DATE".to_string(),
            ColumnKind::Timestamp => "TIMESTAMP".to_string(),
            ColumnKind::Location => return location_types("VARCHAR(255)", "DOUBLE", "FLOAT"),
        };
        vec![single]
    }

    fn auto_increment_definition(&self) -> &'static str {
        "BIGINT NOT NULL AUTO_INCREMENT"
    }

    fn updated_at_default(&self) -> &'static str {
        "DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
    }
}

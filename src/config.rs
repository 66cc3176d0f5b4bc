use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::database::dialect::DialectKind;

/// Connection and rendering settings consumed by the engine
///
/// The engine only ever reads a configuration; nothing in the crate mutates
/// one after it has been built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfiguration {
    /// Target SQL dialect
    pub dialect: DialectKind,

    /// Prefix prepended to every table name, including the migration ledger
    pub table_prefix: String,

    /// Quote identifiers in rendered SQL
    pub quote_identifiers: bool,

    /// SQLite database path, or `:memory:`
    pub database: String,

    /// How long a SQLite connection waits for a locked database, in milliseconds
    pub busy_timeout_ms: u64,
}

const EMPTY_CONFIG: &str = r#"### schemaforge configuration file

### SQL dialect: sqlite, mysql, mariadb, postgres
# dialect = "sqlite"

### prefix prepended to every table name
# table_prefix = "zessentials_"

### quote identifiers in generated SQL
# quote_identifiers = true

### SQLite database file (":memory:" for a throwaway database)
# database = "~/.schemaforge/schemaforge.sqlite3"

### milliseconds to wait on a locked database
# busy_timeout_ms = 5000
"#;

impl Default for DatabaseConfiguration {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            dialect: DialectKind::Sqlite,
            table_prefix: String::new(),
            quote_identifiers: true,
            database: format!("{}/.schemaforge/schemaforge.sqlite3", home_dir),
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfiguration {
    /// Configuration for a given dialect and prefix, other settings defaulted
    pub fn with_dialect(dialect: DialectKind, table_prefix: &str) -> Self {
        Self {
            dialect,
            table_prefix: table_prefix.to_string(),
            ..Self::default()
        }
    }

    /// In-memory SQLite configuration, handy for tests and dry runs
    pub fn in_memory(table_prefix: &str) -> Self {
        Self {
            database: ":memory:".to_string(),
            ..Self::with_dialect(DialectKind::Sqlite, table_prefix)
        }
    }

    /// Load the configuration from a TOML file and `SCHEMAFORGE_*` environment variables
    ///
    /// Without an explicit path, `$HOME/.schemaforge/schemaforge.toml` is used.
    /// A commented template is written when the file does not exist yet.
    pub fn new(path: &Option<String>) -> Result<DatabaseConfiguration> {
        let mut builder = Config::builder();

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                let config_dir = Self::config_dir()?;
                std::fs::create_dir_all(config_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create schemaforge directory: {}", e))?;
                let p = format!("{}/schemaforge.toml", config_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `SCHEMAFORGE_TABLE_PREFIX=zessentials_ schemaforge status`
        builder = builder.add_source(config::Environment::with_prefix("SCHEMAFORGE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_values(&values)
    }

    /// Build a configuration from flat key/value settings
    pub fn from_values(values: &HashMap<String, String>) -> Result<DatabaseConfiguration> {
        let defaults = Self::default();

        let dialect = match values.get("dialect") {
            Some(d) => d.parse::<DialectKind>()?,
            None => defaults.dialect,
        };

        let quote_identifiers = match values.get("quote_identifiers") {
            Some(v) => v
                .parse::<bool>()
                .map_err(|e| anyhow!("Invalid quote_identifiers '{}': {}", v, e))?,
            None => defaults.quote_identifiers,
        };

        let database = match values.get("database") {
            Some(p) => expand_home(p),
            None => defaults.database,
        };

        let busy_timeout_ms = match values.get("busy_timeout_ms") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|e| anyhow!("Invalid busy_timeout_ms '{}': {}", v, e))?,
            None => defaults.busy_timeout_ms,
        };

        Ok(DatabaseConfiguration {
            dialect,
            table_prefix: values.get("table_prefix").cloned().unwrap_or_default(),
            quote_identifiers,
            database,
            busy_timeout_ms,
        })
    }

    /// Name of the migration ledger table
    pub fn ledger_table(&self) -> String {
        format!("{}{}", self.table_prefix, crate::database::migration::LEDGER_SUFFIX)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Dialect:            {}", self.dialect),
            format!("Table Prefix:       {}", self.table_prefix),
            format!("Quote Identifiers:  {}", self.quote_identifiers),
            format!("Database:           {}", self.database),
            format!("Busy Timeout:       {} ms", self.busy_timeout_ms),
            format!("Ledger Table:       {}", self.ledger_table()),
        ]
        .join("\n")
    }

    fn config_dir() -> Result<String> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();
        Ok(format!("{}/.schemaforge", home_dir))
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}/{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_overrides_defaults() {
        let mut values = HashMap::new();
        values.insert("dialect".to_string(), "postgresql".to_string());
        values.insert("table_prefix".to_string(), "zessentials_".to_string());
        values.insert("quote_identifiers".to_string(), "false".to_string());
        values.insert("database".to_string(), ":memory:".to_string());

        let config = DatabaseConfiguration::from_values(&values).unwrap();
        assert_eq!(config.dialect, DialectKind::Postgres);
        assert_eq!(config.table_prefix, "zessentials_");
        assert!(!config.quote_identifiers);
        assert_eq!(config.database, ":memory:");
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.ledger_table(), "zessentials_migrations");
    }

    #[test]
    fn test_from_values_rejects_unknown_dialect() {
        let mut values = HashMap::new();
        values.insert("dialect".to_string(), "oracle".to_string());
        assert!(DatabaseConfiguration::from_values(&values).is_err());
    }

    #[test]
    fn test_from_values_rejects_bad_busy_timeout() {
        let mut values = HashMap::new();
        values.insert("busy_timeout_ms".to_string(), "5s".to_string());
        let err = DatabaseConfiguration::from_values(&values).unwrap_err();
        assert!(err.to_string().contains("busy_timeout_ms"));

        values.insert("busy_timeout_ms".to_string(), "250".to_string());
        let config = DatabaseConfiguration::from_values(&values).unwrap();
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn test_new_with_missing_file_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemaforge.toml");
        let path_str = path.to_string_lossy().to_string();

        let config = DatabaseConfiguration::new(&Some(path_str.clone())).unwrap();
        assert_eq!(config.dialect, DialectKind::Sqlite);
        assert!(path.exists());

        std::fs::write(&path, "dialect = \"mysql\"\ntable_prefix = \"srv_\"\n").unwrap();
        let config = DatabaseConfiguration::new(&Some(path_str)).unwrap();
        assert_eq!(config.dialect, DialectKind::Mysql);
        assert_eq!(config.table_prefix, "srv_");
    }
}

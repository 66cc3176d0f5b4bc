pub mod config;
pub mod forget;
pub mod status;

use schemaforge::{DatabaseConfiguration, DatabaseConn, DialectKind};

/// Open the configured database, exiting on failure
///
/// Only SQLite is bundled; other dialects need a caller-provided connection.
pub(crate) fn open_database(config: &DatabaseConfiguration) -> DatabaseConn {
    if config.dialect != DialectKind::Sqlite {
        eprintln!(
            "ERROR: the {} dialect has no bundled connection; the CLI only opens SQLite databases",
            config.dialect
        );
        std::process::exit(1);
    }

    match DatabaseConn::from_config(config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    }
}

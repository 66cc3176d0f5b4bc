use clap::Args;
use schemaforge::DatabaseConfiguration;
use serde::Serialize;
use std::path::Path;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Also report whether the database file exists and its size
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    #[serde(flatten)]
    config: &'a DatabaseConfiguration,
    ledger_table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_file: Option<DatabaseFileInfo>,
}

#[derive(Debug, Serialize)]
struct DatabaseFileInfo {
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

pub fn run(config: &DatabaseConfiguration, args: ConfigArgs, json_output: bool) {
    let ConfigArgs { verbose } = args;

    let database_file = if verbose && config.database != ":memory:" {
        let path = Path::new(&config.database);
        Some(DatabaseFileInfo {
            exists: path.exists(),
            size_bytes: std::fs::metadata(path).ok().map(|m| m.len()),
        })
    } else {
        None
    };

    if json_output {
        let info = ConfigInfo {
            config,
            ledger_table: config.ledger_table(),
            database_file,
        };
        match serde_json::to_string_pretty(&info) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Failed to serialize configuration: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("{}", config.summary());
    if let Some(file) = database_file {
        println!("Database Exists:    {}", file.exists);
        if let Some(size) = file.size_bytes {
            println!("Database Size:      {} bytes", size);
        }
    }
}

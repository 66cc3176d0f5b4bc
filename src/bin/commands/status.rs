use clap::Args;
use schemaforge::{DatabaseConfiguration, MigrationTracker, TracingSink};
use tabled::settings::Style;
use tabled::Table;

use super::open_database;

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Only show migrations whose name contains this text
    #[clap(short, long)]
    pub filter: Option<String>,

    /// Output to pretty table, default markdown table
    #[clap(short, long)]
    pub pretty: bool,
}

pub fn run(config: &DatabaseConfiguration, args: StatusArgs, json_output: bool) {
    let StatusArgs { filter, pretty } = args;

    let db = open_database(config);
    let sink = TracingSink;
    let tracker = MigrationTracker::new(config, &sink);

    let mut migrations = match tracker.applied(&db) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Failed to read migration ledger: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(text) = &filter {
        migrations.retain(|m| m.name.contains(text.as_str()));
    }

    if json_output {
        match serde_json::to_string_pretty(&migrations) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Failed to serialize migrations: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if migrations.is_empty() {
        println!("No migrations recorded in {}", tracker.ledger_table());
        return;
    }

    let mut table = Table::new(&migrations);
    if pretty {
        table.with(Style::rounded());
    } else {
        table.with(Style::markdown());
    }
    println!("{}", table);
}

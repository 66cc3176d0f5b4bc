use clap::Args;
use schemaforge::{DatabaseConfiguration, MigrationTracker, TracingSink};
use serde_json::json;

use super::open_database;

/// Arguments for the Forget command
#[derive(Args)]
pub struct ForgetArgs {
    /// Migration name to remove from the ledger
    #[clap(name = "NAME")]
    pub name: String,
}

pub fn run(config: &DatabaseConfiguration, args: ForgetArgs, json_output: bool) {
    let ForgetArgs { name } = args;

    let db = open_database(config);
    let sink = TracingSink;
    let tracker = MigrationTracker::new(config, &sink);

    let removed = match tracker.forget(&db, &name) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to update migration ledger: {}", e);
            std::process::exit(1);
        }
    };

    if json_output {
        println!("{}", json!({ "migration": name, "removed": removed }));
    } else if removed {
        println!("Forgot migration '{}'; it will run again on next execution", name);
    } else {
        println!("Migration '{}' is not recorded in {}", name, tracker.ledger_table());
    }
}

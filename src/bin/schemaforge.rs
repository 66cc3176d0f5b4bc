use clap::{Parser, Subcommand};
use schemaforge::DatabaseConfiguration;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::forget::ForgetArgs;
use commands::status::StatusArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.schemaforge/schemaforge.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output as JSON
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the migrations recorded in the ledger.
    Status(StatusArgs),

    /// Remove a migration from the ledger so it runs again.
    Forget(ForgetArgs),

    /// Show the active configuration.
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }

    let config = match DatabaseConfiguration::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Status(args) => commands::status::run(&config, args, cli.json),
        Commands::Forget(args) => commands::forget::run(&config, args, cli.json),
        Commands::Config(args) => commands::config::run(&config, args, cli.json),
    }
}

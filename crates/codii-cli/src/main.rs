//! Codii CLI
//!
//! Local code indexing and hybrid search.

use clap::Parser;
use codii_core::{CodiiConfig, Indexer};

mod app;
mod commands;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match CodiiConfig::load(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    };
    let indexer = Indexer::new(config);

    let result = match cli.command {
        Commands::Index(args) => commands::index::run(args, &indexer, cli.format),
        Commands::Search(args) => commands::search::run(args, &indexer, cli.format),
        Commands::Status(args) => commands::status::run(args, &indexer, cli.format),
        Commands::Clear(args) => commands::clear::run(args, &indexer, cli.format),
        Commands::Mcp => codii_mcp::start_server(indexer).await.map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

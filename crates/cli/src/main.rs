//! Retail Express connector CLI
//!
//! A command-line tool for checking the Retail Express session,
//! issuing raw remote calls and pushing customers from a store file.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{session, sync};
use connector_lib::{ConnectorMetrics, EntityId, EventSink, TracingSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Retail Express connector CLI
#[derive(Parser)]
#[command(name = "rexsync")]
#[command(author, version, about = "CLI for the Retail Express connector", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/rexsync/config.toml when present)
    #[arg(long, env = "REX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    pub dump_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a session against the configured service
    Check,

    /// Call a remote operation and print the normalized result
    Call {
        /// Remote operation name (e.g. CustomerGetDetails)
        operation: String,

        /// Payload as JSON
        #[arg(long, short)]
        data: Option<String>,
    },

    /// Push customers from a store snapshot file
    Push {
        /// Store snapshot (JSON)
        #[arg(long, short)]
        store: PathBuf,

        /// Push only these entity ids (all customers when omitted)
        #[arg(long = "entity", short)]
        entities: Vec<EntityId>,

        /// Write new linkages back to the store file
        #[arg(long)]
        save: bool,
    },

    /// Retrieve customers from Retail Express
    Retrieve,
}

fn init_tracing(json: bool) {
    // logs go to stderr so JSON output stays parseable
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    debug!(node = config.node_id, endpoint = ?config.endpoint(), "Connector configured");

    let events: Arc<dyn EventSink> = Arc::new(TracingSink::new(format!("node-{}", config.node_id)));

    match &cli.command {
        Commands::Check => session::check(&config, events, cli.format).await,
        Commands::Call { operation, data } => {
            session::call(&config, events, operation, data.as_deref(), cli.format).await
        }
        Commands::Push {
            store,
            entities,
            save,
        } => sync::push(&config, events, store, entities, *save, cli.format).await,
        Commands::Retrieve => sync::retrieve(&config, events, cli.format).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let outcome = run(&cli).await;

    if cli.dump_metrics {
        print!("{}", ConnectorMetrics::new().render());
    }

    if let Err(e) = outcome {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

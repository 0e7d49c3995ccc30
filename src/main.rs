use clap::{Parser, Subcommand};
use docroute_core::{CollectionRouter, DocumentService, DocumentStore, MemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod db;
mod server;

use commands::{ConfigCommand, DocumentCommand};
use config::{Config, ConfigSource, ConfigValue};
use db::{init_db, SqliteStore};

#[derive(Parser)]
#[command(name = "docroute")]
#[command(version)]
#[command(about = "Document service with per-type collections", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Keep documents in memory instead of the database
        #[arg(long)]
        memory: bool,
    },

    #[command(flatten)]
    Document(DocumentCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, Some(Commands::Serve { .. }));
    init_tracing(if serving {
        "docroute=info,docroute_core=info,tower_http=info"
    } else {
        "warn"
    });

    // Load configuration
    let mut config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port, memory }) => {
            if let Some(host) = host {
                config.host = ConfigValue::new(host, ConfigSource::CommandLine);
            }
            if let Some(port) = port {
                config.port = ConfigValue::new(port, ConfigSource::CommandLine);
            }

            let store: Arc<dyn DocumentStore> = if memory {
                tracing::warn!("Using in-memory store - documents are lost on exit");
                Arc::new(MemoryStore::new())
            } else {
                tracing::info!("Using database {}", config.database_path.value.display());
                open_store(&config).await?
            };
            server::serve(&config, store).await?;
        }
        Some(Commands::Document(cmd)) => {
            let store = open_store(&config).await?;
            let service = DocumentService::with_router(
                store,
                CollectionRouter::with_capacity(config.router_capacity.value),
            );
            cmd.run(&service).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("docroute - document service with per-type collections");
            println!("Run 'docroute --help' for usage information.");
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>, sqlx::Error> {
    let pool = init_db(&config.database_path.value).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::api::AppState;
use storefront::config::{Config, StoreConfig};
use storefront::{DocumentStore, MemoryStore, MongoStore, SandboxGateway};

/// HTTP server for the storefront API
#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory of JSON collection files to seed the store with
    #[arg(long, value_name = "PATH")]
    seed_path: Option<PathBuf>,

    /// MongoDB connection string; replaces the in-process store
    #[arg(long, value_name = "URI")]
    db_uri: Option<String>,

    /// Bind address
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Port number
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(
        args.config.as_ref(),
        args.bind.as_deref(),
        args.port,
        args.seed_path.as_ref(),
        args.db_uri.as_deref(),
    )?;

    info!("Configuration loaded: bind={}:{}", config.bind, config.port);

    // Create store
    let store: Arc<dyn DocumentStore> = match &config.store {
        StoreConfig::Memory { seed: Some(path) } => {
            info!("Seeding memory store from: {}", path.display());
            Arc::new(MemoryStore::load(path.clone()).await?)
        }
        StoreConfig::Memory { seed: None } => {
            info!("Using empty memory store");
            Arc::new(MemoryStore::new())
        }
        StoreConfig::Mongo { uri, database } => {
            Arc::new(MongoStore::connect(uri, database.as_deref()).await?)
        }
    };

    let state = AppState {
        store,
        payments: Arc::new(SandboxGateway::new()),
        currency: config.payment.currency.clone(),
    };

    // Start server
    storefront::api::run(config, state).await
}

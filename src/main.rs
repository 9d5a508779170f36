//! Realtime Sync CLI.
//!
//! Entry point for the sync binary. Provides subcommands for:
//! - `run` - Start the realtime sync service
//! - `migrate` - Run database migrations

use std::sync::Arc;

use alloy::providers::ProviderBuilder;
use clap::{Parser, Subcommand};
use evm_realtime_sync::config::Settings;
use evm_realtime_sync::ports::BroadcastPublisher;
use evm_realtime_sync::rpc::AlloyChainClient;
use evm_realtime_sync::store::PgEventStore;
use evm_realtime_sync::sync::RealtimeSyncService;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

/// EVM Realtime Sync
#[derive(Parser, Debug)]
#[command(name = "realtime-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment name (selects `config/{name}.toml`)
    #[arg(short, long, default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the realtime sync service
    Run,

    /// Run database migrations
    Migrate {
        /// Revert the most recent migration instead of applying pending ones
        #[arg(long)]
        revert: bool,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.environment)?;

    let level = settings.logging.effective_level();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "invalid configuration");
        }
        eyre::bail!("configuration validation failed");
    }

    info!(
        version = evm_realtime_sync::VERSION,
        environment = %cli.environment,
        "starting evm-realtime-sync"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(settings.database.connect_timeout())
        .idle_timeout(settings.database.idle_timeout())
        .connect(&settings.database.url)
        .await?;

    match cli.command {
        Commands::Run => run(settings, pool).await,
        Commands::Migrate { revert } => migrate(&pool, revert).await,
    }
}

async fn run(settings: Settings, pool: sqlx::PgPool) -> eyre::Result<()> {
    let provider = ProviderBuilder::new().connect_http(settings.network.http_url.parse()?);
    let chain_client = AlloyChainClient::new(provider);
    let store = PgEventStore::new(pool);
    let publisher = BroadcastPublisher::new(1024);

    let service = Arc::new(RealtimeSyncService::new(
        chain_client,
        store,
        publisher,
        settings.network.to_network_config(),
        settings.log_filters,
    ));

    let outcome = service.setup().await?;
    info!(
        latest = outcome.latest_block_number.get(),
        finalized = outcome.finalized_block_number.get(),
        "setup complete"
    );

    // start() only seeds the local chain and spawns the poll/worker tasks;
    // it returns as soon as they're running, so the process has to wait on
    // the shutdown signal separately rather than racing it against start().
    service.start().await?;

    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    service.kill().await;

    Ok(())
}

async fn migrate(pool: &sqlx::PgPool, revert: bool) -> eyre::Result<()> {
    if revert {
        info!("reverting most recent migration");
        sqlx::migrate!("./migrations").undo(pool, -1).await?;
    } else {
        info!("running migrations");
        sqlx::migrate!("./migrations").run(pool).await?;
    }
    Ok(())
}

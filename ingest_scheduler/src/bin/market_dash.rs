use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ingest_scheduler::config::AppConfig;
use ingest_scheduler::cycle::Ingestor;
use ingest_scheduler::logging::init_logging;
use ingest_scheduler::scheduler::Scheduler;
use market_data_ingestor::providers::MarketDataProvider;
use market_data_ingestor::providers::polygon_rest::PolygonProvider;
use market_data_ingestor::providers::polygon_rest::provider::API_KEY_VAR;
use shared_utils::env::load_dotenv;
use snapshot_store::facade::QueryFacade;
use snapshot_store::{SnapshotStore, open_store};
use tracing::info;

#[derive(Parser)]
#[command(version, about = "End-of-day market snapshot ingestion")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the scheduler until Ctrl-C
    Run,
    /// Run a single ingestion cycle and exit
    Ingest {
        /// Trading day to ingest (YYYY-MM-DD); defaults to the latest published session
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print the market summary from the configured store as JSON
    Summary,
    /// Apply pending database migrations
    Migrate,
}

fn provider(config: &AppConfig) -> Result<Arc<dyn MarketDataProvider>> {
    let key = config
        .api_key()
        .with_context(|| format!("{API_KEY_VAR} is not configured"))?;
    let provider = match config.polygon_base_url.as_deref() {
        Some(url) => PolygonProvider::with_base_url(key, url)?,
        None => PolygonProvider::new(key)?,
    };
    Ok(Arc::new(provider))
}

async fn ingestor(config: &AppConfig) -> Result<Ingestor> {
    let provider = provider(config)?;
    let store = open_store(&config.store_options()).await;
    Ok(Ingestor::new(provider, store).with_timeout(config.cycle_timeout()))
}

async fn run(config: &AppConfig) -> Result<()> {
    let ingestor = Arc::new(ingestor(config).await?);
    let store = Arc::clone(ingestor.store());

    let mut scheduler =
        Scheduler::new(Arc::clone(&ingestor), config.cron.as_str(), config.run_on_start).await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutdown requested");

    scheduler.shutdown().await?;
    store.close().await;
    Ok(())
}

async fn ingest(config: &AppConfig, date: Option<NaiveDate>) -> Result<()> {
    let ingestor = ingestor(config).await?;
    let outcome = match date {
        Some(date) => ingestor.run_cycle_for(date).await,
        None => ingestor.run_cycle().await,
    };
    ingestor.store().close().await;

    let outcome = outcome?;
    println!("{outcome:?}");
    Ok(())
}

async fn summary(config: &AppConfig) -> Result<()> {
    let store: Arc<dyn SnapshotStore> = open_store(&config.store_options()).await;
    let facade = QueryFacade::new(Arc::clone(&store)).with_summary_limit(config.summary_limit);
    let summary = facade.summary().await;
    store.close().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn migrate(config: &AppConfig) -> Result<()> {
    let url = config
        .database_url
        .clone()
        .context("DATABASE_URL is not configured")?;
    tokio::task::spawn_blocking(move || snapshot_store::db::migrate::run_all(&url)).await??;
    info!("migrations up to date");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // `.env` may set RUST_LOG, so it is read before the subscriber exists
    // and its outcome logged after.
    let dotenv = load_dotenv();
    init_logging(&cli.log_level, cli.json_logs)?;
    dotenv.log();
    let config = AppConfig::load(cli.config.as_deref())?;
    info!(?config, "configuration loaded");

    match cli.cmd {
        Cmd::Run => run(&config).await,
        Cmd::Ingest { date } => ingest(&config, date).await,
        Cmd::Summary => summary(&config).await,
        Cmd::Migrate => migrate(&config).await,
    }
}

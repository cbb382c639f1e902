use launchpad_indexer::config::AppConfig;
use launchpad_indexer::db::{self, PgStore};
use launchpad_indexer::ingestion::{Orchestrator, ScanMode};
use launchpad_indexer::realtime::RealtimePublisher;
use launchpad_indexer::rpc::RangeFetcher;
use launchpad_indexer::services::scheduler::{run_scheduler, Schedule};
use launchpad_indexer::{build_chain_sources, metrics};

/// Broadcast buffer when no Redis is configured.
const BROADCAST_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config.log_format);

    let once = parse_once_arg(std::env::args().skip(1))?;

    metrics::init_metrics(&config.metrics_addr)?;

    tracing::info!("Connecting to database...");
    let db = db::init_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connected");

    let publisher = match &config.redis_url {
        Some(url) => RealtimePublisher::connect_redis(url).await?,
        None => {
            tracing::warn!("REDIS_URL not set, realtime messages stay in-process");
            RealtimePublisher::broadcast(BROADCAST_CAPACITY).0
        }
    };

    let chains = build_chain_sources(&config)?;
    for source in &chains {
        tracing::info!(
            chain_id = source.chain.chain_id,
            factory = %source.chain.factory_address,
            endpoints = source.endpoints.len(),
            "Chain configured"
        );
    }

    let orchestrator = Orchestrator::new(
        PgStore::new(db),
        chains,
        RangeFetcher::new(config.fetch.clone()),
        publisher,
        config.scan.clone(),
    );

    if let Some(mode) = once {
        let report = orchestrator.run_pass(mode).await;
        tracing::info!(?report, "Single pass finished");
        return Ok(());
    }

    let schedule = Schedule::from_secs(config.index_interval_secs, config.repair_interval_secs);
    run_scheduler(&orchestrator, schedule, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(())
}

/// `once [normal|repair]` selects a single pass; no arguments runs the scheduler.
fn parse_once_arg(mut args: impl Iterator<Item = String>) -> anyhow::Result<Option<ScanMode>> {
    match args.next().as_deref() {
        None => Ok(None),
        Some("once") => {
            let mode = match args.next() {
                Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
                None => ScanMode::Normal,
            };
            Ok(Some(mode))
        }
        Some(other) => anyhow::bail!("unknown command '{other}', expected 'once [normal|repair]'"),
    }
}

fn init_tracing(log_format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if log_format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

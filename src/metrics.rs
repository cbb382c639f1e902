use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own scrape listener on `addr`
/// and register the indexer's metrics.
///
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = addr.parse()?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    // Pre-register counters so they appear even before the first increment.
    for name in [
        "rpc_rotations_total",
        "rpc_range_splits_total",
        "rpc_backoff_retries_total",
        "logs_fetched_total",
        "trades_inserted_total",
        "campaigns_discovered_total",
        "campaign_scan_failures_total",
        "realtime_publish_failures_total",
    ] {
        counter!(name).absolute(0);
    }

    histogram!("pass_duration_seconds", "mode" => "normal").record(0.0);

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

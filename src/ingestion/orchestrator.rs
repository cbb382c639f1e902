use std::time::Instant;

use metrics::{counter, gauge, histogram};
use tracing::Instrument;
use uuid::Uuid;

use super::{scan_campaign, scan_registry, BlockTimeCache, ChainHead, ScanContext, ScanMode};
use crate::config::{ChainConfig, ScanSettings};
use crate::db::IndexStore;
use crate::realtime::RealtimePublisher;
use crate::rpc::{Endpoint, LogSource, ProviderPool, RangeFetcher};

/// A configured chain together with its resolved endpoints.
#[derive(Debug, Clone)]
pub struct ChainSource<L> {
    pub chain: ChainConfig,
    pub endpoints: Vec<Endpoint<L>>,
}

/// Outcome of one pass over every chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub mode: ScanMode,
    pub chains: usize,
    pub chains_failed: usize,
    pub campaigns_scanned: usize,
    pub campaigns_failed: usize,
    pub campaigns_discovered: usize,
    pub trades_inserted: usize,
}

/// Drives normal and repair passes. A pass is sequential: chains in order,
/// the registry first, then campaigns one at a time.
pub struct Orchestrator<S, L> {
    store: S,
    chains: Vec<ChainSource<L>>,
    fetcher: RangeFetcher,
    publisher: RealtimePublisher,
    settings: ScanSettings,
}

impl<S: IndexStore, L: LogSource + Clone> Orchestrator<S, L> {
    pub fn new(
        store: S,
        chains: Vec<ChainSource<L>>,
        fetcher: RangeFetcher,
        publisher: RealtimePublisher,
        settings: ScanSettings,
    ) -> Self {
        Self {
            store,
            chains,
            fetcher,
            publisher,
            settings,
        }
    }

    /// Run one pass. Failures are logged and counted, never returned.
    pub async fn run_pass(&self, mode: ScanMode) -> PassReport {
        let span = tracing::info_span!("pass", pass_id = %Uuid::new_v4(), mode = %mode);
        self.run_pass_inner(mode).instrument(span).await
    }

    async fn run_pass_inner(&self, mode: ScanMode) -> PassReport {
        let start = Instant::now();
        let mut report = PassReport {
            mode,
            chains: self.chains.len(),
            ..PassReport::default()
        };

        for source in &self.chains {
            if let Err(e) = self.run_chain(mode, source, &mut report).await {
                report.chains_failed += 1;
                tracing::error!(
                    chain_id = source.chain.chain_id,
                    error = %e,
                    "Chain pass aborted"
                );
            }
        }

        histogram!("pass_duration_seconds", "mode" => mode.to_string())
            .record(start.elapsed().as_secs_f64());

        tracing::info!(
            chains = report.chains,
            chains_failed = report.chains_failed,
            campaigns_scanned = report.campaigns_scanned,
            campaigns_failed = report.campaigns_failed,
            campaigns_discovered = report.campaigns_discovered,
            trades_inserted = report.trades_inserted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pass complete"
        );

        report
    }

    /// Only the head lookup and the campaign listing abort a chain; registry
    /// and campaign scans fail in isolation.
    async fn run_chain(
        &self,
        mode: ScanMode,
        source: &ChainSource<L>,
        report: &mut PassReport,
    ) -> anyhow::Result<()> {
        let chain_id = source.chain.chain_id;
        let pool = ProviderPool::new(chain_id, source.endpoints.clone());

        let head = ChainHead::new(pool.block_number().await?, self.settings.confirmations);
        gauge!("chain_head_block", "chain_id" => chain_id.to_string()).set(head.head as f64);
        tracing::debug!(chain_id, head = head.head, target = head.target, "Chain head resolved");

        let ctx = ScanContext {
            chain_id,
            mode,
            head,
            store: &self.store,
            pool: &pool,
            fetcher: &self.fetcher,
            publisher: &self.publisher,
            settings: &self.settings,
        };

        match scan_registry(&ctx, &source.chain).await {
            Ok(discovered) => report.campaigns_discovered += discovered,
            Err(e) => {
                tracing::error!(
                    chain_id,
                    factory = %source.chain.factory_address,
                    endpoint = pool.current_label().unwrap_or("-"),
                    error = %e,
                    "Registry scan failed"
                );
            }
        }

        let campaigns = self.store.active_campaigns(chain_id).await?;
        let mut block_times = BlockTimeCache::new();

        for campaign in &campaigns {
            report.campaigns_scanned += 1;
            match scan_campaign(&ctx, campaign, &mut block_times).await {
                Ok(inserted) => report.trades_inserted += inserted,
                Err(e) => {
                    report.campaigns_failed += 1;
                    counter!("campaign_scan_failures_total").increment(1);
                    tracing::error!(
                        chain_id,
                        campaign = %campaign.address,
                        endpoint = pool.current_label().unwrap_or("-"),
                        error = %e,
                        "Campaign scan failed"
                    );
                }
            }
        }

        Ok(())
    }
}

use sqlx::PgPool;

use super::{campaign_repo, candle_repo, cursor_repo, stats_repo, trade_repo};
use crate::aggregation::{CandleChange, Timeframe};
use crate::models::{Campaign, NewCampaign, StatSnapshot, Trade};

/// Persistence seam used by the scanners.
///
/// Every method is a single atomic unit: a cursor advance, a campaign
/// upsert, or one trade together with all of its candle merges.
#[allow(async_fn_in_trait)]
pub trait IndexStore {
    /// Stored cursor, 0 when absent.
    async fn cursor(&self, chain_id: i64, name: &str) -> anyhow::Result<u64>;

    /// Persist `max(stored, candidate)` and return the stored value.
    async fn advance_cursor(
        &self,
        chain_id: i64,
        name: &str,
        candidate: u64,
    ) -> anyhow::Result<u64>;

    async fn upsert_campaign(&self, campaign: &NewCampaign) -> anyhow::Result<Campaign>;

    async fn active_campaigns(&self, chain_id: i64) -> anyhow::Result<Vec<Campaign>>;

    /// Insert a trade and, if it is new and priced, merge it into one bucket
    /// per timeframe. `None` means the trade already existed and nothing
    /// was written.
    async fn record_trade(
        &self,
        trade: &Trade,
        timeframes: &[Timeframe],
    ) -> anyhow::Result<Option<Vec<CandleChange>>>;

    async fn campaign_trades(
        &self,
        chain_id: i64,
        campaign_address: &str,
    ) -> anyhow::Result<Vec<Trade>>;

    async fn save_stats(&self, stats: &StatSnapshot) -> anyhow::Result<()>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl IndexStore for PgStore {
    async fn cursor(&self, chain_id: i64, name: &str) -> anyhow::Result<u64> {
        cursor_repo::get_cursor(&self.pool, chain_id, name).await
    }

    async fn advance_cursor(
        &self,
        chain_id: i64,
        name: &str,
        candidate: u64,
    ) -> anyhow::Result<u64> {
        cursor_repo::advance_cursor(&self.pool, chain_id, name, candidate).await
    }

    async fn upsert_campaign(&self, campaign: &NewCampaign) -> anyhow::Result<Campaign> {
        campaign_repo::upsert_campaign(&self.pool, campaign).await
    }

    async fn active_campaigns(&self, chain_id: i64) -> anyhow::Result<Vec<Campaign>> {
        campaign_repo::get_active_campaigns(&self.pool, chain_id).await
    }

    async fn record_trade(
        &self,
        trade: &Trade,
        timeframes: &[Timeframe],
    ) -> anyhow::Result<Option<Vec<CandleChange>>> {
        let mut tx = self.pool.begin().await?;

        if !trade_repo::insert_trade(&mut *tx, trade).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let mut changes = Vec::new();
        if let Some(price) = trade.price {
            for timeframe in timeframes {
                changes.push(candle_repo::apply_trade(&mut *tx, trade, price, timeframe).await?);
            }
        }

        tx.commit().await?;
        Ok(Some(changes))
    }

    async fn campaign_trades(
        &self,
        chain_id: i64,
        campaign_address: &str,
    ) -> anyhow::Result<Vec<Trade>> {
        trade_repo::get_trades_by_campaign(&self.pool, chain_id, campaign_address).await
    }

    async fn save_stats(&self, stats: &StatSnapshot) -> anyhow::Result<()> {
        stats_repo::upsert_stats(&self.pool, stats).await
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{hex, keccak256, U256};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use launchpad_indexer::aggregation::{merge_candle, CandleChange, Timeframe};
use launchpad_indexer::config::{ChainConfig, ScanSettings};
use launchpad_indexer::db::IndexStore;
use launchpad_indexer::errors::RpcError;
use launchpad_indexer::ingestion::events::{
    CAMPAIGN_CREATED_TOPIC, TOKENS_PURCHASED_TOPIC, TOKENS_SOLD_TOPIC,
};
use launchpad_indexer::ingestion::{ChainSource, Orchestrator};
use launchpad_indexer::models::campaign::merge_created_block;
use launchpad_indexer::models::cursor::{merge_cursor, trades_cursor_name};
use launchpad_indexer::models::{Campaign, Candle, NewCampaign, StatSnapshot, Trade};
use launchpad_indexer::realtime::{Delivery, RealtimePublisher};
use launchpad_indexer::rpc::{ChainLog, Endpoint, FetchPolicy, LogFilter, LogSource, RangeFetcher};

pub const CHAIN_ID: i64 = 8453;
pub const FACTORY: &str = "0x00000000000000000000000000000000000000fa";
/// Block timestamps are `BASE_TIMESTAMP + 2 * block`.
pub const BASE_TIMESTAMP: u64 = 1_700_000_000;

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Connect to `TEST_DATABASE_URL` and run migrations.
/// Returns `None` (the caller skips) when no database is reachable.
pub async fn try_setup_test_db() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("skipping: test database unreachable: {e}");
            return None;
        }
    };

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// Remove every row belonging to one campaign so parallel tests stay isolated.
pub async fn reset_campaign(pool: &PgPool, campaign: &str) {
    for table in ["stats", "candles", "trades"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE campaign_address = $1"))
            .bind(campaign)
            .execute(pool)
            .await
            .expect("Failed to clean table");
    }
    sqlx::query("DELETE FROM campaigns WHERE address = $1")
        .bind(campaign)
        .execute(pool)
        .await
        .expect("Failed to clean campaigns");
    sqlx::query("DELETE FROM chain_cursor WHERE cursor_name = $1")
        .bind(trades_cursor_name(campaign))
        .execute(pool)
        .await
        .expect("Failed to clean cursors");
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    cursors: HashMap<(i64, String), u64>,
    campaigns: Vec<Campaign>,
    trades: Vec<Trade>,
    candles: HashMap<(i64, String, String, i64), Candle>,
    stats: HashMap<(i64, String), StatSnapshot>,
    /// Fail this many `save_stats` calls before succeeding again.
    stats_failures: u32,
}

/// `IndexStore` with the same merge rules as the Postgres store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor_value(&self, name: &str) -> Option<u64> {
        let state = self.state.lock().unwrap();
        state.cursors.get(&(CHAIN_ID, name.to_string())).copied()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.state.lock().unwrap().trades.clone()
    }

    pub fn campaigns(&self) -> Vec<Campaign> {
        self.state.lock().unwrap().campaigns.clone()
    }

    pub fn candles(&self, campaign: &str, timeframe: &str) -> Vec<Candle> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<Candle> = state
            .candles
            .values()
            .filter(|c| c.campaign_address == campaign && c.timeframe == timeframe)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.bucket_start);
        out
    }

    pub fn stats(&self, campaign: &str) -> Option<StatSnapshot> {
        let state = self.state.lock().unwrap();
        state.stats.get(&(CHAIN_ID, campaign.to_string())).cloned()
    }

    pub fn fail_next_stats_saves(&self, calls: u32) {
        self.state.lock().unwrap().stats_failures = calls;
    }

    pub fn deactivate(&self, campaign: &str) {
        let mut state = self.state.lock().unwrap();
        for c in state.campaigns.iter_mut().filter(|c| c.address == campaign) {
            c.is_active = false;
        }
    }
}

impl IndexStore for MemoryStore {
    async fn cursor(&self, chain_id: i64, name: &str) -> anyhow::Result<u64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .cursors
            .get(&(chain_id, name.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn advance_cursor(
        &self,
        chain_id: i64,
        name: &str,
        candidate: u64,
    ) -> anyhow::Result<u64> {
        let mut state = self.state.lock().unwrap();
        let key = (chain_id, name.to_string());
        let merged = merge_cursor(state.cursors.get(&key).copied(), candidate);
        state.cursors.insert(key, merged);
        Ok(merged)
    }

    async fn upsert_campaign(&self, campaign: &NewCampaign) -> anyhow::Result<Campaign> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .campaigns
            .iter_mut()
            .find(|c| c.chain_id == campaign.chain_id && c.address == campaign.address);

        let row = match existing {
            Some(row) => {
                row.token_address = campaign.token_address.clone();
                row.creator_address = campaign.creator_address.clone();
                row.name = campaign.name.clone();
                row.symbol = campaign.symbol.clone();
                row.created_block =
                    merge_created_block(row.created_block as u64, campaign.created_block) as i64;
                row.clone()
            }
            None => {
                let row = Campaign {
                    chain_id: campaign.chain_id,
                    address: campaign.address.clone(),
                    token_address: campaign.token_address.clone(),
                    creator_address: campaign.creator_address.clone(),
                    name: campaign.name.clone(),
                    symbol: campaign.symbol.clone(),
                    created_block: campaign.created_block as i64,
                    is_active: true,
                };
                state.campaigns.push(row.clone());
                row
            }
        };
        Ok(row)
    }

    async fn active_campaigns(&self, chain_id: i64) -> anyhow::Result<Vec<Campaign>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .campaigns
            .iter()
            .filter(|c| c.chain_id == chain_id && c.is_active)
            .cloned()
            .collect())
    }

    async fn record_trade(
        &self,
        trade: &Trade,
        timeframes: &[Timeframe],
    ) -> anyhow::Result<Option<Vec<CandleChange>>> {
        let mut state = self.state.lock().unwrap();
        let duplicate = state.trades.iter().any(|t| {
            t.chain_id == trade.chain_id
                && t.tx_hash == trade.tx_hash
                && t.log_index == trade.log_index
        });
        if duplicate {
            return Ok(None);
        }
        state.trades.push(trade.clone());

        let mut changes = Vec::new();
        if let Some(price) = trade.price {
            for timeframe in timeframes {
                let key = (
                    trade.chain_id,
                    trade.campaign_address.clone(),
                    timeframe.label().to_string(),
                    timeframe.bucket_start(trade.block_time).timestamp(),
                );
                let before = state.candles.get(&key).cloned();
                let after = merge_candle(before.as_ref(), trade, price, timeframe);
                state.candles.insert(key, after.clone());
                changes.push(CandleChange { before, after });
            }
        }
        Ok(Some(changes))
    }

    async fn campaign_trades(
        &self,
        chain_id: i64,
        campaign_address: &str,
    ) -> anyhow::Result<Vec<Trade>> {
        let state = self.state.lock().unwrap();
        let mut trades: Vec<Trade> = state
            .trades
            .iter()
            .filter(|t| t.chain_id == chain_id && t.campaign_address == campaign_address)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.position());
        Ok(trades)
    }

    async fn save_stats(&self, stats: &StatSnapshot) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.stats_failures > 0 {
            state.stats_failures -= 1;
            anyhow::bail!("stats write rejected");
        }
        state
            .stats
            .insert((stats.chain_id, stats.campaign_address.clone()), stats.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted log source
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockState {
    head: u64,
    logs: Vec<ChainLog>,
    /// `get_logs` over more blocks than this is rate limited.
    max_range: Option<u64>,
    /// Rate-limit this many `get_logs` calls regardless of range.
    rate_limits_remaining: u32,
    /// Persistent `get_logs` failure, optionally for one address only.
    logs_failure: Option<(Option<String>, RpcError)>,
    /// `get_logs` failure for one address on any range covering a block.
    block_failure: Option<(String, u64, RpcError)>,
    head_failure: Option<RpcError>,
    calls: Vec<(String, u64, u64)>,
}

/// Scripted endpoint. Clones share state.
#[derive(Clone, Default)]
pub struct MockLogSource {
    state: Arc<Mutex<MockState>>,
}

impl MockLogSource {
    pub fn new(head: u64) -> Self {
        let source = Self::default();
        source.set_head(head);
        source
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn push_log(&self, log: ChainLog) {
        self.state.lock().unwrap().logs.push(log);
    }

    pub fn set_max_range(&self, blocks: u64) {
        self.state.lock().unwrap().max_range = Some(blocks);
    }

    pub fn rate_limit_next(&self, calls: u32) {
        self.state.lock().unwrap().rate_limits_remaining = calls;
    }

    pub fn fail_logs(&self, address: Option<&str>, error: RpcError) {
        self.state.lock().unwrap().logs_failure = Some((address.map(str::to_string), error));
    }

    pub fn fail_logs_covering(&self, address: &str, block: u64, error: RpcError) {
        self.state.lock().unwrap().block_failure = Some((address.to_string(), block, error));
    }

    pub fn clear_log_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.logs_failure = None;
        state.block_failure = None;
    }

    pub fn fail_head(&self, error: RpcError) {
        self.state.lock().unwrap().head_failure = Some(error);
    }

    /// Block ranges of every `get_logs` call, in call order.
    pub fn calls(&self) -> Vec<(u64, u64)> {
        self.state.lock().unwrap().calls.iter().map(|(_, f, t)| (*f, *t)).collect()
    }

    /// Block ranges of `get_logs` calls for one contract.
    pub fn calls_for(&self, address: &str) -> Vec<(u64, u64)> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(a, _, _)| a == address)
            .map(|(_, f, t)| (*f, *t))
            .collect()
    }
}

impl LogSource for MockLogSource {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let state = self.state.lock().unwrap();
        match &state.head_failure {
            Some(e) => Err(e.clone()),
            None => Ok(state.head),
        }
    }

    async fn get_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((filter.address.clone(), from_block, to_block));

        if let Some((address, error)) = &state.logs_failure {
            if address.as_deref().map_or(true, |a| a == filter.address) {
                return Err(error.clone());
            }
        }
        if let Some((address, block, error)) = &state.block_failure {
            if *address == filter.address && (from_block..=to_block).contains(block) {
                return Err(error.clone());
            }
        }
        if state.rate_limits_remaining > 0 {
            state.rate_limits_remaining -= 1;
            return Err(RpcError::RateLimited("too many requests".into()));
        }
        if let Some(max) = state.max_range {
            if to_block - from_block + 1 > max {
                return Err(RpcError::RateLimited("query returned more than 10000 results".into()));
            }
        }

        Ok(state
            .logs
            .iter()
            .filter(|log| {
                log.address == filter.address
                    && log.block_number >= from_block
                    && log.block_number <= to_block
                    && log.topic0().is_some_and(|t| filter.topics.iter().any(|f| f == t))
            })
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, RpcError> {
        Ok(BASE_TIMESTAMP + 2 * number)
    }
}

// ---------------------------------------------------------------------------
// Log builders
// ---------------------------------------------------------------------------

pub fn address(n: u64) -> String {
    format!("0x{n:040x}")
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

fn pad_topic(addr: &str) -> String {
    format!("0x{:0>64}", addr.trim_start_matches("0x"))
}

fn word(value: U256) -> String {
    hex::encode(value.to_be_bytes::<32>())
}

fn string_tail(s: &str) -> String {
    let encoded = hex::encode(s.as_bytes());
    let padded_len = encoded.len().div_ceil(64).max(1) * 64;
    format!("{}{:0<width$}", word(U256::from(s.len())), encoded, width = padded_len)
}

fn base_log(
    address: &str,
    topics: Vec<String>,
    data: String,
    block: u64,
    log_index: u64,
) -> ChainLog {
    ChainLog {
        address: address.to_lowercase(),
        topics,
        data,
        block_number: block,
        log_index,
        tx_hash: hex::encode_prefixed(keccak256(format!("{address}:{block}:{log_index}"))),
        block_timestamp: None,
        removed: false,
    }
}

pub fn campaign_created_log(campaign: &str, symbol: &str, block: u64, log_index: u64) -> ChainLog {
    let name = format!("{symbol} Token");
    let name_tail = string_tail(&name);
    let symbol_offset = 64 + name_tail.len() / 2;
    let data = format!(
        "0x{}{}{}{}",
        word(U256::from(64u64)),
        word(U256::from(symbol_offset)),
        name_tail,
        string_tail(symbol)
    );
    base_log(
        FACTORY,
        vec![
            CAMPAIGN_CREATED_TOPIC.clone(),
            pad_topic(campaign),
            pad_topic(&address(0xee)),
            pad_topic(&address(0xcc)),
        ],
        data,
        block,
        log_index,
    )
}

pub fn buy_log(
    campaign: &str,
    wallet: &str,
    tokens: U256,
    quote: U256,
    block: u64,
    log_index: u64,
) -> ChainLog {
    base_log(
        campaign,
        vec![TOKENS_PURCHASED_TOPIC.clone(), pad_topic(wallet)],
        format!("0x{}{}", word(tokens), word(quote)),
        block,
        log_index,
    )
}

pub fn sell_log(
    campaign: &str,
    wallet: &str,
    tokens: U256,
    quote: U256,
    block: u64,
    log_index: u64,
) -> ChainLog {
    base_log(
        campaign,
        vec![TOKENS_SOLD_TOPIC.clone(), pad_topic(wallet)],
        format!("0x{}{}", word(tokens), word(quote)),
        block,
        log_index,
    )
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Scan settings with no confirmations and 500-block chunks.
pub fn test_settings() -> ScanSettings {
    ScanSettings {
        log_chunk_size: 500,
        lookback_blocks: 1_000,
        repair_lookback_blocks: 500,
        repair_rewind_blocks: 200,
        confirmations: 0,
        ..ScanSettings::default()
    }
}

/// Tiny backoff so rate-limit paths run quickly.
pub fn fast_policy() -> FetchPolicy {
    FetchPolicy {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        ..FetchPolicy::default()
    }
}

pub fn chain_config(start_block: u64) -> ChainConfig {
    ChainConfig {
        chain_id: CHAIN_ID,
        rpc_urls: vec![],
        factory_address: FACTORY.to_string(),
        start_block,
    }
}

pub fn endpoints(sources: &[MockLogSource]) -> Vec<Endpoint<MockLogSource>> {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| Endpoint::new(format!("mock#{i}"), s.clone()))
        .collect()
}

pub fn orchestrator(
    store: MemoryStore,
    sources: &[MockLogSource],
    start_block: u64,
    settings: ScanSettings,
) -> (
    Orchestrator<MemoryStore, MockLogSource>,
    tokio::sync::broadcast::Receiver<Delivery>,
) {
    let (publisher, rx) = RealtimePublisher::broadcast(4096);
    let chain = ChainSource {
        chain: chain_config(start_block),
        endpoints: endpoints(sources),
    };
    let orchestrator = Orchestrator::new(
        store,
        vec![chain],
        RangeFetcher::new(fast_policy()),
        publisher,
        settings,
    );
    (orchestrator, rx)
}

/// Everything currently buffered on a broadcast receiver.
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<Delivery>) -> Vec<Delivery> {
    let mut out = Vec::new();
    while let Ok(d) = rx.try_recv() {
        out.push(d);
    }
    out
}

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::aggregation::timeframe::{parse_timeframes, Timeframe};
use crate::rpc::FetchPolicy;

const DEFAULT_TIMEFRAMES: &str = "1m,5m,15m,1h,4h,1d";

/// One indexed chain: ordered endpoints plus the registry contract.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: i64,
    pub rpc_urls: Vec<String>,
    pub factory_address: String,
    /// Known factory deployment block, 0 when unknown.
    pub start_block: u64,
}

impl ChainConfig {
    pub fn known_start_block(&self) -> Option<u64> {
        (self.start_block > 0).then_some(self.start_block)
    }
}

/// Knobs shared by the registry and trade scanners.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub log_chunk_size: u64,
    pub lookback_blocks: u64,
    pub repair_lookback_blocks: u64,
    pub repair_rewind_blocks: u64,
    pub confirmations: u64,
    pub timeframes: Vec<Timeframe>,
    pub rolling_volume_window: chrono::Duration,
    pub token_decimals: u32,
    pub quote_decimals: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            log_chunk_size: 2_000,
            lookback_blocks: 50_000,
            repair_lookback_blocks: 5_000,
            repair_rewind_blocks: 500,
            confirmations: 3,
            timeframes: parse_timeframes(DEFAULT_TIMEFRAMES).unwrap_or_default(),
            rolling_volume_window: chrono::Duration::hours(24),
            token_decimals: 18,
            quote_decimals: 18,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: Option<String>,

    pub chains: Vec<ChainConfig>,
    pub scan: ScanSettings,
    pub fetch: FetchPolicy,
    pub rpc_timeout: Duration,

    // Scheduling
    pub index_interval_secs: u64,
    pub repair_interval_secs: u64,

    // Observability
    pub metrics_addr: String,
    pub log_format: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = ScanSettings::default();
        let fetch_defaults = FetchPolicy::default();

        let chain_ids = split_list(&lookup("CHAIN_IDS").context("CHAIN_IDS must be set")?);
        if chain_ids.is_empty() {
            anyhow::bail!("CHAIN_IDS must list at least one chain");
        }

        let mut chains = Vec::with_capacity(chain_ids.len());
        for raw_id in chain_ids {
            let chain_id: i64 = raw_id
                .parse()
                .with_context(|| format!("invalid chain id '{raw_id}'"))?;

            let rpc_key = format!("CHAIN_{chain_id}_RPC_URLS");
            let rpc_urls = split_list(
                &lookup(&rpc_key).with_context(|| format!("{rpc_key} must be set"))?,
            );
            if rpc_urls.is_empty() {
                anyhow::bail!("{rpc_key} must list at least one endpoint");
            }

            let factory_key = format!("CHAIN_{chain_id}_FACTORY");
            let factory_address = lookup(&factory_key)
                .with_context(|| format!("{factory_key} must be set"))?
                .trim()
                .to_lowercase();

            chains.push(ChainConfig {
                chain_id,
                rpc_urls,
                factory_address,
                start_block: parse_or(&lookup, &format!("CHAIN_{chain_id}_START_BLOCK"), 0)?,
            });
        }

        let timeframes = match lookup("TIMEFRAMES") {
            Some(raw) => parse_timeframes(&raw).map_err(anyhow::Error::msg)?,
            None => defaults.timeframes.clone(),
        };

        let scan = ScanSettings {
            log_chunk_size: parse_or(&lookup, "LOG_CHUNK_SIZE", defaults.log_chunk_size)?.max(1),
            lookback_blocks: parse_or(&lookup, "LOOKBACK_BLOCKS", defaults.lookback_blocks)?,
            repair_lookback_blocks: parse_or(
                &lookup,
                "REPAIR_LOOKBACK_BLOCKS",
                defaults.repair_lookback_blocks,
            )?,
            repair_rewind_blocks: parse_or(
                &lookup,
                "REPAIR_REWIND_BLOCKS",
                defaults.repair_rewind_blocks,
            )?,
            confirmations: parse_or(&lookup, "CONFIRMATIONS", defaults.confirmations)?,
            timeframes,
            rolling_volume_window: chrono::Duration::seconds(parse_or(
                &lookup,
                "ROLLING_VOLUME_WINDOW_SECS",
                defaults.rolling_volume_window.num_seconds(),
            )?),
            token_decimals: parse_or(&lookup, "TOKEN_DECIMALS", defaults.token_decimals)?,
            quote_decimals: parse_or(&lookup, "QUOTE_DECIMALS", defaults.quote_decimals)?,
        };

        let fetch = FetchPolicy {
            min_chunk_floor: parse_or(&lookup, "MIN_CHUNK_FLOOR", fetch_defaults.min_chunk_floor)?,
            max_split_depth: parse_or(&lookup, "MAX_SPLIT_DEPTH", fetch_defaults.max_split_depth)?,
            ..fetch_defaults
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            redis_url: lookup("REDIS_URL").filter(|u| !u.trim().is_empty()),
            chains,
            scan,
            fetch,
            rpc_timeout: Duration::from_secs(parse_or(&lookup, "RPC_TIMEOUT_SECS", 20)?),
            index_interval_secs: parse_or(&lookup, "INDEX_INTERVAL_SECS", 15u64)?.max(1),
            repair_interval_secs: parse_or(&lookup, "REPAIR_INTERVAL_SECS", 600u64)?.max(1),
            metrics_addr: lookup("METRICS_ADDR").unwrap_or_else(|| "0.0.0.0:9100".into()),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "text".into()),
        })
    }
}

/// Short, credential-free label for an endpoint URL.
pub fn endpoint_label(url: &str, index: usize) -> String {
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "endpoint".into());
    format!("{host}#{index}")
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} '{raw}': {e}")),
        _ => Ok(default),
    }
}

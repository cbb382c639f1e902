use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for candles.
///
/// `open_block/open_log_index` and `close_block/close_log_index` record the
/// trade that set `open` and `close`, so late trades cannot regress them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Candle {
    pub chain_id: i64,
    pub campaign_address: String,
    pub timeframe: String,
    pub bucket_start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub trade_count: i64,
    pub open_block: i64,
    pub open_log_index: i64,
    pub close_block: i64,
    pub close_log_index: i64,
}

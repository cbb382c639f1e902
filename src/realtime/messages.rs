use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::aggregation::CandleChange;
use crate::models::{StatSnapshot, Trade};

/// Messages published on a campaign's channel. Consumers treat them as
/// hints; the tables stay authoritative.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeMessage {
    Trade(Trade),
    CandleUpsert(CandleUpsert),
    StatsPatch(StatSnapshot),
}

/// Bucket key plus only the fields the merge changed.
#[derive(Debug, Clone, Serialize)]
pub struct CandleUpsert {
    pub chain_id: i64,
    pub campaign_address: String,
    pub timeframe: String,
    pub bucket_start: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CandleUpsert {
    pub fn from_change(change: &CandleChange) -> Self {
        let after = &change.after;
        let mut fields = Map::new();

        let mut put = |name: &str, changed: bool, value: Value| {
            if changed {
                fields.insert(name.to_string(), value);
            }
        };

        let before = change.before.as_ref();
        put("open", before.map_or(true, |b| b.open != after.open), json_of(&after.open));
        put("high", before.map_or(true, |b| b.high != after.high), json_of(&after.high));
        put("low", before.map_or(true, |b| b.low != after.low), json_of(&after.low));
        put("close", before.map_or(true, |b| b.close != after.close), json_of(&after.close));
        put("volume", before.map_or(true, |b| b.volume != after.volume), json_of(&after.volume));
        put(
            "trade_count",
            before.map_or(true, |b| b.trade_count != after.trade_count),
            Value::from(after.trade_count),
        );

        Self {
            chain_id: after.chain_id,
            campaign_address: after.campaign_address.clone(),
            timeframe: after.timeframe.clone(),
            bucket_start: after.bucket_start,
            fields,
        }
    }
}

fn json_of<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Pub/sub channel of a campaign: `{chain_id}:{address}`.
pub fn channel_name(chain_id: i64, campaign_address: &str) -> String {
    format!("{chain_id}:{}", campaign_address.to_lowercase())
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Derived per-campaign snapshot, always recomputed from the full trade set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StatSnapshot {
    pub chain_id: i64,
    pub campaign_address: String,
    pub last_price: Option<Decimal>,
    pub net_sold: Decimal,
    pub market_cap: Option<Decimal>,
    pub rolling_volume: Decimal,
    pub updated_at: DateTime<Utc>,
}

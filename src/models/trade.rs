use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// One Buy/Sell event against a campaign. `(chain_id, tx_hash, log_index)`
/// is the idempotence key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub chain_id: i64,
    pub campaign_address: String,
    pub tx_hash: String,
    pub log_index: u64,
    pub block_number: u64,
    pub block_time: DateTime<Utc>,
    pub side: Side,
    pub wallet: String,
    /// uint256 amounts as base-10 strings.
    pub token_amount_raw: String,
    pub quote_amount_raw: String,
    pub token_amount: Decimal,
    pub quote_amount: Decimal,
    /// Quote per token; `None` when the token amount is zero.
    pub price: Option<Decimal>,
}

impl Trade {
    /// Ordering key within a chain: (block, log index).
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Price in quote per token, guarding the zero-amount case.
pub fn price_of(token_amount: Decimal, quote_amount: Decimal) -> Option<Decimal> {
    if token_amount.is_zero() {
        return None;
    }
    quote_amount.checked_div(token_amount)
}

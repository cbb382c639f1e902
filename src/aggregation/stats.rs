use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::models::{Side, StatSnapshot, Trade};

/// Recompute a campaign's snapshot from its complete trade set.
///
/// - `last_price`: price of the latest priced trade by (block, log index)
/// - `net_sold`: sum of buy token amounts minus sum of sell token amounts
/// - `market_cap`: `last_price * net_sold`, absent without a price
/// - `rolling_volume`: quote volume of trades in `(now - window, now]`
pub fn recompute_stats(
    chain_id: i64,
    campaign_address: &str,
    trades: &[Trade],
    now: DateTime<Utc>,
    window: Duration,
) -> StatSnapshot {
    let last_price = trades
        .iter()
        .filter_map(|t| t.price.map(|p| (t.position(), p)))
        .max_by_key(|(position, _)| *position)
        .map(|(_, p)| p);

    let net_sold = trades.iter().fold(Decimal::ZERO, |acc, t| match t.side {
        Side::Buy => acc + t.token_amount,
        Side::Sell => acc - t.token_amount,
    });

    let since = now - window;
    let rolling_volume = trades
        .iter()
        .filter(|t| t.block_time > since && t.block_time <= now)
        .map(|t| t.quote_amount)
        .sum();

    StatSnapshot {
        chain_id,
        campaign_address: campaign_address.to_string(),
        last_price,
        net_sold,
        market_cap: last_price.map(|p| p * net_sold),
        rolling_volume,
        updated_at: now,
    }
}

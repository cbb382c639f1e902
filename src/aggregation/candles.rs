use rust_decimal::Decimal;

use super::Timeframe;
use crate::models::{Candle, Trade};

/// A candle write, with the row as it was before the merge.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleChange {
    pub before: Option<Candle>,
    pub after: Candle,
}

/// Apply one priced trade to its bucket.
///
/// `high`, `low`, `volume` and `trade_count` always absorb the trade. `close`
/// only moves forward in (block, log index) order and `open` only backward,
/// so re-applying an older trade after a newer one cannot regress them.
pub fn merge_candle(
    existing: Option<&Candle>,
    trade: &Trade,
    price: Decimal,
    timeframe: &Timeframe,
) -> Candle {
    let block = trade.block_number as i64;
    let log_index = trade.log_index as i64;

    match existing {
        None => Candle {
            chain_id: trade.chain_id,
            campaign_address: trade.campaign_address.clone(),
            timeframe: timeframe.label().to_string(),
            bucket_start: timeframe.bucket_start(trade.block_time),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: trade.quote_amount,
            trade_count: 1,
            open_block: block,
            open_log_index: log_index,
            close_block: block,
            close_log_index: log_index,
        },
        Some(current) => {
            let mut next = current.clone();
            next.high = next.high.max(price);
            next.low = next.low.min(price);
            next.volume += trade.quote_amount;
            next.trade_count += 1;

            if (block, log_index) >= (current.close_block, current.close_log_index) {
                next.close = price;
                next.close_block = block;
                next.close_log_index = log_index;
            }
            if (block, log_index) < (current.open_block, current.open_log_index) {
                next.open = price;
                next.open_block = block;
                next.open_log_index = log_index;
            }
            next
        }
    }
}

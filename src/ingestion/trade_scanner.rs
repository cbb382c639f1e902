use chrono::{DateTime, Utc};
use metrics::counter;

use super::events::{
    decode_event, to_decimal, DomainEvent, TOKENS_PURCHASED_TOPIC, TOKENS_SOLD_TOPIC,
};
use super::{prepare_chunk, BlockTimeCache, ScanContext};
use crate::aggregation::recompute_stats;
use crate::config::ScanSettings;
use crate::db::IndexStore;
use crate::errors::{DecodeError, IndexerError};
use crate::models::cursor::trades_cursor_name;
use crate::models::trade::price_of;
use crate::models::{Campaign, Side, Trade};
use crate::rpc::{ChainLog, LogFilter, LogSource};

/// Index buy/sell events for one campaign.
///
/// Per chunk: fetch both topics, order by (block, log index), insert each
/// trade idempotently with its candle merges, recompute stats whenever the
/// chunk decoded a trade, then advance the cursor to `chunk_end + 1`. Any
/// error aborts the scan with the failed chunk's cursor untouched, so a
/// replayed chunk rewrites stats even when every trade is a duplicate.
///
/// Returns the number of newly inserted trades.
pub async fn scan_campaign<S: IndexStore, L: LogSource>(
    ctx: &ScanContext<'_, S, L>,
    campaign: &Campaign,
    block_times: &mut BlockTimeCache,
) -> Result<usize, IndexerError> {
    let cursor_name = trades_cursor_name(&campaign.address);
    let cursor = ctx.store.cursor(ctx.chain_id, &cursor_name).await?;

    let Some(window) = ctx.window(cursor, campaign.created_block()) else {
        tracing::debug!(
            chain_id = ctx.chain_id,
            campaign = %campaign.address,
            cursor,
            "Campaign up to date"
        );
        return Ok(0);
    };

    tracing::debug!(
        chain_id = ctx.chain_id,
        campaign = %campaign.address,
        from = window.from,
        to = window.to,
        mode = %ctx.mode,
        "Scanning campaign trades"
    );

    let filter = LogFilter::new(
        &campaign.address,
        vec![TOKENS_PURCHASED_TOPIC.clone(), TOKENS_SOLD_TOPIC.clone()],
    );
    let mut total_inserted = 0;

    for (from, to) in window.chunks(ctx.settings.log_chunk_size) {
        let logs = prepare_chunk(ctx.fetcher.fetch(ctx.pool, &filter, from, to).await?);
        let mut decoded = 0;
        let mut inserted = 0;

        for log in &logs {
            let block_time = block_times.resolve(ctx.pool, log).await?;
            let trade = build_trade(
                ctx.chain_id,
                &campaign.address,
                log,
                block_time,
                ctx.settings,
            )
            .map_err(|source| IndexerError::Decode {
                block: log.block_number,
                log_index: log.log_index,
                source,
            })?;
            let Some(trade) = trade else {
                continue;
            };
            decoded += 1;

            let recorded = ctx
                .store
                .record_trade(&trade, &ctx.settings.timeframes)
                .await?;
            let Some(changes) = recorded else {
                tracing::trace!(
                    tx = %trade.tx_hash,
                    log_index = trade.log_index,
                    "Trade already indexed"
                );
                continue;
            };

            inserted += 1;
            counter!("trades_inserted_total").increment(1);
            ctx.publisher.publish_trade(&trade).await;
            for change in &changes {
                ctx.publisher.publish_candle(change).await;
            }
        }

        if decoded > 0 {
            let trades = ctx
                .store
                .campaign_trades(ctx.chain_id, &campaign.address)
                .await?;
            let stats = recompute_stats(
                ctx.chain_id,
                &campaign.address,
                &trades,
                Utc::now(),
                ctx.settings.rolling_volume_window,
            );
            ctx.store.save_stats(&stats).await?;

            if inserted > 0 {
                ctx.publisher.publish_stats(&stats).await;
                tracing::info!(
                    chain_id = ctx.chain_id,
                    campaign = %campaign.address,
                    from,
                    to,
                    inserted,
                    "Trades indexed"
                );
            }
        }

        ctx.store.advance_cursor(ctx.chain_id, &cursor_name, to + 1).await?;
        total_inserted += inserted;
    }

    Ok(total_inserted)
}

/// Decode a campaign log into a [`Trade`]. Creation events are not trades
/// and yield `None`.
pub fn build_trade(
    chain_id: i64,
    campaign_address: &str,
    log: &ChainLog,
    block_time: DateTime<Utc>,
    settings: &ScanSettings,
) -> Result<Option<Trade>, DecodeError> {
    let (side, wallet, token_raw, quote_raw) = match decode_event(log)? {
        DomainEvent::Buy { wallet, token_amount_out, quote_cost } => {
            (Side::Buy, wallet, token_amount_out, quote_cost)
        }
        DomainEvent::Sell { wallet, token_amount_in, quote_payout } => {
            (Side::Sell, wallet, token_amount_in, quote_payout)
        }
        DomainEvent::CampaignCreated { .. } => return Ok(None),
    };

    let token_amount = to_decimal(token_raw, settings.token_decimals)?;
    let quote_amount = to_decimal(quote_raw, settings.quote_decimals)?;

    Ok(Some(Trade {
        chain_id,
        campaign_address: campaign_address.to_lowercase(),
        tx_hash: log.tx_hash.to_lowercase(),
        log_index: log.log_index,
        block_number: log.block_number,
        block_time,
        side,
        wallet,
        token_amount_raw: token_raw.to_string(),
        quote_amount_raw: quote_raw.to_string(),
        token_amount,
        quote_amount,
        price: price_of(token_amount, quote_amount),
    }))
}

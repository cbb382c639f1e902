use metrics::counter;

use super::events::{decode_event, DomainEvent, CAMPAIGN_CREATED_TOPIC};
use super::{prepare_chunk, ScanContext};
use crate::config::ChainConfig;
use crate::db::IndexStore;
use crate::errors::IndexerError;
use crate::models::cursor::registry_cursor_name;
use crate::models::NewCampaign;
use crate::rpc::{LogFilter, LogSource};

/// Discover campaigns from the factory's creation events.
///
/// The cursor advances after every chunk, so a failure loses at most the
/// chunk in flight. Returns how many creation events were applied.
pub async fn scan_registry<S: IndexStore, L: LogSource>(
    ctx: &ScanContext<'_, S, L>,
    chain: &ChainConfig,
) -> Result<usize, IndexerError> {
    let cursor_name = registry_cursor_name(&chain.factory_address);
    let cursor = ctx.store.cursor(ctx.chain_id, &cursor_name).await?;

    let Some(window) = ctx.window(cursor, chain.known_start_block()) else {
        tracing::debug!(
            chain_id = ctx.chain_id,
            cursor,
            target = ctx.head.target,
            "Registry up to date"
        );
        return Ok(0);
    };

    tracing::info!(
        chain_id = ctx.chain_id,
        factory = %chain.factory_address,
        from = window.from,
        to = window.to,
        mode = %ctx.mode,
        "Scanning registry"
    );

    let filter = LogFilter::new(&chain.factory_address, vec![CAMPAIGN_CREATED_TOPIC.clone()]);
    let mut discovered = 0;

    for (from, to) in window.chunks(ctx.settings.log_chunk_size) {
        let logs = prepare_chunk(ctx.fetcher.fetch(ctx.pool, &filter, from, to).await?);

        for log in &logs {
            let event = decode_event(log).map_err(|source| IndexerError::Decode {
                block: log.block_number,
                log_index: log.log_index,
                source,
            })?;

            let DomainEvent::CampaignCreated {
                campaign,
                token,
                creator,
                name,
                symbol,
            } = event
            else {
                continue;
            };

            let stored = ctx
                .store
                .upsert_campaign(&NewCampaign {
                    chain_id: ctx.chain_id,
                    address: campaign,
                    token_address: token,
                    creator_address: creator,
                    name,
                    symbol,
                    created_block: log.block_number,
                })
                .await?;

            tracing::info!(
                chain_id = ctx.chain_id,
                campaign = %stored.address,
                symbol = %stored.symbol,
                created_block = stored.created_block,
                "Campaign discovered"
            );
            counter!("campaigns_discovered_total").increment(1);
            discovered += 1;
        }

        ctx.store.advance_cursor(ctx.chain_id, &cursor_name, to + 1).await?;
    }

    Ok(discovered)
}

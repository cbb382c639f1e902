use sqlx::PgPool;

use crate::models::{Campaign, NewCampaign};

const CAMPAIGN_COLUMNS: &str =
    "chain_id, address, token_address, creator_address, name, symbol, created_block, is_active";

/// Insert or refresh a campaign from its creation event.
///
/// Descriptive fields overwrite; `created_block` keeps the earliest non-zero
/// value. `is_active` is left alone on conflict.
pub async fn upsert_campaign(pool: &PgPool, campaign: &NewCampaign) -> anyhow::Result<Campaign> {
    let row = sqlx::query_as::<_, Campaign>(&format!(
        r#"
        INSERT INTO campaigns
            (chain_id, address, token_address, creator_address, name, symbol, created_block)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (chain_id, address) DO UPDATE
        SET token_address = EXCLUDED.token_address,
            creator_address = EXCLUDED.creator_address,
            name = EXCLUDED.name,
            symbol = EXCLUDED.symbol,
            created_block = CASE
                WHEN campaigns.created_block = 0 THEN EXCLUDED.created_block
                WHEN EXCLUDED.created_block = 0 THEN campaigns.created_block
                ELSE LEAST(campaigns.created_block, EXCLUDED.created_block)
            END,
            updated_at = NOW()
        RETURNING {CAMPAIGN_COLUMNS}
        "#
    ))
    .bind(campaign.chain_id)
    .bind(&campaign.address)
    .bind(&campaign.token_address)
    .bind(&campaign.creator_address)
    .bind(&campaign.name)
    .bind(&campaign.symbol)
    .bind(campaign.created_block as i64)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Active campaigns of a chain, oldest first.
pub async fn get_active_campaigns(pool: &PgPool, chain_id: i64) -> anyhow::Result<Vec<Campaign>> {
    let rows = sqlx::query_as::<_, Campaign>(&format!(
        r#"
        SELECT {CAMPAIGN_COLUMNS} FROM campaigns
        WHERE chain_id = $1 AND is_active = true
        ORDER BY created_block ASC, address ASC
        "#
    ))
    .bind(chain_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

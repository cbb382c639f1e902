use sqlx::PgPool;

use crate::models::StatSnapshot;

/// Replace a campaign's stats row with a freshly recomputed snapshot.
pub async fn upsert_stats(pool: &PgPool, stats: &StatSnapshot) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stats
            (chain_id, campaign_address, last_price, net_sold,
             market_cap, rolling_volume, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (chain_id, campaign_address) DO UPDATE
        SET last_price = EXCLUDED.last_price,
            net_sold = EXCLUDED.net_sold,
            market_cap = EXCLUDED.market_cap,
            rolling_volume = EXCLUDED.rolling_volume,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(stats.chain_id)
    .bind(&stats.campaign_address)
    .bind(stats.last_price)
    .bind(stats.net_sold)
    .bind(stats.market_cap)
    .bind(stats.rolling_volume)
    .bind(stats.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a campaign's stats row.
pub async fn get_stats(
    pool: &PgPool,
    chain_id: i64,
    campaign_address: &str,
) -> anyhow::Result<Option<StatSnapshot>> {
    let row = sqlx::query_as::<_, StatSnapshot>(
        r#"
        SELECT chain_id, campaign_address, last_price, net_sold, market_cap,
               rolling_volume, updated_at
        FROM stats WHERE chain_id = $1 AND campaign_address = $2
        "#,
    )
    .bind(chain_id)
    .bind(campaign_address)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

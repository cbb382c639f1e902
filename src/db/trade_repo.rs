use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};

use crate::models::{Side, Trade};

#[derive(Debug, FromRow)]
struct TradeRow {
    chain_id: i64,
    campaign_address: String,
    tx_hash: String,
    log_index: i64,
    block_number: i64,
    block_time: DateTime<Utc>,
    side: String,
    wallet: String,
    token_amount_raw: String,
    quote_amount_raw: String,
    token_amount: Decimal,
    quote_amount: Decimal,
    price: Option<Decimal>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = anyhow::Error;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let side = Side::from_db_str(&row.side)
            .ok_or_else(|| anyhow::anyhow!("unknown trade side '{}'", row.side))?;
        Ok(Trade {
            chain_id: row.chain_id,
            campaign_address: row.campaign_address,
            tx_hash: row.tx_hash,
            log_index: row.log_index as u64,
            block_number: row.block_number as u64,
            block_time: row.block_time,
            side,
            wallet: row.wallet,
            token_amount_raw: row.token_amount_raw,
            quote_amount_raw: row.quote_amount_raw,
            token_amount: row.token_amount,
            quote_amount: row.quote_amount,
            price: row.price,
        })
    }
}

/// Insert a trade unless its `(chain_id, tx_hash, log_index)` already exists.
/// Returns whether a row was written.
pub async fn insert_trade(conn: &mut PgConnection, trade: &Trade) -> anyhow::Result<bool> {
    let inserted: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO trades (
            chain_id, campaign_address, tx_hash, log_index, block_number, block_time,
            side, wallet, token_amount_raw, quote_amount_raw, token_amount, quote_amount, price
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::numeric, $10::numeric, $11, $12, $13)
        ON CONFLICT (chain_id, tx_hash, log_index) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(trade.chain_id)
    .bind(&trade.campaign_address)
    .bind(&trade.tx_hash)
    .bind(trade.log_index as i64)
    .bind(trade.block_number as i64)
    .bind(trade.block_time)
    .bind(trade.side.as_str())
    .bind(&trade.wallet)
    .bind(&trade.token_amount_raw)
    .bind(&trade.quote_amount_raw)
    .bind(trade.token_amount)
    .bind(trade.quote_amount)
    .bind(trade.price)
    .fetch_optional(conn)
    .await?;

    Ok(inserted.is_some())
}

/// All trades of a campaign in chain order.
pub async fn get_trades_by_campaign(
    pool: &PgPool,
    chain_id: i64,
    campaign_address: &str,
) -> anyhow::Result<Vec<Trade>> {
    let rows = sqlx::query_as::<_, TradeRow>(
        r#"
        SELECT chain_id, campaign_address, tx_hash, log_index, block_number, block_time,
               side, wallet, token_amount_raw::text AS token_amount_raw,
               quote_amount_raw::text AS quote_amount_raw,
               token_amount, quote_amount, price
        FROM trades
        WHERE chain_id = $1 AND campaign_address = $2
        ORDER BY block_number ASC, log_index ASC
        "#,
    )
    .bind(chain_id)
    .bind(campaign_address)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Trade::try_from).collect()
}

/// Count trades of a campaign.
pub async fn count_trades(
    pool: &PgPool,
    chain_id: i64,
    campaign_address: &str,
) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM trades WHERE chain_id = $1 AND campaign_address = $2",
    )
    .bind(chain_id)
    .bind(campaign_address)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::aggregation::{merge_candle, CandleChange, Timeframe};
use crate::models::{Candle, Trade};

const CANDLE_COLUMNS: &str = "chain_id, campaign_address, timeframe, bucket_start, \
     open, high, low, close, volume, trade_count, \
     open_block, open_log_index, close_block, close_log_index";

/// Merge a priced trade into its bucket under a row lock.
///
/// Must run inside a transaction: the bucket is read `FOR UPDATE`, merged in
/// memory and written back before the lock is released.
pub async fn apply_trade(
    conn: &mut PgConnection,
    trade: &Trade,
    price: Decimal,
    timeframe: &Timeframe,
) -> anyhow::Result<CandleChange> {
    let bucket_start = timeframe.bucket_start(trade.block_time);

    let existing = lock_candle(conn, trade, timeframe, bucket_start).await?;
    let merged = merge_candle(existing.as_ref(), trade, price, timeframe);

    if existing.is_some() {
        update_candle(conn, &merged).await?;
        return Ok(CandleChange {
            before: existing,
            after: merged,
        });
    }

    if insert_candle(conn, &merged).await? {
        return Ok(CandleChange {
            before: None,
            after: merged,
        });
    }

    // Another writer created the bucket between our read and insert.
    let current = lock_candle(conn, trade, timeframe, bucket_start)
        .await?
        .ok_or_else(|| anyhow::anyhow!("candle row disappeared during merge"))?;
    let merged = merge_candle(Some(&current), trade, price, timeframe);
    update_candle(conn, &merged).await?;

    Ok(CandleChange {
        before: Some(current),
        after: merged,
    })
}

async fn lock_candle(
    conn: &mut PgConnection,
    trade: &Trade,
    timeframe: &Timeframe,
    bucket_start: DateTime<Utc>,
) -> anyhow::Result<Option<Candle>> {
    let candle = sqlx::query_as::<_, Candle>(&format!(
        r#"
        SELECT {CANDLE_COLUMNS} FROM candles
        WHERE chain_id = $1 AND campaign_address = $2 AND timeframe = $3 AND bucket_start = $4
        FOR UPDATE
        "#
    ))
    .bind(trade.chain_id)
    .bind(&trade.campaign_address)
    .bind(timeframe.label())
    .bind(bucket_start)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(candle)
}

async fn insert_candle(conn: &mut PgConnection, candle: &Candle) -> anyhow::Result<bool> {
    let result = sqlx::query(&format!(
        r#"
        INSERT INTO candles ({CANDLE_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (chain_id, campaign_address, timeframe, bucket_start) DO NOTHING
        "#
    ))
    .bind(candle.chain_id)
    .bind(&candle.campaign_address)
    .bind(&candle.timeframe)
    .bind(candle.bucket_start)
    .bind(candle.open)
    .bind(candle.high)
    .bind(candle.low)
    .bind(candle.close)
    .bind(candle.volume)
    .bind(candle.trade_count)
    .bind(candle.open_block)
    .bind(candle.open_log_index)
    .bind(candle.close_block)
    .bind(candle.close_log_index)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn update_candle(conn: &mut PgConnection, candle: &Candle) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE candles
        SET open = $5, high = $6, low = $7, close = $8,
            volume = $9, trade_count = $10,
            open_block = $11, open_log_index = $12,
            close_block = $13, close_log_index = $14,
            updated_at = NOW()
        WHERE chain_id = $1 AND campaign_address = $2 AND timeframe = $3 AND bucket_start = $4
        "#,
    )
    .bind(candle.chain_id)
    .bind(&candle.campaign_address)
    .bind(&candle.timeframe)
    .bind(candle.bucket_start)
    .bind(candle.open)
    .bind(candle.high)
    .bind(candle.low)
    .bind(candle.close)
    .bind(candle.volume)
    .bind(candle.trade_count)
    .bind(candle.open_block)
    .bind(candle.open_log_index)
    .bind(candle.close_block)
    .bind(candle.close_log_index)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Candles of one campaign and timeframe, oldest bucket first.
pub async fn get_candles(
    pool: &PgPool,
    chain_id: i64,
    campaign_address: &str,
    timeframe: &str,
) -> anyhow::Result<Vec<Candle>> {
    let rows = sqlx::query_as::<_, Candle>(&format!(
        r#"
        SELECT {CANDLE_COLUMNS} FROM candles
        WHERE chain_id = $1 AND campaign_address = $2 AND timeframe = $3
        ORDER BY bucket_start ASC
        "#
    ))
    .bind(chain_id)
    .bind(campaign_address)
    .bind(timeframe)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

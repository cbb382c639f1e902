use sqlx::PgPool;

use crate::models::ChainCursor;

/// Stored cursor for `(chain_id, name)`, 0 when the stream never ran.
pub async fn get_cursor(pool: &PgPool, chain_id: i64, name: &str) -> anyhow::Result<u64> {
    let cursor = sqlx::query_as::<_, ChainCursor>(
        r#"
        SELECT chain_id, cursor_name, last_indexed_block
        FROM chain_cursor WHERE chain_id = $1 AND cursor_name = $2
        "#,
    )
    .bind(chain_id)
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(cursor.map_or(0, |c| c.last_indexed_block.max(0) as u64))
}

/// Max-merge the cursor in a single upsert and return the stored value.
pub async fn advance_cursor(
    pool: &PgPool,
    chain_id: i64,
    name: &str,
    candidate: u64,
) -> anyhow::Result<u64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO chain_cursor (chain_id, cursor_name, last_indexed_block, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (chain_id, cursor_name) DO UPDATE
        SET last_indexed_block =
                GREATEST(chain_cursor.last_indexed_block, EXCLUDED.last_indexed_block),
            updated_at = NOW()
        RETURNING last_indexed_block
        "#,
    )
    .bind(chain_id)
    .bind(name)
    .bind(candidate as i64)
    .fetch_one(pool)
    .await?;

    Ok(row.0 as u64)
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for chain_cursor. `last_indexed_block` is the next block a
/// scan stream will start from.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChainCursor {
    pub chain_id: i64,
    pub cursor_name: String,
    pub last_indexed_block: i64,
}

/// Cursor name of the registry (campaign discovery) stream.
pub fn registry_cursor_name(factory: &str) -> String {
    format!("registry:{}", factory.to_lowercase())
}

/// Cursor name of one campaign's trade stream.
pub fn trades_cursor_name(campaign: &str) -> String {
    format!("trades:{}", campaign.to_lowercase())
}

/// Max-merge: a cursor never moves backward.
pub fn merge_cursor(existing: Option<u64>, candidate: u64) -> u64 {
    existing.map_or(candidate, |current| current.max(candidate))
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for campaigns. `created_block = 0` means "not known yet".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub chain_id: i64,
    pub address: String,
    pub token_address: String,
    pub creator_address: String,
    pub name: String,
    pub symbol: String,
    pub created_block: i64,
    pub is_active: bool,
}

impl Campaign {
    pub fn created_block(&self) -> Option<u64> {
        (self.created_block > 0).then_some(self.created_block as u64)
    }
}

/// A campaign as announced by a creation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCampaign {
    pub chain_id: i64,
    pub address: String,
    pub token_address: String,
    pub creator_address: String,
    pub name: String,
    pub symbol: String,
    pub created_block: u64,
}

/// Reconcile the creation block: zero is unknown, otherwise the earliest wins.
pub fn merge_created_block(existing: u64, incoming: u64) -> u64 {
    match (existing, incoming) {
        (0, b) => b,
        (a, 0) => a,
        (a, b) => a.min(b),
    }
}

pub mod client;
pub mod fetcher;
pub mod pool;
pub mod types;

pub use client::JsonRpcClient;
pub use fetcher::{FetchPolicy, RangeFetcher};
pub use pool::{Endpoint, ProviderPool};
pub use types::{ChainLog, LogFilter};

use crate::errors::RpcError;

/// One log-source endpoint: the three calls the indexer needs.
#[allow(async_fn_in_trait)]
pub trait LogSource {
    async fn block_number(&self) -> Result<u64, RpcError>;

    async fn get_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>, RpcError>;

    /// Unix timestamp (seconds) of block `number`.
    async fn block_timestamp(&self, number: u64) -> Result<u64, RpcError>;
}

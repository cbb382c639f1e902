use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::errors::RpcError;
use crate::rpc::{ChainLog, LogSource, ProviderPool};

/// Block timestamps resolved during one pass, keyed by block number.
#[derive(Debug, Default)]
pub struct BlockTimeCache {
    times: HashMap<u64, DateTime<Utc>>,
}

impl BlockTimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the block containing `log`: cached, attached to the log,
    /// or fetched through the pool.
    pub async fn resolve<L: LogSource>(
        &mut self,
        pool: &ProviderPool<L>,
        log: &ChainLog,
    ) -> Result<DateTime<Utc>, RpcError> {
        if let Some(ts) = self.times.get(&log.block_number) {
            return Ok(*ts);
        }

        let secs = match log.block_timestamp {
            Some(secs) => secs,
            None => pool.block_timestamp(log.block_number).await?,
        };
        let ts = i64::try_from(secs)
            .ok()
            .and_then(|s| DateTime::from_timestamp(s, 0))
            .ok_or_else(|| {
                RpcError::InvalidResponse(format!(
                    "block {} has invalid timestamp {secs}",
                    log.block_number
                ))
            })?;

        self.times.insert(log.block_number, ts);
        Ok(ts)
    }
}

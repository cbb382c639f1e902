use std::time::Duration;

use metrics::counter;
use rand::Rng;
use tokio::time::sleep;

use super::{ChainLog, LogFilter, LogSource, ProviderPool};
use crate::errors::RpcError;

/// Limits for range splitting and rate-limit backoff.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Ranges of at most this many blocks are never split.
    pub min_chunk_floor: u64,
    pub max_split_depth: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_backoff_attempts: u32,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            min_chunk_floor: 10,
            max_split_depth: 12,
            initial_backoff: Duration::from_millis(750),
            max_backoff: Duration::from_secs(15),
            max_backoff_attempts: 6,
        }
    }
}

/// Fetches logs for a block range, bisecting the range on rate limits and
/// backing off once it cannot split further.
#[derive(Debug, Clone, Default)]
pub struct RangeFetcher {
    policy: FetchPolicy,
}

impl RangeFetcher {
    pub fn new(policy: FetchPolicy) -> Self {
        Self { policy }
    }

    /// Fetch `[from_block, to_block]` through the pool. A rate limit that
    /// survives splitting and backoff, or a pruned range, moves the whole
    /// range on to the next endpoint.
    pub async fn fetch<L: LogSource>(
        &self,
        pool: &ProviderPool<L>,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>, RpcError> {
        let logs = pool
            .with_rotation("eth_getLogs", |source| {
                self.fetch_logs(source, filter, from_block, to_block)
            })
            .await?;
        counter!("logs_fetched_total").increment(logs.len() as u64);
        Ok(logs)
    }

    /// Fetch `[from_block, to_block]` from a single endpoint.
    ///
    /// Sub-ranges live on an explicit stack with the left half on top, so the
    /// output is in ascending block-range order.
    pub async fn fetch_logs<L: LogSource>(
        &self,
        source: &L,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>, RpcError> {
        let floor = self.policy.min_chunk_floor.max(1);
        let mut logs = Vec::new();
        let mut pending = vec![(from_block, to_block, 0u32)];

        while let Some((lo, hi, depth)) = pending.pop() {
            match source.get_logs(filter, lo, hi).await {
                Ok(batch) => logs.extend(batch),
                Err(e) if e.is_rate_limit() => {
                    let span = hi - lo + 1;
                    if span > floor && depth < self.policy.max_split_depth {
                        let mid = lo + (hi - lo) / 2;
                        tracing::debug!(
                            from = lo,
                            to = hi,
                            mid,
                            depth,
                            "Rate limited, splitting range"
                        );
                        counter!("rpc_range_splits_total").increment(1);
                        pending.push((mid + 1, hi, depth + 1));
                        pending.push((lo, mid, depth + 1));
                    } else {
                        let batch = self.backoff_retry(source, filter, lo, hi, e).await?;
                        logs.extend(batch);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(logs)
    }

    async fn backoff_retry<L: LogSource>(
        &self,
        source: &L,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
        first_error: RpcError,
    ) -> Result<Vec<ChainLog>, RpcError> {
        let mut delay = self.policy.initial_backoff;
        let mut last_error = first_error;

        for attempt in 1..=self.policy.max_backoff_attempts {
            let wait = jittered(delay).min(self.policy.max_backoff);
            tracing::debug!(
                from = from_block,
                to = to_block,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "Rate limited at split floor, backing off"
            );
            counter!("rpc_backoff_retries_total").increment(1);
            sleep(wait).await;

            match source.get_logs(filter, from_block, to_block).await {
                Ok(logs) => return Ok(logs),
                Err(e) if e.is_rate_limit() => {
                    last_error = e;
                    delay = (delay * 2).min(self.policy.max_backoff);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

/// Scale `delay` by a random factor in [0.8, 1.2).
fn jittered(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..1.2);
    delay.mul_f64(factor)
}

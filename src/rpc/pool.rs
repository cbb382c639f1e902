use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;

use super::LogSource;
use crate::errors::RpcError;

/// A labelled log-source endpoint. The label is what shows up in logs.
#[derive(Debug, Clone)]
pub struct Endpoint<L> {
    pub label: String,
    pub source: L,
}

impl<L> Endpoint<L> {
    pub fn new(label: impl Into<String>, source: L) -> Self {
        Self {
            label: label.into(),
            source,
        }
    }
}

/// Ordered endpoints for one chain with round-robin failover.
///
/// The only state is the rotation index; a pool is built per pass.
#[derive(Debug)]
pub struct ProviderPool<L> {
    chain_id: i64,
    endpoints: Vec<Endpoint<L>>,
    current: AtomicUsize,
}

impl<L> ProviderPool<L> {
    pub fn new(chain_id: i64, endpoints: Vec<Endpoint<L>>) -> Self {
        Self {
            chain_id,
            endpoints,
            current: AtomicUsize::new(0),
        }
    }

    /// Label of the endpoint the next call will hit.
    pub fn current_label(&self) -> Option<&str> {
        if self.endpoints.is_empty() {
            return None;
        }
        let idx = self.current.load(Ordering::Relaxed) % self.endpoints.len();
        Some(&self.endpoints[idx].label)
    }

    /// Run `op` against the current endpoint, rotating on rate-limit,
    /// transport and pruned-history failures for at most `2 * len` attempts.
    /// Any other error is returned as-is without rotating.
    pub async fn with_rotation<'a, T, F, Fut>(
        &'a self,
        operation: &str,
        mut op: F,
    ) -> Result<T, RpcError>
    where
        F: FnMut(&'a L) -> Fut,
        Fut: Future<Output = Result<T, RpcError>> + 'a,
    {
        let count = self.endpoints.len();
        if count == 0 {
            return Err(RpcError::NoEndpoints);
        }

        let max_attempts = 2 * count;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let idx = self.current.load(Ordering::Relaxed) % count;
            let endpoint = &self.endpoints[idx];

            match op(&endpoint.source).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rotatable() => {
                    let next = (idx + 1) % count;
                    tracing::warn!(
                        chain_id = self.chain_id,
                        endpoint = %endpoint.label,
                        next_endpoint = %self.endpoints[next].label,
                        operation,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Endpoint failed, rotating"
                    );
                    counter!("rpc_rotations_total").increment(1);
                    self.current.store(next, Ordering::Relaxed);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(RpcError::EndpointsExhausted {
            attempts: max_attempts,
            last: Box::new(last_error.unwrap_or(RpcError::NoEndpoints)),
        })
    }
}

impl<L: LogSource> ProviderPool<L> {
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        self.with_rotation("eth_blockNumber", |source| source.block_number())
            .await
    }

    pub async fn block_timestamp(&self, number: u64) -> Result<u64, RpcError> {
        self.with_rotation("eth_getBlockByNumber", |source| {
            source.block_timestamp(number)
        })
        .await
    }
}

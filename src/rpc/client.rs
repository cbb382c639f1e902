use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{parse_hex_u64, ChainLog, LogFilter, RawBlock, RawLog};
use super::LogSource;
use crate::errors::RpcError;

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC over HTTP against a single endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Build the shared HTTP client used by every endpoint.
    pub fn http_client(timeout: Duration) -> Result<Client, RpcError> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let resp = self.http.post(&self.url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RpcError::classify(
                i64::from(status.as_u16()),
                &format!("HTTP {status}: {text}"),
            ));
        }

        let envelope: RpcEnvelope<T> = resp.json().await?;
        if let Some(err) = envelope.error {
            return Err(RpcError::classify(err.code, &err.message));
        }
        envelope
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method}: empty result")))
    }
}

impl LogSource for JsonRpcClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let hex: String = self.call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&hex)
    }

    async fn get_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>, RpcError> {
        let raw: Vec<RawLog> = self
            .call("eth_getLogs", filter.to_params(from_block, to_block))
            .await?;
        raw.into_iter().map(ChainLog::try_from).collect()
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, RpcError> {
        let block: RawBlock = self
            .call(
                "eth_getBlockByNumber",
                json!([format!("{number:#x}"), false]),
            )
            .await?;
        parse_hex_u64(&block.timestamp)
    }
}

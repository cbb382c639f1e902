use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::RpcError;

/// `eth_getLogs` filter minus the block range: one contract, any of
/// `topics` in position 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: String,
    pub topics: Vec<String>,
}

impl LogFilter {
    pub fn new(address: &str, topics: Vec<String>) -> Self {
        Self {
            address: address.to_lowercase(),
            topics,
        }
    }

    pub fn to_params(&self, from_block: u64, to_block: u64) -> Value {
        json!([{
            "address": self.address,
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
            "topics": [self.topics],
        }])
    }
}

/// A log as returned by `eth_getLogs`, with hex quantities parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
    /// Some providers attach the block timestamp to each log.
    pub block_timestamp: Option<u64>,
    pub removed: bool,
}

impl ChainLog {
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
    block_number: Option<String>,
    log_index: Option<String>,
    transaction_hash: Option<String>,
    block_timestamp: Option<String>,
    #[serde(default)]
    removed: bool,
}

impl TryFrom<RawLog> for ChainLog {
    type Error = RpcError;

    fn try_from(raw: RawLog) -> Result<Self, Self::Error> {
        let block_number = raw
            .block_number
            .as_deref()
            .ok_or_else(|| RpcError::InvalidResponse("log without blockNumber".into()))
            .and_then(parse_hex_u64)?;
        let log_index = raw
            .log_index
            .as_deref()
            .ok_or_else(|| RpcError::InvalidResponse("log without logIndex".into()))
            .and_then(parse_hex_u64)?;
        let tx_hash = raw
            .transaction_hash
            .ok_or_else(|| RpcError::InvalidResponse("log without transactionHash".into()))?;
        let block_timestamp = raw
            .block_timestamp
            .as_deref()
            .map(parse_hex_u64)
            .transpose()?;

        Ok(ChainLog {
            address: raw.address.to_lowercase(),
            topics: raw.topics.into_iter().map(|t| t.to_lowercase()).collect(),
            data: raw.data,
            block_number,
            log_index,
            tx_hash: tx_hash.to_lowercase(),
            block_timestamp,
            removed: raw.removed,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBlock {
    pub timestamp: String,
}

/// Parse a `0x`-prefixed JSON-RPC quantity.
pub fn parse_hex_u64(s: &str) -> Result<u64, RpcError> {
    let hex = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(hex, 16)
        .map_err(|_| RpcError::InvalidResponse(format!("invalid quantity '{s}'")))
}

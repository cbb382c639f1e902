use thiserror::Error;

/// Failure talking to a log-source endpoint, classified by how the caller
/// should react to it.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("history pruned: {0}")]
    PrunedHistory(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("all endpoints exhausted after {attempts} attempts: {last}")]
    EndpointsExhausted { attempts: usize, last: Box<RpcError> },

    #[error("no endpoints configured")]
    NoEndpoints,
}

impl RpcError {
    /// Map a JSON-RPC error object (or an HTTP status folded into `code`)
    /// onto the failure taxonomy.
    pub fn classify(code: i64, message: &str) -> Self {
        let lower = message.to_lowercase();

        if code == 429 || code == -32005 || is_rate_limit_text(&lower) {
            return RpcError::RateLimited(message.to_string());
        }
        if is_pruned_text(&lower) {
            return RpcError::PrunedHistory(message.to_string());
        }
        if code == 408 || (500..=599).contains(&code) || is_transport_text(&lower) {
            return RpcError::Transport(message.to_string());
        }

        RpcError::Rpc {
            code,
            message: message.to_string(),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RpcError::RateLimited(_))
    }

    pub fn is_pruned(&self) -> bool {
        matches!(self, RpcError::PrunedHistory(_))
    }

    /// Errors that justify moving on to the next endpoint.
    pub fn is_rotatable(&self) -> bool {
        matches!(
            self,
            RpcError::RateLimited(_) | RpcError::Transport(_) | RpcError::PrunedHistory(_)
        )
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return RpcError::classify(i64::from(status.as_u16()), &e.to_string());
        }
        if e.is_decode() {
            return RpcError::InvalidResponse(e.to_string());
        }
        RpcError::Transport(e.to_string())
    }
}

fn is_rate_limit_text(lower: &str) -> bool {
    [
        "rate limit",
        "too many requests",
        "limit exceeded",
        "exceeds the range",
        "exceed maximum block range",
        "block range too wide",
        "range is too large",
        "range too large",
        "more than 10000 results",
        "query returned more than",
        "response size exceeded",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

fn is_pruned_text(lower: &str) -> bool {
    [
        "pruned",
        "missing trie node",
        "history not available",
        "history is not available",
        "ancient block",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

fn is_transport_text(lower: &str) -> bool {
    [
        "bad gateway",
        "gateway timeout",
        "service unavailable",
        "timed out",
        "timeout",
        "connection reset",
        "econnreset",
        "connection refused",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// A log that does not match the fixed event schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("log has no topics")]
    MissingTopic,

    #[error("unknown event topic {0}")]
    UnknownTopic(String),

    #[error("expected {expected} topics, got {actual}")]
    TopicCount { expected: usize, actual: usize },

    #[error("data too short: need {needed} bytes, got {actual}")]
    DataTooShort { needed: usize, actual: usize },

    #[error("invalid hex in {field}")]
    InvalidHex { field: &'static str },

    #[error("invalid string encoding in {field}")]
    InvalidString { field: &'static str },

    #[error("amount {raw} does not fit a decimal with {decimals} places")]
    AmountOverflow { raw: String, decimals: u32 },
}

/// Failure of a scan step. Any of these aborts the current chunk without
/// advancing its cursor.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("decode failed at block {block} log {log_index}: {source}")]
    Decode {
        block: u64,
        log_index: u64,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

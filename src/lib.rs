pub mod aggregation;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod realtime;
pub mod rpc;
pub mod services;

use crate::config::AppConfig;
use crate::ingestion::ChainSource;
use crate::rpc::{Endpoint, JsonRpcClient};

/// Build the JSON-RPC endpoints for every configured chain, in order.
pub fn build_chain_sources(config: &AppConfig) -> anyhow::Result<Vec<ChainSource<JsonRpcClient>>> {
    let http = JsonRpcClient::http_client(config.rpc_timeout)?;

    Ok(config
        .chains
        .iter()
        .map(|chain| ChainSource {
            chain: chain.clone(),
            endpoints: chain
                .rpc_urls
                .iter()
                .enumerate()
                .map(|(i, url)| {
                    Endpoint::new(
                        crate::config::endpoint_label(url, i),
                        JsonRpcClient::new(http.clone(), url.clone()),
                    )
                })
                .collect(),
        })
        .collect())
}

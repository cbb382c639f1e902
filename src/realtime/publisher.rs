use metrics::counter;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::broadcast;

use super::messages::{channel_name, CandleUpsert, RealtimeMessage};
use crate::aggregation::CandleChange;
use crate::models::{StatSnapshot, Trade};

/// A message addressed to one campaign channel.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: String,
    pub message: RealtimeMessage,
}

/// Best-effort fan-out of trade, candle and stats deltas. Failures are
/// logged and never reach the caller.
#[derive(Clone)]
pub enum RealtimePublisher {
    /// Redis `PUBLISH` on the campaign channel.
    Redis(ConnectionManager),
    /// In-process broadcast for local subscribers.
    Broadcast(broadcast::Sender<Delivery>),
}

impl RealtimePublisher {
    pub async fn connect_redis(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis for realtime publishing");
        Ok(RealtimePublisher::Redis(manager))
    }

    pub fn broadcast(capacity: usize) -> (Self, broadcast::Receiver<Delivery>) {
        let (tx, rx) = broadcast::channel(capacity);
        (RealtimePublisher::Broadcast(tx), rx)
    }

    pub async fn publish_trade(&self, trade: &Trade) {
        self.publish(
            channel_name(trade.chain_id, &trade.campaign_address),
            RealtimeMessage::Trade(trade.clone()),
        )
        .await;
    }

    pub async fn publish_candle(&self, change: &CandleChange) {
        let upsert = CandleUpsert::from_change(change);
        if upsert.fields.is_empty() {
            return;
        }
        self.publish(
            channel_name(upsert.chain_id, &upsert.campaign_address),
            RealtimeMessage::CandleUpsert(upsert),
        )
        .await;
    }

    pub async fn publish_stats(&self, stats: &StatSnapshot) {
        self.publish(
            channel_name(stats.chain_id, &stats.campaign_address),
            RealtimeMessage::StatsPatch(stats.clone()),
        )
        .await;
    }

    async fn publish(&self, channel: String, message: RealtimeMessage) {
        match self {
            RealtimePublisher::Redis(manager) => {
                let payload = match serde_json::to_string(&message) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            channel = %channel,
                            "Failed to encode realtime message"
                        );
                        return;
                    }
                };
                let mut conn = manager.clone();
                let result: redis::RedisResult<i64> = conn.publish(&channel, payload).await;
                if let Err(e) = result {
                    counter!("realtime_publish_failures_total").increment(1);
                    tracing::warn!(error = %e, channel = %channel, "Realtime publish failed");
                }
            }
            RealtimePublisher::Broadcast(tx) => {
                // No subscribers is not an error.
                if tx.send(Delivery { channel, message }).is_err() {
                    tracing::trace!("Realtime broadcast has no subscribers");
                }
            }
        }
    }
}

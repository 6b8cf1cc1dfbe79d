//! The `schedule` pub/sub channel: the orchestrator publishes
//! `ScheduleInfo`, the scheduler subscribes and rebuilds its host pool
//! on every message.

use rb_protocol::rest::ScheduleInfo;
use tokio::sync::broadcast;

use crate::RegistryError;

pub const CHANNEL_NAME: &str = "schedule";

/// In-process channel backed by `tokio::sync::broadcast`, used by
/// single-process deployments and tests where the orchestrator and
/// scheduler share an address space.
#[derive(Clone)]
pub struct MemoryScheduleChannel {
    tx: broadcast::Sender<ScheduleInfo>,
}

impl MemoryScheduleChannel {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    pub fn publish(&self, info: ScheduleInfo) {
        // No active subscribers is not an error: the orchestrator
        // publishes on a fixed 30s cadence regardless of who's
        // listening yet.
        let _ = self.tx.send(info);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleInfo> {
        self.tx.subscribe()
    }
}

impl Default for MemoryScheduleChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Redis-backed channel for multi-process deployments: `PUBLISH`/
/// `SUBSCRIBE` on [`CHANNEL_NAME`], with `ScheduleInfo` JSON-encoded as
/// the message payload.
#[derive(Clone)]
pub struct RedisScheduleChannel {
    client: redis::Client,
}

impl RedisScheduleChannel {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub async fn publish(&self, info: &ScheduleInfo) -> Result<(), RegistryError> {
        use redis::AsyncCommands;
        let payload = serde_json::to_string(info).expect("ScheduleInfo always serialises");
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: i64 = conn.publish(CHANNEL_NAME, payload).await?;
        Ok(())
    }

    /// Subscribes and forwards decoded messages on a broadcast channel;
    /// malformed payloads are logged and skipped rather than killing
    /// the subscription, matching the codec's "drop + log" policy for
    /// any one bad message.
    pub async fn subscribe(&self) -> Result<broadcast::Receiver<ScheduleInfo>, RegistryError> {
        use futures_util::StreamExt;

        let (tx, rx) = broadcast::channel(16);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(CHANNEL_NAME).await?;
        tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(err) => {
                        tracing::warn!(%err, "schedule channel payload not a string");
                        continue;
                    }
                };
                match serde_json::from_str::<ScheduleInfo>(&payload) {
                    Ok(info) => {
                        let _ = tx.send(info);
                    }
                    Err(err) => {
                        tracing::warn!(%err, "malformed ScheduleInfo on schedule channel");
                    }
                }
            }
        });
        Ok(rx)
    }
}

/// The two interchangeable implementations of the `schedule` channel.
#[derive(Clone)]
pub enum ScheduleChannel {
    Memory(MemoryScheduleChannel),
    Redis(RedisScheduleChannel),
}

impl ScheduleChannel {
    pub fn publish(&self, info: ScheduleInfo) {
        match self {
            ScheduleChannel::Memory(m) => m.publish(info),
            ScheduleChannel::Redis(r) => {
                let r = r.clone();
                tokio::spawn(async move {
                    if let Err(err) = r.publish(&info).await {
                        tracing::warn!(%err, "failed to publish ScheduleInfo");
                    }
                });
            }
        }
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<ScheduleInfo>, RegistryError> {
        match self {
            ScheduleChannel::Memory(m) => Ok(m.subscribe()),
            ScheduleChannel::Redis(r) => r.subscribe().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn memory_channel_delivers_to_subscriber() {
        let chan = ScheduleChannel::Memory(MemoryScheduleChannel::new());
        let mut rx = chan.subscribe().await.unwrap();
        let info = ScheduleInfo {
            backends: HashMap::from([("b1:8081".to_string(), 1.0)]),
            strategy: rb_protocol::rest::SchedulingStrategy::Balance,
        };
        chan.publish(info.clone());
        let got = rx.recv().await.unwrap();
        assert_eq!(got.backends, info.backends);
    }
}

//! Topic-based publish/subscribe message bus.
//!
//! Every subscriber to a topic receives every message published on it
//! (fan-out). Payloads are JSON strings so each service decodes with its
//! own schema; a message that fails to decode is dropped by the consumer,
//! never by the bus. Delivery is at-least-once with a bounded per-receiver
//! buffer: a subscriber that falls far enough behind loses the oldest
//! messages and is told how many were skipped.
//!
//! Ordering is per-publisher-per-topic FIFO. There is no cross-topic
//! order.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::errors::BusError;

pub mod topics {
    pub const MARKET_DATA: &str = "market_data";
    pub const TRADE_SIGNALS: &str = "trade_signals";
    pub const EXECUTION_REQUESTS: &str = "execution_requests";
    pub const EXECUTION_FILLED: &str = "execution_filled";
    pub const RISK_COMMANDS: &str = "risk_commands";
    pub const AUDIT_EVENTS: &str = "audit_events";
    pub const LEADERBOARD: &str = "leaderboard_updates";

    pub const ALL: [&str; 7] = [
        MARKET_DATA,
        TRADE_SIGNALS,
        EXECUTION_REQUESTS,
        EXECUTION_FILLED,
        RISK_COMMANDS,
        AUDIT_EVENTS,
        LEADERBOARD,
    ];
}

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct MessageBus {
    channels: HashMap<&'static str, broadcast::Sender<String>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create the bus with every topic pre-registered at the given
    /// per-receiver buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut channels = HashMap::new();
        for topic in topics::ALL {
            let (tx, _) = broadcast::channel(capacity);
            channels.insert(topic, tx);
        }
        Self { channels }
    }

    fn sender(&self, topic: &str) -> Result<&broadcast::Sender<String>, BusError> {
        self.channels
            .get(topic)
            .ok_or_else(|| BusError::UnknownTopic(topic.to_string()))
    }

    /// Serialise and publish. Returns the number of subscribers that
    /// received the message; publishing to an empty topic is not an error.
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> Result<usize, BusError> {
        let json = serde_json::to_string(payload).map_err(|source| BusError::Encode {
            topic: topic.to_string(),
            source,
        })?;
        self.publish_raw(topic, json)
    }

    /// Publish an already-serialised JSON payload.
    pub fn publish_raw(&self, topic: &str, json: String) -> Result<usize, BusError> {
        let sender = self.sender(topic)?;
        Ok(sender.send(json).unwrap_or(0))
    }

    pub fn subscribe(&self, topic: &str) -> Result<BusSubscription, BusError> {
        let (name, sender) = self
            .channels
            .get_key_value(topic)
            .ok_or_else(|| BusError::UnknownTopic(topic.to_string()))?;
        Ok(BusSubscription {
            topic: *name,
            rx: sender.subscribe(),
        })
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BusSubscription {
    topic: &'static str,
    rx: broadcast::Receiver<String>,
}

impl BusSubscription {
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Await the next message. A lagged receiver logs the number of
    /// skipped messages and keeps reading; `Closed` surfaces as an error
    /// so the caller can re-subscribe with back-off.
    pub async fn recv(&mut self) -> Result<String, BusError> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Ok(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        topic = self.topic,
                        skipped, "Subscriber lagging; oldest messages dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(BusError::Closed(self.topic.to_string()));
                }
            }
        }
    }

    /// `recv` with a timeout so periodic work (heartbeats, leaderboard
    /// ticks) can interleave with message handling. `Ok(None)` on timeout.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<String>, BusError> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}

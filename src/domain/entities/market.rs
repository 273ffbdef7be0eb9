use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tick event kind as published by the market-data gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickKind {
    Trade,
    Quote,
}

/// A single trade or quote event for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub size: f64,
    pub timestamp_ns: i64,
    #[serde(rename = "type")]
    pub kind: TickKind,
}

impl Tick {
    pub fn trade(symbol: impl Into<String>, price: f64, size: f64, timestamp_ns: i64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            size,
            timestamp_ns,
            kind: TickKind::Trade,
        }
    }
}

/// Aggregated OHLCV price summary over a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Bar {
    /// A one-tick flat bar: strategies that operate on bars treat each
    /// trade tick as a degenerate OHLC bar at the tick price.
    pub fn flat(symbol: impl Into<String>, price: f64, volume: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            timestamp,
        }
    }

    /// `low <= min(open, close)`, `high >= max(open, close)`, `volume >= 0`.
    pub fn is_coherent(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.volume >= 0.0
    }
}

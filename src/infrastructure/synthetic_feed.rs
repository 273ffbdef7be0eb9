//! Synthetic market-data feed: a geometric random walk per symbol,
//! published as trade ticks on `market_data`. Lets the paper pipeline run
//! end-to-end without the external gateway.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::application::bus::{topics, MessageBus};
use crate::domain::entities::market::Tick;

/// Per-tick return volatility of the walk.
const TICK_VOLATILITY: f64 = 0.0008;

pub struct SyntheticFeed {
    bus: MessageBus,
    tick_interval: Duration,
    prices: HashMap<String, f64>,
}

impl SyntheticFeed {
    pub fn new(bus: MessageBus, symbols: &[String], tick_interval: Duration) -> Self {
        let prices = symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| (symbol.clone(), 100.0 + 50.0 * i as f64))
            .collect();
        Self {
            bus,
            tick_interval,
            prices,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            symbols = self.prices.len(),
            interval_ms = self.tick_interval.as_millis() as u64,
            "Synthetic feed started"
        );
        let noise = Normal::new(0.0, TICK_VOLATILITY).expect("volatility is positive");
        let mut timer = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    let mut rng = rand::thread_rng();
                    let timestamp_ns = Utc::now().timestamp_nanos_opt().unwrap_or_default();
                    for (symbol, price) in self.prices.iter_mut() {
                        *price *= 1.0 + noise.sample(&mut rng);
                        let size = rng.gen_range(1.0..500.0_f64).floor();
                        let tick = Tick::trade(symbol.clone(), *price, size, timestamp_ns);
                        if let Err(e) = self.bus.publish(topics::MARKET_DATA, &tick) {
                            error!(error = %e, "Failed to publish synthetic tick");
                        }
                    }
                }
            }
        }

        info!("Synthetic feed stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::market::TickKind;

    #[tokio::test]
    async fn test_feed_publishes_positive_trade_ticks() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe(topics::MARKET_DATA).unwrap();
        let feed = SyntheticFeed::new(
            bus.clone(),
            &["SPY".to_string(), "AAPL".to_string()],
            Duration::from_millis(5),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = feed.spawn(shutdown_rx);

        for _ in 0..10 {
            let raw = tokio::time::timeout(Duration::from_secs(1), sub.recv())
                .await
                .expect("tick within deadline")
                .unwrap();
            let tick: Tick = serde_json::from_str(&raw).unwrap();
            assert_eq!(tick.kind, TickKind::Trade);
            assert!(tick.price > 0.0);
            assert!(tick.size >= 1.0);
            assert!(tick.symbol == "SPY" || tick.symbol == "AAPL");
        }

        shutdown_tx.send(true).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
    }
}

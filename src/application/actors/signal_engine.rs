//! Signal engine: hosts the strategy set, routes every trade tick to the
//! strategies registered for its symbol, and publishes each emitted
//! signal on `trade_signals` before the next tick is handled.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::actors::{Heartbeat, HEARTBEAT_INTERVAL, RECONNECT_BACKOFF};
use crate::application::bus::{topics, MessageBus};
use crate::domain::entities::market::{Tick, TickKind};
use crate::domain::entities::signal::TradeSignal;
use crate::domain::services::strategies::StrategyKind;
use crate::persistence::audit_log::{AuditLogger, DEFAULT_MODEL_VERSION};

pub struct SignalEngine {
    bus: MessageBus,
    audit: AuditLogger,
    strategies: Vec<StrategyKind>,
    heartbeat: Heartbeat,
}

impl SignalEngine {
    pub fn new(bus: MessageBus, audit: AuditLogger, strategies: Vec<StrategyKind>) -> Self {
        Self {
            bus,
            audit,
            strategies,
            heartbeat: Heartbeat::new("signal_engine"),
        }
    }

    pub fn heartbeat(&self) -> Heartbeat {
        self.heartbeat.clone()
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(strategies = self.strategies.len(), "Signal engine started");

        'outer: loop {
            let mut subscription = match self.bus.subscribe(topics::MARKET_DATA) {
                Ok(sub) => sub,
                Err(e) => {
                    error!(error = %e, "Market data subscribe failed; retrying");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            };
            info!("Subscribed to market_data");

            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break 'outer;
                        }
                    }
                    _ = heartbeat.tick() => {
                        self.heartbeat.beat();
                        debug!("Signal engine heartbeat");
                    }
                    message = subscription.recv() => match message {
                        Ok(raw) => self.handle_market_data(&raw).await,
                        Err(e) => {
                            error!(
                                error = %e,
                                "market_data subscription lost; resubscribing in {:?}",
                                RECONNECT_BACKOFF
                            );
                            tokio::time::sleep(RECONNECT_BACKOFF).await;
                            continue 'outer;
                        }
                    }
                }
            }
        }

        info!("Signal engine stopped");
    }

    async fn handle_market_data(&mut self, raw: &str) {
        let tick: Tick = match serde_json::from_str(raw) {
            Ok(tick) => tick,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable market data message");
                return;
            }
        };
        if tick.kind != TickKind::Trade {
            return;
        }
        if tick.price <= 0.0 || !tick.price.is_finite() {
            warn!(symbol = %tick.symbol, price = tick.price, "Dropping tick with invalid price");
            return;
        }

        // Deterministic iteration order: strategies run in registration
        // order, and each resulting signal is published before the next
        // strategy sees the tick.
        for strategy in &mut self.strategies {
            if strategy.symbol() != tick.symbol {
                continue;
            }
            let Some(signal) = strategy.on_tick(&tick) else {
                continue;
            };
            // One misbehaving strategy must not affect the others or the
            // tick stream: invalid output is logged and skipped.
            if !Self::is_well_formed(&signal) {
                error!(
                    model_id = %signal.model_id,
                    confidence = signal.confidence,
                    price = signal.price,
                    "Strategy emitted malformed signal; skipping"
                );
                continue;
            }

            info!(
                model_id = %signal.model_id,
                symbol = %signal.symbol,
                action = %signal.action,
                confidence = signal.confidence,
                "Signal generated"
            );
            self.audit.log_signal(&signal, DEFAULT_MODEL_VERSION).await;
            if let Err(e) = self.bus.publish(topics::TRADE_SIGNALS, &signal) {
                error!(error = %e, "Failed to publish trade signal");
            }
        }
    }

    fn is_well_formed(signal: &TradeSignal) -> bool {
        signal.price > 0.0
            && signal.price.is_finite()
            && signal.confidence.is_finite()
            && (0.0..=1.0).contains(&signal.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::strategies::SmaCrossover;
    use std::time::Duration;

    fn temp_audit(bus: &MessageBus) -> AuditLogger {
        let path = std::env::temp_dir().join(format!("audit_{}.jsonl", uuid::Uuid::new_v4()));
        AuditLogger::new(path, bus.clone())
    }

    #[tokio::test]
    async fn test_tick_drives_strategy_to_published_signal() {
        let bus = MessageBus::new();
        let audit = temp_audit(&bus);
        let strategies = vec![StrategyKind::SmaCrossover(
            SmaCrossover::new("SPY", "sma_spy", 5, 10).unwrap(),
        )];
        let engine = SignalEngine::new(bus.clone(), audit, strategies);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _task = engine.spawn(shutdown_rx);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut signals = bus.subscribe(topics::TRADE_SIGNALS).unwrap();
        for _ in 0..9 {
            bus.publish(topics::MARKET_DATA, &Tick::trade("SPY", 80.0, 10.0, 0))
                .unwrap();
        }
        bus.publish(topics::MARKET_DATA, &Tick::trade("SPY", 120.0, 10.0, 0))
            .unwrap();

        let raw = tokio::time::timeout(Duration::from_secs(2), signals.recv())
            .await
            .expect("signal within deadline")
            .unwrap();
        let signal: TradeSignal = serde_json::from_str(&raw).unwrap();
        assert_eq!(signal.model_id, "sma_spy");
        assert_eq!(signal.symbol, "SPY");
    }

    #[tokio::test]
    async fn test_other_symbols_are_not_routed() {
        let bus = MessageBus::new();
        let audit = temp_audit(&bus);
        let strategies = vec![StrategyKind::SmaCrossover(
            SmaCrossover::new("SPY", "sma_spy", 2, 3).unwrap(),
        )];
        let engine = SignalEngine::new(bus.clone(), audit, strategies);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _task = engine.spawn(shutdown_rx);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut signals = bus.subscribe(topics::TRADE_SIGNALS).unwrap();
        for i in 0..20 {
            bus.publish(
                topics::MARKET_DATA,
                &Tick::trade("AAPL", 100.0 + i as f64, 10.0, i),
            )
            .unwrap();
        }
        let result = signals.recv_timeout(Duration::from_millis(200)).await.unwrap();
        assert!(result.is_none(), "SPY strategy must ignore AAPL ticks");
    }

    #[tokio::test]
    async fn test_undecodable_payload_does_not_stop_the_engine() {
        let bus = MessageBus::new();
        let audit = temp_audit(&bus);
        let strategies = vec![StrategyKind::SmaCrossover(
            SmaCrossover::new("SPY", "sma_spy", 5, 10).unwrap(),
        )];
        let engine = SignalEngine::new(bus.clone(), audit, strategies);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _task = engine.spawn(shutdown_rx);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut signals = bus.subscribe(topics::TRADE_SIGNALS).unwrap();
        bus.publish_raw(topics::MARKET_DATA, "not json".to_string()).unwrap();
        for _ in 0..9 {
            bus.publish(topics::MARKET_DATA, &Tick::trade("SPY", 80.0, 10.0, 0))
                .unwrap();
        }
        bus.publish(topics::MARKET_DATA, &Tick::trade("SPY", 120.0, 10.0, 0))
            .unwrap();

        let raw = tokio::time::timeout(Duration::from_secs(2), signals.recv())
            .await
            .expect("engine survives bad payloads")
            .unwrap();
        assert!(raw.contains("sma_spy"));
    }
}

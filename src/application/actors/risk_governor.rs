//! Risk governor: mediates between `trade_signals` and
//! `execution_requests`, owns the kill-switch and model-rollback state
//! machines, and closes the feedback loop from `execution_filled` back
//! into the rolling performance windows.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::actors::{Heartbeat, HEARTBEAT_INTERVAL, RECONNECT_BACKOFF};
use crate::application::bus::{topics, MessageBus};
use crate::domain::entities::command::{RiskCommand, RiskCommandKind};
use crate::domain::entities::fill::{Fill, FillSide};
use crate::domain::entities::order::{ExecutionRequest, RequestSide};
use crate::domain::entities::signal::{SignalAction, TradeSignal};
use crate::domain::services::risk_engine::RiskEngine;
use crate::persistence::audit_log::AuditLogger;

/// Default stop offset used purely for sizing, not a live order stop.
const SIZING_STOP_BUY: f64 = 0.98;
const SIZING_STOP_SELL: f64 = 1.02;

pub struct RiskGovernor {
    bus: MessageBus,
    audit: AuditLogger,
    engine: RiskEngine,
    perf_check_interval: u64,
    signals_processed: u64,
    heartbeat: Heartbeat,
}

impl RiskGovernor {
    pub fn new(
        bus: MessageBus,
        audit: AuditLogger,
        engine: RiskEngine,
        perf_check_interval: u64,
    ) -> Self {
        Self {
            bus,
            audit,
            engine,
            perf_check_interval: perf_check_interval.max(1),
            signals_processed: 0,
            heartbeat: Heartbeat::new("risk_governor"),
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
        info!("Risk governor started");

        'outer: loop {
            let signals = self.bus.subscribe(topics::TRADE_SIGNALS);
            let fills = self.bus.subscribe(topics::EXECUTION_FILLED);
            let (mut signals, mut fills) = match (signals, fills) {
                (Ok(s), Ok(f)) => (s, f),
                _ => {
                    error!("Risk governor subscribe failed; retrying");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            };
            info!("Subscribed to trade_signals and execution_filled");

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
                        debug!("Risk governor heartbeat");
                    }
                    message = fills.recv() => match message {
                        Ok(raw) => self.handle_fill(&raw),
                        Err(e) => {
                            error!(error = %e, "execution_filled subscription lost; resubscribing");
                            tokio::time::sleep(RECONNECT_BACKOFF).await;
                            continue 'outer;
                        }
                    },
                    message = signals.recv() => match message {
                        Ok(raw) => self.handle_signal(&raw).await,
                        Err(e) => {
                            error!(error = %e, "trade_signals subscription lost; resubscribing");
                            tokio::time::sleep(RECONNECT_BACKOFF).await;
                            continue 'outer;
                        }
                    },
                }
            }
        }

        info!("Risk governor stopped");
    }

    /// Feedback from execution: derive a proxy return from the fill's
    /// slippage and feed the rolling trade/prediction windows.
    fn handle_fill(&mut self, raw: &str) {
        let fill: Fill = match serde_json::from_str(raw) {
            Ok(fill) => fill,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable fill message");
                return;
            }
        };
        if fill.price <= 0.0 {
            return;
        }

        // Negative slippage proxy: cost of execution as a stand-in for
        // realised trade return.
        let proxy_return = -fill.slippage / fill.price;
        let correct = match fill.side {
            FillSide::Buy => proxy_return >= 0.0,
            FillSide::Sell => proxy_return <= 0.0,
        };
        self.engine.record_trade_result(proxy_return);
        self.engine.record_prediction(correct, proxy_return);
        debug!(
            model_id = %fill.model_id,
            proxy_return,
            correct,
            "Recorded fill feedback"
        );
    }

    async fn handle_signal(&mut self, raw: &str) {
        let signal: TradeSignal = match serde_json::from_str(raw) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable signal message");
                return;
            }
        };
        info!(
            model_id = %signal.model_id,
            symbol = %signal.symbol,
            action = %signal.action,
            "Received signal"
        );

        // 1. Flag gate: kill switch or manual-approval mode suppresses.
        if !self.engine.validate_signal() {
            if self.engine.is_kill_switch_active() {
                self.publish_command(RiskCommand::new(
                    RiskCommandKind::LiquidateAll,
                    "kill_switch_active",
                ));
            }
            return;
        }

        // 2. Kill-switch re-evaluation against current account state.
        if self.engine.check_kill_switch() {
            warn!("Kill switch tripped; publishing LIQUIDATE_ALL");
            self.publish_command(RiskCommand::new(
                RiskCommandKind::LiquidateAll,
                "drawdown_or_consecutive_loss_limit_breached",
            ));
            self.audit
                .log_kill_switch(
                    "drawdown_or_consecutive_loss_limit_breached",
                    0.0,
                    self.engine.current_equity(),
                )
                .await;
            return;
        }

        // 3. Price gate.
        if signal.price <= 0.0 {
            error!(model_id = %signal.model_id, "Signal missing valid price");
            return;
        }

        // HOLD carries no order intent.
        let side = match signal.action {
            SignalAction::Buy => RequestSide::Buy,
            SignalAction::Sell => RequestSide::Sell,
            SignalAction::Hold => {
                debug!(model_id = %signal.model_id, "HOLD signal; nothing to size");
                return;
            }
        };

        // 4. Fixed-fractional sizing against the default sizing stop.
        let stop_loss = signal.price
            * match side {
                RequestSide::Buy => SIZING_STOP_BUY,
                RequestSide::Sell => SIZING_STOP_SELL,
            };
        let qty = self.engine.calculate_position_size(signal.price, stop_loss);
        if qty == 0 {
            info!(symbol = %signal.symbol, "Position size 0; skipping");
            return;
        }

        // 5. Emit the approved request.
        let request = ExecutionRequest {
            model_id: signal.model_id.clone(),
            symbol: signal.symbol.clone(),
            side,
            qty,
            order_type: "market".to_string(),
            price: Some(signal.price),
            confidence: signal.confidence,
            explanation: signal.explanation.clone(),
            timestamp: signal.timestamp,
        };
        match self.bus.publish(topics::EXECUTION_REQUESTS, &request) {
            Ok(_) => info!(
                side = %request.side,
                qty,
                symbol = %request.symbol,
                "Approved execution request"
            ),
            Err(e) => error!(error = %e, "Failed to publish execution request"),
        }

        // 6. Periodic model-health evaluation.
        self.signals_processed += 1;
        if self.signals_processed % self.perf_check_interval == 0 {
            self.check_model_health().await;
        }
    }

    async fn check_model_health(&mut self) {
        let Some(reason) = self.engine.check_model_performance() else {
            return;
        };
        let sharpe = self.engine.rolling_sharpe();
        let accuracy = self.engine.rolling_accuracy();
        self.publish_command(
            RiskCommand::new(
                RiskCommandKind::ActivateManualApproval,
                "model_performance_below_threshold",
            )
            .with_metrics(sharpe, accuracy),
        );
        self.audit
            .log_manual_approval_mode(
                "model_performance_below_threshold",
                &reason,
                sharpe,
                accuracy,
            )
            .await;
        warn!(?sharpe, ?accuracy, "Model rollback published");
    }

    fn publish_command(&self, command: RiskCommand) {
        if let Err(e) = self.bus.publish(topics::RISK_COMMANDS, &command) {
            error!(error = %e, "Failed to publish risk command");
        }
    }
}

//! Live-mode account monitor: polls the brokerage account on a fixed
//! cadence, anchors the session's starting equity on the first successful
//! poll, and fires the drawdown circuit breaker when the daily return
//! breaches the configured limit.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::actors::Heartbeat;
use crate::infrastructure::connector::BrokerageConnector;
use crate::persistence::audit_log::AuditLogger;

pub struct AccountMonitor {
    connector: BrokerageConnector,
    audit: AuditLogger,
    poll_interval: Duration,
    drawdown_limit: f64,
    starting_equity: Option<f64>,
    heartbeat: Heartbeat,
}

impl AccountMonitor {
    pub fn new(
        connector: BrokerageConnector,
        audit: AuditLogger,
        poll_interval: Duration,
        drawdown_limit: f64,
    ) -> Self {
        Self {
            connector,
            audit,
            poll_interval,
            drawdown_limit,
            starting_equity: None,
            heartbeat: Heartbeat::new("account_monitor"),
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
        info!(
            poll_secs = self.poll_interval.as_secs(),
            drawdown_limit = self.drawdown_limit,
            "Account monitor started"
        );
        let mut timer = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    self.heartbeat.beat();
                    self.poll_once().await;
                }
            }
        }

        info!("Account monitor stopped");
    }

    async fn poll_once(&mut self) {
        let account = match self.connector.get_account().await {
            Ok(account) => account,
            Err(e) => {
                // Transient infrastructure: keep polling, never crash.
                error!(error = %e, "Account poll failed");
                return;
            }
        };

        let starting = *self.starting_equity.get_or_insert(account.equity);
        if starting <= 0.0 {
            warn!(starting, "Non-positive starting equity; skipping drawdown check");
            return;
        }

        let daily_return = account.unrealized_pl / starting;
        debug!(
            equity = account.equity,
            unrealized_pl = account.unrealized_pl,
            daily_return,
            "Account poll"
        );

        if daily_return <= -self.drawdown_limit && !self.connector.is_blocked() {
            error!(
                daily_return,
                limit = -self.drawdown_limit,
                "Circuit breaker: drawdown limit breached"
            );
            self.connector.activate_kill_switch();
            if let Err(e) = self.connector.liquidate_all().await {
                error!(error = %e, "Emergency liquidation failed");
            }
            self.audit
                .log_kill_switch(
                    "daily_drawdown_limit_breached",
                    daily_return,
                    account.equity,
                )
                .await;
        }
    }
}

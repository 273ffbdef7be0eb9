//! Brokerage connector: wraps a concrete brokerage client with the two
//! operational block flags (kill switch, manual approval) and the signal
//! mapping contract. Constructed once at service startup and cloned into
//! the loops that need it; never a process-wide singleton.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::entities::fill::FillSide;
use crate::domain::repositories::brokerage::{
    AccountSnapshot, BrokerageClient, BrokerageError, BrokerageResult, OrderAck,
};

#[derive(Clone)]
pub struct BrokerageConnector {
    client: Arc<dyn BrokerageClient>,
    kill_switch_active: Arc<AtomicBool>,
    manual_approval_mode: Arc<AtomicBool>,
}

impl BrokerageConnector {
    pub fn new(client: Arc<dyn BrokerageClient>) -> Self {
        Self {
            client,
            kill_switch_active: Arc::new(AtomicBool::new(false)),
            manual_approval_mode: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Hard halt of all order submission.
    pub fn activate_kill_switch(&self) {
        self.kill_switch_active.store(true, Ordering::SeqCst);
        error!("KILL SWITCH ACTIVATED: all order submission halted");
    }

    pub fn deactivate_kill_switch(&self) {
        self.kill_switch_active.store(false, Ordering::SeqCst);
        warn!("Kill switch deactivated; automated trading resumed");
    }

    /// Signals are logged but not auto-submitted until deactivated.
    pub fn activate_manual_approval(&self) {
        self.manual_approval_mode.store(true, Ordering::SeqCst);
        warn!("Manual approval mode active; auto-execution suspended");
    }

    pub fn deactivate_manual_approval(&self) {
        self.manual_approval_mode.store(false, Ordering::SeqCst);
        info!("Manual approval mode deactivated; auto-execution resumed");
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch_active.load(Ordering::SeqCst)
    }

    pub fn is_manual_approval_mode(&self) -> bool {
        self.manual_approval_mode.load(Ordering::SeqCst)
    }

    /// True when no orders should be submitted.
    pub fn is_blocked(&self) -> bool {
        self.is_kill_switch_active() || self.is_manual_approval_mode()
    }

    pub async fn get_account(&self) -> BrokerageResult<AccountSnapshot> {
        self.client.get_account().await
    }

    /// Submit a market order, refusing while any block flag is set.
    pub async fn submit_market_order(
        &self,
        symbol: &str,
        qty: u32,
        side: FillSide,
    ) -> BrokerageResult<OrderAck> {
        if self.is_kill_switch_active() {
            return Err(BrokerageError::Blocked("kill switch active".into()));
        }
        if self.is_manual_approval_mode() {
            return Err(BrokerageError::Blocked("manual approval mode active".into()));
        }
        self.client.submit_market_order(symbol, qty, side).await
    }

    /// Integer signal contract: `1` buys, `-1` sells, anything else
    /// (HOLD) is refused.
    pub async fn submit_signal(
        &self,
        symbol: &str,
        signal: i32,
        qty: u32,
    ) -> BrokerageResult<OrderAck> {
        let side = match signal {
            1 => FillSide::Buy,
            -1 => FillSide::Sell,
            _ => {
                return Err(BrokerageError::Blocked(
                    "HOLD signals are never submitted".into(),
                ))
            }
        };
        self.submit_market_order(symbol, qty, side).await
    }

    /// Emergency liquidation is allowed even while blocked.
    pub async fn liquidate_all(&self) -> BrokerageResult<()> {
        self.client.liquidate_all().await
    }

    pub async fn close_all_positions(&self) -> BrokerageResult<()> {
        self.client.close_all_positions().await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// In-memory brokerage double used across connector and monitor tests.
    pub struct MockBrokerage {
        pub equity: f64,
        pub unrealized_pl: f64,
        pub submitted: AtomicU32,
        pub liquidations: AtomicU32,
    }

    impl MockBrokerage {
        pub fn new(equity: f64, unrealized_pl: f64) -> Self {
            Self {
                equity,
                unrealized_pl,
                submitted: AtomicU32::new(0),
                liquidations: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl BrokerageClient for MockBrokerage {
        fn name(&self) -> &str {
            "MockBrokerage"
        }

        async fn get_account(&self) -> BrokerageResult<AccountSnapshot> {
            Ok(AccountSnapshot {
                equity: self.equity,
                cash: self.equity,
                buying_power: self.equity,
                portfolio_value: self.equity,
                unrealized_pl: self.unrealized_pl,
                status: "ACTIVE".into(),
            })
        }

        async fn submit_market_order(
            &self,
            _symbol: &str,
            _qty: u32,
            _side: FillSide,
        ) -> BrokerageResult<OrderAck> {
            self.submitted.fetch_add(1, Ordering::SeqCst);
            Ok(OrderAck {
                order_id: uuid::Uuid::new_v4().to_string(),
                status: "accepted".into(),
            })
        }

        async fn liquidate_all(&self) -> BrokerageResult<()> {
            self.liquidations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close_all_positions(&self) -> BrokerageResult<()> {
            Ok(())
        }
    }
}

//! Brokerage client trait: the seam between the execution engine and any
//! concrete brokerage. Decouples live order routing from vendor code and
//! makes the live path mockable in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::fill::FillSide;

pub type BrokerageResult<T> = Result<T, BrokerageError>;

#[derive(Debug, Error, Clone)]
pub enum BrokerageError {
    #[error("Order submission failed: {0}")]
    OrderSubmissionFailed(String),

    #[error("Account query failed: {0}")]
    AccountQueryFailed(String),

    #[error("Liquidation failed: {0}")]
    LiquidationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Order submission blocked: {0}")]
    Blocked(String),
}

/// Flat account state used by the circuit-breaker monitor.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub equity: f64,
    pub cash: f64,
    pub buying_power: f64,
    pub portfolio_value: f64,
    pub unrealized_pl: f64,
    pub status: String,
}

/// Acknowledgement of a submitted order.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: String,
    pub status: String,
}

#[async_trait]
pub trait BrokerageClient: Send + Sync {
    /// Name of this brokerage, for logging.
    fn name(&self) -> &str;

    /// Current account state.
    async fn get_account(&self) -> BrokerageResult<AccountSnapshot>;

    /// Submit a market order; returns the brokerage-assigned order id.
    async fn submit_market_order(
        &self,
        symbol: &str,
        qty: u32,
        side: FillSide,
    ) -> BrokerageResult<OrderAck>;

    /// Emergency close of all open positions, cancelling open orders.
    async fn liquidate_all(&self) -> BrokerageResult<()>;

    /// Close all open positions, leaving open orders in place.
    async fn close_all_positions(&self) -> BrokerageResult<()>;

    /// Liveness probe.
    async fn is_healthy(&self) -> bool {
        true
    }
}

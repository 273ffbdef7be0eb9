use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::signal::FeatureImpact;

/// Side of an executed fill, normalised back to uppercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FillSide {
    Buy,
    Sell,
}

impl std::fmt::Display for FillSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillSide::Buy => write!(f, "BUY"),
            FillSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Whether a fill was simulated or executed through the live brokerage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    Paper,
    Live,
}

impl std::fmt::Display for TradeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeMode::Paper => write!(f, "paper"),
            TradeMode::Live => write!(f, "live"),
        }
    }
}

pub const FILL_STATUS: &str = "FILLED";

/// Confirmation that an order executed, published on `execution_filled`.
/// `slippage` is the adverse price movement between decision and execution,
/// in dollars per share (non-negative for any non-zero slippage draw).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: String,
    pub order_id: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<String>,
    pub symbol: String,
    pub side: FillSide,
    pub qty: u32,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub mode: TradeMode,
    pub slippage: f64,
    #[serde(default)]
    pub explanation: Vec<FeatureImpact>,
}

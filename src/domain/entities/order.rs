use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::fill::FillSide;
use crate::domain::entities::signal::FeatureImpact;

/// Side of a risk-approved order. Serialised lowercase (`"buy"` / `"sell"`)
/// — distinct from both the uppercase signal action and the uppercase fill
/// side, so each hop of the pipeline has its own schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSide {
    Buy,
    Sell,
}

impl RequestSide {
    pub fn to_fill_side(self) -> FillSide {
        match self {
            RequestSide::Buy => FillSide::Buy,
            RequestSide::Sell => FillSide::Sell,
        }
    }
}

impl std::fmt::Display for RequestSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestSide::Buy => write!(f, "buy"),
            RequestSide::Sell => write!(f, "sell"),
        }
    }
}

fn default_order_type() -> String {
    "market".to_string()
}

/// A risk-approved, pre-sized order intent published on
/// `execution_requests`. Only the risk governor creates these; `side` and
/// `qty` are mandatory at decode time, so a raw trade signal fed to the
/// execution path fails to parse and can never produce a fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub model_id: String,
    pub symbol: String,
    pub side: RequestSide,
    pub qty: u32,
    #[serde(rename = "type", default = "default_order_type")]
    pub order_type: String,
    /// Decision-price hint carried over from the originating signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: Vec<FeatureImpact>,
    pub timestamp: DateTime<Utc>,
}

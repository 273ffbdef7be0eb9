use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strategy recommendation. Serialised uppercase on the wire
/// (`"BUY"` / `"SELL"` / `"HOLD"`), under the field name `signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Sell => write!(f, "SELL"),
            SignalAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// One entry of a signal's explainability payload: a feature name and
/// its attribution toward the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImpact {
    pub feature: String,
    pub impact: f64,
}

impl FeatureImpact {
    pub fn new(feature: impl Into<String>, impact: f64) -> Self {
        Self {
            feature: feature.into(),
            impact,
        }
    }
}

/// A strategy's recommendation to act on a symbol, published on the
/// `trade_signals` topic. Note the deliberate schema asymmetry with
/// `ExecutionRequest`: this message has no `side` and no `qty`, so it can
/// never be mistaken for a risk-approved order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub model_id: String,
    pub model_name: String,
    pub symbol: String,
    #[serde(rename = "signal")]
    pub action: SignalAction,
    pub confidence: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub explanation: Vec<FeatureImpact>,
}

use serde::{Deserialize, Serialize};

/// Operational command issued by the risk governor on `risk_commands`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCommandKind {
    LiquidateAll,
    ActivateManualApproval,
    ResetKillSwitch,
}

impl std::fmt::Display for RiskCommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCommandKind::LiquidateAll => write!(f, "LIQUIDATE_ALL"),
            RiskCommandKind::ActivateManualApproval => write!(f, "ACTIVATE_MANUAL_APPROVAL"),
            RiskCommandKind::ResetKillSwitch => write!(f, "RESET_KILL_SWITCH"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCommand {
    pub command: RiskCommandKind,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_sharpe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_accuracy: Option<f64>,
}

impl RiskCommand {
    pub fn new(command: RiskCommandKind, reason: impl Into<String>) -> Self {
        Self {
            command,
            reason: reason.into(),
            rolling_sharpe: None,
            rolling_accuracy: None,
        }
    }

    pub fn with_metrics(mut self, sharpe: Option<f64>, accuracy: Option<f64>) -> Self {
        self.rolling_sharpe = sharpe;
        self.rolling_accuracy = accuracy;
        self
    }
}

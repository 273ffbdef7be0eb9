//! Environment-driven configuration. Variable names are part of the
//! deployment contract; every value has a safe paper-trading default.
//! Live mode without brokerage credentials is a fatal startup error.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::errors::ConfigError;
use crate::domain::services::risk_engine::RiskEngineConfig;
use crate::infrastructure::alpaca_client::ALPACA_PAPER_BASE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Paper,
    Live,
}

impl ExecutionMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "paper" => Ok(ExecutionMode::Paper),
            "live" => Ok(ExecutionMode::Live),
            other => Err(ConfigError::InvalidValue {
                key: "EXECUTION_MODE",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskSettings {
    pub max_daily_loss_pct: f64,
    pub risk_per_trade_pct: f64,
    pub max_consecutive_losses: u32,
    pub rollback_min_sharpe: f64,
    pub rollback_min_accuracy: f64,
    pub perf_check_interval: u64,
}

impl From<&RiskSettings> for RiskEngineConfig {
    fn from(settings: &RiskSettings) -> Self {
        RiskEngineConfig {
            max_daily_loss_pct: settings.max_daily_loss_pct,
            risk_per_trade_pct: settings.risk_per_trade_pct,
            max_consecutive_losses: settings.max_consecutive_losses,
            rollback_min_sharpe: settings.rollback_min_sharpe,
            rollback_min_accuracy: settings.rollback_min_accuracy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaperSettings {
    pub starting_cash: f64,
    pub publish_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub account_poll_interval: Duration,
    pub circuit_breaker_drawdown_pct: f64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub execution_mode: ExecutionMode,
    pub symbols: Vec<String>,
    pub risk: RiskSettings,
    pub paper: PaperSettings,
    pub broker: Option<BrokerSettings>,
    pub audit_log_path: PathBuf,
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingKey(key))
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let execution_mode = match std::env::var("EXECUTION_MODE") {
            Ok(raw) => ExecutionMode::parse(&raw)?,
            Err(_) => ExecutionMode::Paper,
        };

        let symbols: Vec<String> = std::env::var("TRADING_SYMBOLS")
            .unwrap_or_else(|_| "SPY".to_string())
            .to_uppercase()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let symbols = if symbols.is_empty() {
            vec!["SPY".to_string()]
        } else {
            symbols
        };

        let risk = RiskSettings {
            max_daily_loss_pct: env_parse("RISK_MAX_DAILY_LOSS", 0.03)?,
            risk_per_trade_pct: env_parse("RISK_PER_TRADE", 0.01)?,
            max_consecutive_losses: env_parse("CIRCUIT_BREAKER_CONSECUTIVE_LOSSES", 5)?,
            rollback_min_sharpe: env_parse("ROLLBACK_MIN_SHARPE", 0.5)?,
            rollback_min_accuracy: env_parse("ROLLBACK_MIN_ACCURACY", 0.50)?,
            perf_check_interval: env_parse("RISK_PERF_CHECK_INTERVAL", 10)?,
        };

        let paper = PaperSettings {
            starting_cash: env_parse("PAPER_STARTING_CASH", 100_000.0)?,
            publish_interval: Duration::from_secs_f64(
                env_parse("PAPER_PORTFOLIO_PUBLISH_SECONDS", 2.0)?,
            ),
        };

        let broker = match execution_mode {
            ExecutionMode::Paper => None,
            ExecutionMode::Live => Some(BrokerSettings {
                api_key: env_required("ALPACA_API_KEY")?,
                secret_key: env_required("ALPACA_SECRET_KEY")?,
                base_url: std::env::var("ALPACA_BASE_URL")
                    .unwrap_or_else(|_| ALPACA_PAPER_BASE.to_string()),
                account_poll_interval: Duration::from_secs(env_parse("ACCOUNT_POLL_SECONDS", 30)?),
                circuit_breaker_drawdown_pct: env_parse("CIRCUIT_BREAKER_DRAWDOWN_PCT", 0.03)?,
            }),
        };

        let audit_log_path = PathBuf::from(
            std::env::var("AUDIT_LOG_PATH")
                .unwrap_or_else(|_| "./logs/trade_audit.jsonl".to_string()),
        );

        Ok(Self {
            execution_mode,
            symbols,
            risk,
            paper,
            broker,
            audit_log_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state, so each one uses its own keys
    // only through the typed helpers below.

    #[test]
    fn test_execution_mode_parse() {
        assert_eq!(ExecutionMode::parse("paper").unwrap(), ExecutionMode::Paper);
        assert_eq!(ExecutionMode::parse(" LIVE ").unwrap(), ExecutionMode::Live);
        assert!(ExecutionMode::parse("backtest").is_err());
    }

    #[test]
    fn test_env_parse_uses_default_when_unset() {
        std::env::remove_var("QA_TEST_UNSET_KEY");
        let value: f64 = env_parse("QA_TEST_UNSET_KEY", 0.03).unwrap();
        assert_eq!(value, 0.03);
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("QA_TEST_BAD_KEY", "not-a-number");
        let result: Result<f64, _> = env_parse("QA_TEST_BAD_KEY", 0.0);
        assert!(result.is_err());
        std::env::remove_var("QA_TEST_BAD_KEY");
    }

    #[test]
    fn test_env_required_rejects_empty() {
        std::env::set_var("QA_TEST_EMPTY_KEY", "  ");
        assert!(matches!(
            env_required("QA_TEST_EMPTY_KEY"),
            Err(ConfigError::MissingKey(_))
        ));
        std::env::remove_var("QA_TEST_EMPTY_KEY");
    }

    #[test]
    fn test_risk_settings_convert_to_engine_config() {
        let settings = RiskSettings {
            max_daily_loss_pct: 0.05,
            risk_per_trade_pct: 0.02,
            max_consecutive_losses: 3,
            rollback_min_sharpe: 1.0,
            rollback_min_accuracy: 0.6,
            perf_check_interval: 5,
        };
        let config: RiskEngineConfig = (&settings).into();
        assert_eq!(config.max_daily_loss_pct, 0.05);
        assert_eq!(config.max_consecutive_losses, 3);
    }
}

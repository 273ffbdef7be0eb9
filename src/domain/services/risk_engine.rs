//! Risk governance core: kill switch, fixed-fractional position sizing,
//! and the model-performance rollback state machine.
//!
//! The kill switch is one-way: once active it stays active until an
//! explicit operator reset. Rollback to manual-approval mode likewise
//! latches until reset.

use std::collections::VecDeque;

use tracing::{error, info, warn};

/// Bounded window for rolling prediction/return metrics.
const WINDOW_SIZE: usize = 20;
/// Minimum samples before rolling metrics are considered meaningful.
const MIN_SAMPLES: usize = 5;
/// Trading days per year, for annualising the rolling Sharpe.
const ANNUALISATION: f64 = 252.0;

#[derive(Debug, Clone)]
pub struct RiskEngineConfig {
    pub max_daily_loss_pct: f64,
    pub risk_per_trade_pct: f64,
    pub max_consecutive_losses: u32,
    pub rollback_min_sharpe: f64,
    pub rollback_min_accuracy: f64,
}

impl Default for RiskEngineConfig {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: 0.03,
            risk_per_trade_pct: 0.01,
            max_consecutive_losses: 5,
            rollback_min_sharpe: 0.5,
            rollback_min_accuracy: 0.50,
        }
    }
}

pub struct RiskEngine {
    config: RiskEngineConfig,
    starting_equity: f64,
    current_equity: f64,
    daily_pnl: f64,
    consecutive_losses: u32,
    recent_predictions: VecDeque<bool>,
    recent_returns: VecDeque<f64>,
    kill_switch_active: bool,
    manual_approval_mode: bool,
}

impl RiskEngine {
    pub fn new(config: RiskEngineConfig) -> Self {
        Self {
            config,
            starting_equity: 0.0,
            current_equity: 0.0,
            daily_pnl: 0.0,
            consecutive_losses: 0,
            recent_predictions: VecDeque::with_capacity(WINDOW_SIZE),
            recent_returns: VecDeque::with_capacity(WINDOW_SIZE),
            kill_switch_active: false,
            manual_approval_mode: false,
        }
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch_active
    }

    pub fn is_manual_approval_mode(&self) -> bool {
        self.manual_approval_mode
    }

    pub fn current_equity(&self) -> f64 {
        self.current_equity
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Refresh account state. `starting_equity` anchors on the first call
    /// (approximating start-of-day equity when the engine restarts
    /// mid-session) and stays pinned until an explicit reset.
    pub fn update_account_state(&mut self, equity: f64, daily_pnl: f64) {
        self.current_equity = equity;
        self.daily_pnl = daily_pnl;
        if self.starting_equity == 0.0 {
            self.starting_equity = equity - daily_pnl;
        }
    }

    /// Evaluate whether trading should be hard-halted. Activates (and
    /// latches) the kill switch when the daily drawdown reaches
    /// `-max_daily_loss_pct` or the consecutive-loss limit is hit.
    pub fn check_kill_switch(&mut self) -> bool {
        if self.starting_equity <= 0.0 {
            return false;
        }

        let drawdown_pct = self.daily_pnl / self.starting_equity;
        if drawdown_pct <= -self.config.max_daily_loss_pct {
            error!(
                drawdown_pct,
                limit = -self.config.max_daily_loss_pct,
                "KILL SWITCH: daily drawdown limit breached"
            );
            self.kill_switch_active = true;
            return true;
        }

        if self.consecutive_losses >= self.config.max_consecutive_losses {
            error!(
                losses = self.consecutive_losses,
                limit = self.config.max_consecutive_losses,
                "KILL SWITCH: consecutive loss limit breached"
            );
            self.kill_switch_active = true;
            return true;
        }

        false
    }

    /// Record the outcome of a closed trade for the consecutive-loss
    /// counter: losses increment, any non-negative result resets.
    pub fn record_trade_result(&mut self, pnl: f64) {
        if pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Fixed-fractional sizing:
    /// `qty = floor(equity * risk_per_trade_pct / |entry - stop|)`.
    /// Returns 0 when the kill switch is active or inputs are degenerate.
    pub fn calculate_position_size(&self, entry_price: f64, stop_loss: f64) -> u32 {
        if self.kill_switch_active {
            return 0;
        }
        let risk_amount = self.current_equity * self.config.risk_per_trade_pct;
        let risk_per_share = (entry_price - stop_loss).abs();
        if risk_per_share == 0.0 {
            error!("Invalid stop loss equal to entry price; sizing to 0");
            return 0;
        }
        let qty = (risk_amount / risk_per_share).floor();
        if qty.is_finite() && qty > 0.0 {
            qty as u32
        } else {
            0
        }
    }

    /// Pre-execution gate: false when the kill switch or manual-approval
    /// mode suppresses auto-execution.
    pub fn validate_signal(&self) -> bool {
        if self.kill_switch_active {
            warn!("Signal rejected: kill switch active");
            return false;
        }
        if self.manual_approval_mode {
            info!("Signal queued: manual approval mode active, auto-execution suspended");
            return false;
        }
        true
    }

    /// Log one prediction outcome into the rolling performance window.
    pub fn record_prediction(&mut self, correct: bool, trade_return_pct: f64) {
        self.recent_predictions.push_back(correct);
        self.recent_returns.push_back(trade_return_pct);
        while self.recent_predictions.len() > WINDOW_SIZE {
            self.recent_predictions.pop_front();
        }
        while self.recent_returns.len() > WINDOW_SIZE {
            self.recent_returns.pop_front();
        }
    }

    /// Rolling directional accuracy, `None` with insufficient data.
    pub fn rolling_accuracy(&self) -> Option<f64> {
        if self.recent_predictions.len() < MIN_SAMPLES {
            return None;
        }
        let correct = self.recent_predictions.iter().filter(|&&c| c).count();
        Some(correct as f64 / self.recent_predictions.len() as f64)
    }

    /// Annualised rolling Sharpe over the window; `None` with fewer than
    /// five samples or zero volatility.
    pub fn rolling_sharpe(&self) -> Option<f64> {
        let n = self.recent_returns.len();
        if n < MIN_SAMPLES {
            return None;
        }
        let mean: f64 = self.recent_returns.iter().sum::<f64>() / n as f64;
        let variance: f64 =
            self.recent_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64;
        let std = variance.sqrt();
        if std == 0.0 {
            return None;
        }
        let sharpe = (mean / std) * ANNUALISATION.sqrt();
        Some((sharpe * 10_000.0).round() / 10_000.0)
    }

    /// Evaluate rolling metrics and latch manual-approval mode when the
    /// Sharpe or accuracy floor is broken. Returns the trigger reason on a
    /// fresh activation; check-only once already in manual mode.
    pub fn check_model_performance(&mut self) -> Option<String> {
        if self.manual_approval_mode {
            return None;
        }

        let sharpe = self.rolling_sharpe();
        let accuracy = self.rolling_accuracy();
        let mut reason = String::new();

        if let Some(s) = sharpe {
            if s < self.config.rollback_min_sharpe {
                reason = format!(
                    "Rolling Sharpe {:.2} below threshold {:.2}.",
                    s, self.config.rollback_min_sharpe
                );
            }
        }
        if let Some(a) = accuracy {
            if a < self.config.rollback_min_accuracy {
                if !reason.is_empty() {
                    reason.push(' ');
                }
                reason.push_str(&format!(
                    "Rolling accuracy {:.1}% below threshold {:.1}%.",
                    a * 100.0,
                    self.config.rollback_min_accuracy * 100.0
                ));
            }
        }

        if reason.is_empty() {
            return None;
        }

        self.manual_approval_mode = true;
        warn!(%reason, "MODEL ROLLBACK: switching to manual approval mode");
        Some(reason)
    }

    /// Re-enable auto-execution after manual review confirms model health.
    pub fn reset_manual_approval_mode(&mut self) {
        self.manual_approval_mode = false;
        info!("Manual approval mode reset; auto-execution resumed");
    }

    /// Clear the kill switch after operator review. Re-anchors the
    /// starting equity and wipes the daily counters for the new session.
    pub fn reset_kill_switch(&mut self) {
        self.kill_switch_active = false;
        self.consecutive_losses = 0;
        self.starting_equity = self.current_equity;
        self.daily_pnl = 0.0;
        warn!("Kill switch reset; starting equity anchored to current equity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RiskEngine {
        let mut engine = RiskEngine::new(RiskEngineConfig::default());
        engine.update_account_state(100_000.0, 0.0);
        engine
    }

    #[test]
    fn test_starting_equity_anchors_on_first_update() {
        let mut engine = RiskEngine::new(RiskEngineConfig::default());
        // First update mid-session: anchor = equity - daily_pnl = 100k.
        engine.update_account_state(98_000.0, -2_000.0);
        assert!(!engine.check_kill_switch());
        // The anchor stays pinned, so -5k is a 5% drawdown.
        engine.update_account_state(95_000.0, -5_000.0);
        assert!(engine.check_kill_switch());
    }

    #[test]
    fn test_position_size_seed_case() {
        // Equity 100k, risk 0.1% -> $100 risk; price 150, stop 147 -> 33.
        let mut engine = RiskEngine::new(RiskEngineConfig {
            risk_per_trade_pct: 0.001,
            ..Default::default()
        });
        engine.update_account_state(100_000.0, 0.0);
        let qty = engine.calculate_position_size(150.0, 150.0 * 0.98);
        assert_eq!(qty, 33);
    }

    #[test]
    fn test_position_size_zero_when_stop_equals_entry() {
        let engine = engine();
        assert_eq!(engine.calculate_position_size(150.0, 150.0), 0);
    }

    #[test]
    fn test_position_size_zero_when_killed() {
        let mut engine = engine();
        engine.update_account_state(96_000.0, -4_000.0);
        assert!(engine.check_kill_switch());
        assert_eq!(engine.calculate_position_size(150.0, 147.0), 0);
    }

    #[test]
    fn test_kill_switch_fires_exactly_at_drawdown_limit() {
        let mut engine = engine();
        // Exactly -3% of the 100k anchor.
        engine.update_account_state(97_000.0, -3_000.0);
        assert!(engine.check_kill_switch());
        assert!(engine.is_kill_switch_active());
    }

    #[test]
    fn test_kill_switch_not_fired_below_limit() {
        let mut engine = engine();
        engine.update_account_state(97_100.0, -2_900.0);
        assert!(!engine.check_kill_switch());
        assert!(!engine.is_kill_switch_active());
    }

    #[test]
    fn test_kill_switch_fires_exactly_at_loss_count() {
        let mut engine = engine();
        for _ in 0..4 {
            engine.record_trade_result(-10.0);
        }
        assert!(!engine.check_kill_switch());
        engine.record_trade_result(-10.0);
        assert!(engine.check_kill_switch());
    }

    #[test]
    fn test_consecutive_losses_reset_on_winner() {
        let mut engine = engine();
        engine.record_trade_result(-10.0);
        engine.record_trade_result(-10.0);
        engine.record_trade_result(5.0);
        assert_eq!(engine.consecutive_losses(), 0);
    }

    #[test]
    fn test_kill_switch_latches_until_reset() {
        let mut engine = engine();
        engine.update_account_state(96_000.0, -4_000.0);
        assert!(engine.check_kill_switch());
        // Recovery does not clear the latch.
        engine.update_account_state(105_000.0, 5_000.0);
        assert!(engine.is_kill_switch_active());
        assert!(!engine.validate_signal());

        engine.reset_kill_switch();
        assert!(!engine.is_kill_switch_active());
        assert!(engine.validate_signal());
    }

    #[test]
    fn test_rolling_sharpe_none_for_insufficient_samples() {
        let mut engine = engine();
        for _ in 0..4 {
            engine.record_prediction(true, 0.01);
        }
        assert!(engine.rolling_sharpe().is_none());
        assert!(engine.rolling_accuracy().is_none());
    }

    #[test]
    fn test_rolling_sharpe_none_for_zero_volatility() {
        let mut engine = engine();
        for _ in 0..10 {
            engine.record_prediction(true, 0.01);
        }
        assert!(engine.rolling_sharpe().is_none());
    }

    #[test]
    fn test_rolling_windows_bounded() {
        let mut engine = engine();
        for i in 0..50 {
            engine.record_prediction(i % 2 == 0, 0.01 * (i % 3) as f64);
        }
        assert!(engine.recent_predictions.len() <= WINDOW_SIZE);
        assert!(engine.recent_returns.len() <= WINDOW_SIZE);
    }

    #[test]
    fn test_rollback_on_poor_accuracy() {
        let mut engine = engine();
        // 2 correct out of 10 with varied returns so Sharpe is computable.
        for i in 0..10 {
            let correct = i < 2;
            let ret = if correct { 0.01 } else { -0.01 - 0.001 * i as f64 };
            engine.record_prediction(correct, ret);
        }
        let reason = engine.check_model_performance();
        assert!(reason.is_some());
        assert!(engine.is_manual_approval_mode());
        assert!(!engine.validate_signal());
    }

    #[test]
    fn test_rollback_does_not_refire_once_manual() {
        let mut engine = engine();
        for i in 0..10 {
            engine.record_prediction(false, -0.01 - 0.001 * i as f64);
        }
        assert!(engine.check_model_performance().is_some());
        assert!(engine.check_model_performance().is_none());
    }

    #[test]
    fn test_rollback_reset_restores_auto_mode() {
        let mut engine = engine();
        for i in 0..10 {
            engine.record_prediction(false, -0.01 - 0.001 * i as f64);
        }
        engine.check_model_performance();
        engine.reset_manual_approval_mode();
        assert!(!engine.is_manual_approval_mode());
        assert!(engine.validate_signal());
    }

    #[test]
    fn test_healthy_model_not_rolled_back() {
        let mut engine = engine();
        for i in 0..10 {
            engine.record_prediction(true, 0.01 + 0.001 * (i % 4) as f64);
        }
        assert!(engine.check_model_performance().is_none());
        assert!(!engine.is_manual_approval_mode());
    }
}

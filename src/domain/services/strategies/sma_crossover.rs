//! SMA crossover: BUY on the golden cross, SELL on the death cross, with
//! position-state gating so the same cross never fires twice in a row.

use std::collections::VecDeque;

use tracing::info;

use crate::domain::entities::market::{Bar, Tick};
use crate::domain::entities::signal::{FeatureImpact, SignalAction, TradeSignal};
use crate::domain::services::strategies::{build_signal, PositionState};

const MODEL_NAME: &str = "SMA Crossover";

/// Relative fast/slow spread that maps to full confidence.
const FULL_CONFIDENCE_SPREAD: f64 = 0.02;

pub struct SmaCrossover {
    symbol: String,
    model_id: String,
    fast_period: usize,
    slow_period: usize,
    prices: VecDeque<f64>,
    position: PositionState,
}

impl SmaCrossover {
    pub fn new(
        symbol: impl Into<String>,
        model_id: impl Into<String>,
        fast_period: usize,
        slow_period: usize,
    ) -> Result<Self, String> {
        if fast_period == 0 || slow_period == 0 {
            return Err("SMA periods must be non-zero".to_string());
        }
        if fast_period >= slow_period {
            return Err(format!(
                "Fast period ({}) must be shorter than slow period ({})",
                fast_period, slow_period
            ));
        }
        Ok(Self {
            symbol: symbol.into(),
            model_id: model_id.into(),
            fast_period,
            slow_period,
            prices: VecDeque::with_capacity(slow_period),
            position: PositionState::Flat,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn warmup_period(&self) -> usize {
        self.slow_period - 1
    }

    fn mean_of_last(&self, n: usize) -> f64 {
        let len = self.prices.len();
        self.prices.iter().skip(len - n).sum::<f64>() / n as f64
    }

    fn evaluate(&mut self, price: f64) -> Option<TradeSignal> {
        if price <= 0.0 {
            return None;
        }

        if self.prices.len() == self.slow_period {
            self.prices.pop_front();
        }
        self.prices.push_back(price);

        if self.prices.len() < self.slow_period {
            return None;
        }

        let fast_sma = self.mean_of_last(self.fast_period);
        let slow_sma = self.mean_of_last(self.slow_period);
        let spread = (fast_sma - slow_sma) / slow_sma;
        let confidence = (spread.abs() / FULL_CONFIDENCE_SPREAD).min(1.0);

        let action = if fast_sma > slow_sma && self.position != PositionState::Long {
            self.position = PositionState::Long;
            info!(
                symbol = %self.symbol,
                fast = fast_sma,
                slow = slow_sma,
                "Golden cross"
            );
            SignalAction::Buy
        } else if fast_sma < slow_sma && self.position != PositionState::Short {
            self.position = PositionState::Short;
            info!(
                symbol = %self.symbol,
                fast = fast_sma,
                slow = slow_sma,
                "Death cross"
            );
            SignalAction::Sell
        } else {
            return None;
        };

        Some(build_signal(
            &self.model_id,
            MODEL_NAME,
            &self.symbol,
            action,
            confidence,
            price,
            vec![
                FeatureImpact::new("fast_sma", fast_sma),
                FeatureImpact::new("slow_sma", slow_sma),
            ],
        ))
    }

    pub fn on_tick(&mut self, tick: &Tick) -> Option<TradeSignal> {
        self.evaluate(tick.price)
    }

    pub fn on_bar(&mut self, bar: &Bar) -> Option<TradeSignal> {
        self.evaluate(bar.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(price: f64) -> Tick {
        Tick::trade("SPY", price, 10.0, 0)
    }

    /// Nine flat ticks then a jump: fast(5) = 88, slow(10) = 84 -> BUY.
    fn golden_cross_strategy() -> (SmaCrossover, Option<TradeSignal>) {
        let mut strategy = SmaCrossover::new("SPY", "sma_spy", 5, 10).unwrap();
        let mut last = None;
        for _ in 0..9 {
            last = strategy.on_tick(&tick(80.0));
            assert!(last.is_none());
        }
        last = strategy.on_tick(&tick(120.0));
        (strategy, last)
    }

    #[test]
    fn test_no_signal_during_warmup() {
        let mut strategy = SmaCrossover::new("SPY", "sma_spy", 5, 10).unwrap();
        for i in 0..strategy.warmup_period() {
            assert!(strategy.on_tick(&tick(100.0 + i as f64)).is_none());
        }
    }

    #[test]
    fn test_golden_cross_emits_buy() {
        let (_, signal) = golden_cross_strategy();
        let signal = signal.expect("golden cross should emit");
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.symbol, "SPY");
        assert_eq!(signal.price, 120.0);
        assert!(signal.confidence > 0.0 && signal.confidence <= 1.0);
    }

    #[test]
    fn test_no_duplicate_signal_while_long() {
        let (mut strategy, first) = golden_cross_strategy();
        assert!(first.is_some());
        // Still rising; fast stays above slow, so no second BUY.
        let repeat = strategy.on_tick(&tick(125.0));
        assert!(repeat.is_none());
    }

    #[test]
    fn test_death_cross_after_golden_cross() {
        let (mut strategy, _) = golden_cross_strategy();
        let mut seen_sell = false;
        for _ in 0..12 {
            if let Some(signal) = strategy.on_tick(&tick(60.0)) {
                assert_eq!(signal.action, SignalAction::Sell);
                seen_sell = true;
                break;
            }
        }
        assert!(seen_sell);
    }

    #[test]
    fn test_confidence_saturates_at_one() {
        let (_, signal) = golden_cross_strategy();
        // spread = (88 - 84) / 84 = 4.76% >> 2% -> clamped to 1.0
        assert_eq!(signal.unwrap().confidence, 1.0);
    }

    #[test]
    fn test_non_positive_price_ignored() {
        let mut strategy = SmaCrossover::new("SPY", "sma_spy", 5, 10).unwrap();
        assert!(strategy.on_tick(&tick(0.0)).is_none());
        assert!(strategy.on_tick(&tick(-5.0)).is_none());
    }

    #[test]
    fn test_invalid_periods_rejected() {
        assert!(SmaCrossover::new("SPY", "x", 10, 10).is_err());
        assert!(SmaCrossover::new("SPY", "x", 0, 10).is_err());
    }

    #[test]
    fn test_on_bar_uses_close() {
        let mut strategy = SmaCrossover::new("SPY", "sma_spy", 5, 10).unwrap();
        for _ in 0..9 {
            let bar = Bar::flat("SPY", 80.0, 100.0, chrono::Utc::now());
            assert!(strategy.on_bar(&bar).is_none());
        }
        let bar = Bar::flat("SPY", 120.0, 100.0, chrono::Utc::now());
        let signal = strategy.on_bar(&bar).expect("bar-driven golden cross");
        assert_eq!(signal.action, SignalAction::Buy);
    }
}

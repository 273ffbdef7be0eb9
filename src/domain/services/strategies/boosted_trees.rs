//! Gradient-boosted up/down classifier over engineered features. Emits a
//! signal when the winning class probability clears the configured
//! threshold; the top-3 attributions populate the explanation payload.

use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::entities::market::{Bar, Tick};
use crate::domain::entities::signal::{SignalAction, TradeSignal};
use crate::domain::services::features::compute_features;
use crate::domain::services::predictors::BoostedScorer;
use crate::domain::services::strategies::build_signal;

const MODEL_NAME: &str = "Gradient Boost Classifier";
const BUFFER_CAPACITY: usize = 200;
const MIN_BARS: usize = 60;
const TOP_FEATURES: usize = 3;

pub struct BoostedTrees {
    symbol: String,
    model_id: String,
    confidence_threshold: f64,
    bars: VecDeque<Bar>,
    scorer: BoostedScorer,
}

impl BoostedTrees {
    pub fn new(
        symbol: impl Into<String>,
        model_id: impl Into<String>,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            model_id: model_id.into(),
            confidence_threshold,
            bars: VecDeque::with_capacity(BUFFER_CAPACITY),
            scorer: BoostedScorer::new(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn warmup_period(&self) -> usize {
        MIN_BARS - 1
    }

    fn push_bar(&mut self, bar: Bar) {
        if self.bars.len() == BUFFER_CAPACITY {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    fn infer(&self, price: f64) -> Option<TradeSignal> {
        if self.bars.len() < MIN_BARS {
            return None;
        }
        let bars: Vec<Bar> = self.bars.iter().cloned().collect();
        let features = compute_features(&bars);
        let row = features.last()?;

        let prob_up = self.scorer.probability_up(row);
        let (action, confidence) = if prob_up > self.confidence_threshold {
            (SignalAction::Buy, prob_up)
        } else if prob_up < 1.0 - self.confidence_threshold {
            (SignalAction::Sell, 1.0 - prob_up)
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
            self.scorer.top_attributions(row, TOP_FEATURES),
        ))
    }

    fn tick_timestamp(tick: &Tick) -> DateTime<Utc> {
        Utc.timestamp_nanos(tick.timestamp_ns)
    }

    pub fn on_tick(&mut self, tick: &Tick) -> Option<TradeSignal> {
        if tick.price <= 0.0 {
            return None;
        }
        let volume = if tick.size > 0.0 { tick.size } else { 100.0 };
        self.push_bar(Bar::flat(
            &self.symbol,
            tick.price,
            volume,
            Self::tick_timestamp(tick),
        ));
        self.infer(tick.price)
    }

    pub fn on_bar(&mut self, bar: &Bar) -> Option<TradeSignal> {
        if bar.close <= 0.0 {
            return None;
        }
        self.push_bar(bar.clone());
        self.infer(bar.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(price: f64, i: i64) -> Tick {
        Tick::trade("SPY", price, 100.0, i)
    }

    #[test]
    fn test_no_signal_during_warmup() {
        let mut strategy = BoostedTrees::new("SPY", "gb_spy", 0.6);
        for i in 0..strategy.warmup_period() {
            assert!(strategy.on_tick(&tick(100.0 + (i as f64 * 0.3).sin(), i as i64)).is_none());
        }
    }

    #[test]
    fn test_strong_momentum_emits_buy_with_explanation() {
        let mut strategy = BoostedTrees::new("SPY", "gb_spy", 0.6);
        let mut last = None;
        // Accelerating rally drives log returns and MACD decisively positive.
        for i in 0..120 {
            let price = 100.0 * (1.0_f64 + 0.01).powi(i);
            last = strategy.on_tick(&tick(price, i as i64));
        }
        let signal = last.expect("sustained rally should emit");
        assert_eq!(signal.action, SignalAction::Buy);
        assert!(signal.confidence > 0.6);
        assert_eq!(signal.explanation.len(), 3);
        assert!(signal.explanation[0].impact.abs() >= signal.explanation[1].impact.abs());
    }

    #[test]
    fn test_strong_downtrend_emits_sell() {
        let mut strategy = BoostedTrees::new("SPY", "gb_spy", 0.6);
        let mut last = None;
        for i in 0..120 {
            let price = 100.0 * (1.0 - 0.01_f64).powi(i);
            last = strategy.on_tick(&tick(price, i as i64));
        }
        let signal = last.expect("sustained slide should emit");
        assert_eq!(signal.action, SignalAction::Sell);
    }

    #[test]
    fn test_flat_market_stays_quiet() {
        let mut strategy = BoostedTrees::new("SPY", "gb_spy", 0.6);
        for i in 0..120 {
            let signal = strategy.on_tick(&tick(100.0, i as i64));
            assert!(signal.is_none(), "flat market should not clear the threshold");
        }
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut strategy = BoostedTrees::new("SPY", "gb_spy", 0.9);
        for i in 0..(BUFFER_CAPACITY + 50) {
            strategy.on_tick(&tick(100.0, i as i64));
        }
        assert_eq!(strategy.bars.len(), BUFFER_CAPACITY);
    }
}

//! Sequence predictors (recurrent and attention flavours) over a lookback
//! window of engineered features, z-score normalised within the window.
//! The model output is a scalar in (0, 1); crossing the BUY or SELL
//! threshold emits a signal.

use std::collections::VecDeque;

use chrono::{TimeZone, Utc};

use crate::domain::entities::market::{Bar, Tick};
use crate::domain::entities::signal::{FeatureImpact, SignalAction, TradeSignal};
use crate::domain::services::features::{compute_features, FeatureBar};
use crate::domain::services::predictors::{SequenceFlavor, SequencePredictor};
use crate::domain::services::strategies::build_signal;

const BUFFER_CAPACITY: usize = 240;
const WARMUP_BARS: usize = 120;
const EPSILON: f64 = 1e-8;

pub struct SequenceStrategy {
    symbol: String,
    model_id: String,
    model_name: String,
    lookback: usize,
    buy_threshold: f64,
    sell_threshold: f64,
    bars: VecDeque<Bar>,
    predictor: SequencePredictor,
}

impl SequenceStrategy {
    pub fn new(
        symbol: impl Into<String>,
        model_id: impl Into<String>,
        flavor: SequenceFlavor,
        lookback: usize,
        buy_threshold: f64,
        sell_threshold: f64,
    ) -> Self {
        let model_name = match flavor {
            SequenceFlavor::Recurrent => "Recurrent Predictor",
            SequenceFlavor::Attention => "Attention Predictor",
        };
        Self {
            symbol: symbol.into(),
            model_id: model_id.into(),
            model_name: model_name.to_string(),
            lookback: lookback.max(2),
            buy_threshold,
            sell_threshold,
            bars: VecDeque::with_capacity(BUFFER_CAPACITY),
            predictor: SequencePredictor::new(flavor),
        }
    }

    /// Recurrent flavour with the production defaults.
    pub fn recurrent(symbol: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::new(symbol, model_id, SequenceFlavor::Recurrent, 60, 0.62, 0.38)
    }

    /// Attention flavour with the production defaults.
    pub fn attention(symbol: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::new(symbol, model_id, SequenceFlavor::Attention, 60, 0.62, 0.38)
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn warmup_period(&self) -> usize {
        WARMUP_BARS - 1
    }

    fn push_bar(&mut self, bar: Bar) {
        if self.bars.len() == BUFFER_CAPACITY {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    /// Z-score each feature column within the window.
    fn normalise_window(window: &[FeatureBar]) -> Vec<[f64; 10]> {
        let n = window.len() as f64;
        let mut means = [0.0_f64; 10];
        for row in window {
            for (j, v) in row.values().iter().enumerate() {
                means[j] += v / n;
            }
        }
        let mut stds = [0.0_f64; 10];
        for row in window {
            for (j, v) in row.values().iter().enumerate() {
                stds[j] += (v - means[j]).powi(2) / n;
            }
        }
        for s in &mut stds {
            *s = s.sqrt() + EPSILON;
        }

        window
            .iter()
            .map(|row| {
                let mut out = [0.0_f64; 10];
                for (j, v) in row.values().iter().enumerate() {
                    out[j] = (v - means[j]) / stds[j];
                }
                out
            })
            .collect()
    }

    fn infer(&self, price: f64) -> Option<TradeSignal> {
        if self.bars.len() < WARMUP_BARS {
            return None;
        }
        let bars: Vec<Bar> = self.bars.iter().cloned().collect();
        let features = compute_features(&bars);
        if features.len() < self.lookback {
            return None;
        }

        let window = &features[features.len() - self.lookback..];
        let tensor = Self::normalise_window(window);
        let output = self.predictor.predict(&tensor);

        let (action, confidence) = if output >= self.buy_threshold {
            (SignalAction::Buy, output)
        } else if output <= self.sell_threshold {
            (SignalAction::Sell, 1.0 - output)
        } else {
            return None;
        };

        let last = tensor.last()?;
        Some(build_signal(
            &self.model_id,
            &self.model_name,
            &self.symbol,
            action,
            confidence,
            price,
            vec![
                FeatureImpact::new("model_output", output),
                FeatureImpact::new("log_ret_z", last[1]),
            ],
        ))
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
            Utc.timestamp_nanos(tick.timestamp_ns),
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

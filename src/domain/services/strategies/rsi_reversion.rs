//! RSI mean-reversion: BUY when Wilder RSI drops to the oversold level,
//! SELL when it reaches the overbought level, gated on position state.
//! Confidence scales with how far past the threshold the reading is.

use tracing::info;

use crate::domain::entities::market::{Bar, Tick};
use crate::domain::entities::signal::{FeatureImpact, SignalAction, TradeSignal};
use crate::domain::services::strategies::{build_signal, PositionState};

const MODEL_NAME: &str = "RSI Mean Reversion";
const MIN_CONFIDENCE: f64 = 0.1;

pub struct RsiReversion {
    symbol: String,
    model_id: String,
    period: usize,
    oversold: f64,
    overbought: f64,
    prev_price: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    changes_seen: usize,
    position: PositionState,
}

impl RsiReversion {
    pub fn new(
        symbol: impl Into<String>,
        model_id: impl Into<String>,
        period: usize,
        oversold: f64,
        overbought: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            model_id: model_id.into(),
            period: period.max(1),
            oversold,
            overbought,
            prev_price: None,
            avg_gain: 0.0,
            avg_loss: 0.0,
            changes_seen: 0,
            position: PositionState::Flat,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn warmup_period(&self) -> usize {
        self.period
    }

    /// Feed one price change into the Wilder smoothing state; returns the
    /// RSI once enough changes have accumulated.
    fn update_rsi(&mut self, price: f64) -> Option<f64> {
        let prev = match self.prev_price.replace(price) {
            Some(p) => p,
            None => return None,
        };

        let change = price - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.changes_seen += 1;
        let period = self.period as f64;

        if self.changes_seen < self.period {
            self.avg_gain += gain;
            self.avg_loss += loss;
            return None;
        }
        if self.changes_seen == self.period {
            self.avg_gain = (self.avg_gain + gain) / period;
            self.avg_loss = (self.avg_loss + loss) / period;
        } else {
            self.avg_gain = (self.avg_gain * (period - 1.0) + gain) / period;
            self.avg_loss = (self.avg_loss * (period - 1.0) + loss) / period;
        }

        if self.avg_loss == 0.0 {
            return Some(100.0);
        }
        let rs = self.avg_gain / self.avg_loss;
        Some(100.0 - (100.0 / (1.0 + rs)))
    }

    fn evaluate(&mut self, price: f64) -> Option<TradeSignal> {
        if price <= 0.0 {
            return None;
        }
        let rsi = self.update_rsi(price)?;

        let action = if rsi <= self.oversold && self.position != PositionState::Long {
            self.position = PositionState::Long;
            info!(symbol = %self.symbol, rsi, threshold = self.oversold, "RSI oversold");
            SignalAction::Buy
        } else if rsi >= self.overbought && self.position != PositionState::Short {
            self.position = PositionState::Short;
            info!(symbol = %self.symbol, rsi, threshold = self.overbought, "RSI overbought");
            SignalAction::Sell
        } else {
            return None;
        };

        // Normalised distance past the threshold, floored at 0.1.
        let raw = match action {
            SignalAction::Buy if self.oversold > 0.0 => (self.oversold - rsi) / self.oversold,
            SignalAction::Sell if self.overbought < 100.0 => {
                (rsi - self.overbought) / (100.0 - self.overbought)
            }
            _ => 0.0,
        };
        let confidence = raw.min(1.0).max(MIN_CONFIDENCE);

        Some(build_signal(
            &self.model_id,
            MODEL_NAME,
            &self.symbol,
            action,
            confidence,
            price,
            vec![FeatureImpact::new("rsi", rsi)],
        ))
    }

    pub fn on_tick(&mut self, tick: &Tick) -> Option<TradeSignal> {
        self.evaluate(tick.price)
    }

    pub fn on_bar(&mut self, bar: &Bar) -> Option<TradeSignal> {
        self.evaluate(bar.close)
    }
}

//! Strategy contract and the built-in strategy families.
//!
//! Strategies are modelled as a tagged variant rather than trait objects:
//! the full capability set (`on_tick`, `on_bar`, `warmup_period`) is
//! resolved by construction, and the signal engine iterates a plain
//! `Vec<StrategyKind>` in deterministic order.

pub mod boosted_trees;
pub mod rsi_reversion;
pub mod sequence;
pub mod sma_crossover;

use chrono::Utc;

use crate::domain::entities::market::{Bar, Tick};
use crate::domain::entities::signal::{FeatureImpact, SignalAction, TradeSignal};

pub use boosted_trees::BoostedTrees;
pub use rsi_reversion::RsiReversion;
pub use sequence::SequenceStrategy;
pub use sma_crossover::SmaCrossover;

/// The position a signal-gated strategy believes it is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

/// Shared signal constructor so every family emits the same shape.
pub(crate) fn build_signal(
    model_id: &str,
    model_name: &str,
    symbol: &str,
    action: SignalAction,
    confidence: f64,
    price: f64,
    explanation: Vec<FeatureImpact>,
) -> TradeSignal {
    TradeSignal {
        model_id: model_id.to_string(),
        model_name: model_name.to_string(),
        symbol: symbol.to_string(),
        action,
        confidence,
        price,
        timestamp: Utc::now(),
        explanation,
    }
}

/// One hosted strategy: a `(family, symbol)` pair with its own state.
pub enum StrategyKind {
    SmaCrossover(SmaCrossover),
    RsiReversion(RsiReversion),
    BoostedTrees(BoostedTrees),
    Sequence(SequenceStrategy),
}

impl StrategyKind {
    pub fn model_id(&self) -> &str {
        match self {
            StrategyKind::SmaCrossover(s) => s.model_id(),
            StrategyKind::RsiReversion(s) => s.model_id(),
            StrategyKind::BoostedTrees(s) => s.model_id(),
            StrategyKind::Sequence(s) => s.model_id(),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            StrategyKind::SmaCrossover(s) => s.symbol(),
            StrategyKind::RsiReversion(s) => s.symbol(),
            StrategyKind::BoostedTrees(s) => s.symbol(),
            StrategyKind::Sequence(s) => s.symbol(),
        }
    }

    /// Number of inputs guaranteed to produce no signal while the internal
    /// buffers warm up.
    pub fn warmup_period(&self) -> usize {
        match self {
            StrategyKind::SmaCrossover(s) => s.warmup_period(),
            StrategyKind::RsiReversion(s) => s.warmup_period(),
            StrategyKind::BoostedTrees(s) => s.warmup_period(),
            StrategyKind::Sequence(s) => s.warmup_period(),
        }
    }

    pub fn on_tick(&mut self, tick: &Tick) -> Option<TradeSignal> {
        match self {
            StrategyKind::SmaCrossover(s) => s.on_tick(tick),
            StrategyKind::RsiReversion(s) => s.on_tick(tick),
            StrategyKind::BoostedTrees(s) => s.on_tick(tick),
            StrategyKind::Sequence(s) => s.on_tick(tick),
        }
    }

    pub fn on_bar(&mut self, bar: &Bar) -> Option<TradeSignal> {
        match self {
            StrategyKind::SmaCrossover(s) => s.on_bar(bar),
            StrategyKind::RsiReversion(s) => s.on_bar(bar),
            StrategyKind::BoostedTrees(s) => s.on_bar(bar),
            StrategyKind::Sequence(s) => s.on_bar(bar),
        }
    }
}

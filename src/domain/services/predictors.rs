//! Opaque predictors backing the model-driven strategies.
//!
//! The arena treats model internals as black boxes: the contract is a
//! feature vector in and a probability (or scalar score) out, plus
//! per-feature attributions for the explainability payload. The shipped
//! predictors are deterministic additive scorers so the pipeline behaves
//! identically across runs; swapping in trained weights does not change
//! any interface.

use crate::domain::entities::signal::FeatureImpact;
use crate::domain::services::features::FeatureBar;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Gradient-boosted-style binary up/down classifier over a single
/// engineered feature row.
pub struct BoostedScorer {
    weights: Vec<(&'static str, f64)>,
}

impl BoostedScorer {
    pub fn new() -> Self {
        Self {
            // Momentum-dominant with mean-reversion correction terms.
            weights: vec![
                ("log_ret", 60.0),
                ("rsi_centered", -0.35),
                ("macd_rel", 10.0),
                ("bb_position", -0.2),
                ("atr_rel", -0.3),
            ],
        }
    }

    /// Derived model inputs, bounded transforms of the raw feature row.
    fn inputs(row: &FeatureBar) -> Vec<(&'static str, f64)> {
        let band_width = (row.bb_upper - row.bb_lower).max(1e-8);
        vec![
            ("log_ret", row.log_ret),
            ("rsi_centered", (row.rsi - 50.0) / 50.0),
            ("macd_rel", row.macd / row.close.max(1e-8)),
            ("bb_position", (row.close - row.bb_middle) / band_width),
            ("atr_rel", row.atr / row.close.max(1e-8)),
        ]
    }

    /// Probability that the next move is up.
    pub fn probability_up(&self, row: &FeatureBar) -> f64 {
        let score: f64 = Self::inputs(row)
            .iter()
            .zip(&self.weights)
            .map(|((_, value), (_, weight))| value * weight)
            .sum();
        sigmoid(score)
    }

    /// Per-feature contributions to the score, one entry per model input.
    pub fn attributions(&self, row: &FeatureBar) -> Vec<FeatureImpact> {
        Self::inputs(row)
            .iter()
            .zip(&self.weights)
            .map(|((name, value), (_, weight))| FeatureImpact::new(*name, value * weight))
            .collect()
    }

    /// The top `n` attributions by absolute impact, highest first.
    pub fn top_attributions(&self, row: &FeatureBar, n: usize) -> Vec<FeatureImpact> {
        let mut impacts = self.attributions(row);
        impacts.sort_by(|a, b| {
            b.impact
                .abs()
                .partial_cmp(&a.impact.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        impacts.truncate(n);
        impacts
    }
}

impl Default for BoostedScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Flavour of sequence predictor hosted by the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFlavor {
    /// Recurrent state folded over the window, most recent steps dominate.
    Recurrent,
    /// Attention-weighted pooling over the window.
    Attention,
}

/// Sequence predictor over a z-scored `[lookback x n_features]` window.
/// Column 1 is the log return (see [`FeatureBar::NAMES`]); the output is a
/// scalar in `(0, 1)` where values above 0.5 favour upward movement.
pub struct SequencePredictor {
    pub flavor: SequenceFlavor,
}

impl SequencePredictor {
    pub fn new(flavor: SequenceFlavor) -> Self {
        Self { flavor }
    }

    pub fn predict(&self, window: &[[f64; 10]]) -> f64 {
        if window.is_empty() {
            return 0.5;
        }
        match self.flavor {
            SequenceFlavor::Recurrent => self.recurrent(window),
            SequenceFlavor::Attention => self.attention(window),
        }
    }

    fn recurrent(&self, window: &[[f64; 10]]) -> f64 {
        let mut hidden = 0.0_f64;
        for row in window {
            hidden = (0.85 * hidden + 0.6 * row[1]).tanh();
        }
        sigmoid(2.2 * hidden)
    }

    fn attention(&self, window: &[[f64; 10]]) -> f64 {
        let n = window.len() as f64;
        let scores: Vec<f64> = window
            .iter()
            .enumerate()
            .map(|(i, row)| (i as f64 + 1.0) / n + row[1].abs())
            .collect();
        let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = scores.iter().map(|s| (s - max_score).exp()).collect();
        let denom: f64 = exp.iter().sum();
        let context: f64 = window
            .iter()
            .zip(&exp)
            .map(|(row, e)| row[1] * e / denom)
            .sum();
        sigmoid(3.0 * context)
    }
}

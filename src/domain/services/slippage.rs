//! Slippage model for simulated fills: gaussian market noise plus a
//! size-impact term plus a fixed base cost, always applied against the
//! order (BUY executes higher, SELL executes lower).

use rand_distr::{Distribution, Normal};

use crate::domain::entities::fill::FillSide;

/// Standard deviation of the market-noise component (1 bp).
const NOISE_STD: f64 = 0.0001;
/// Price impact per share.
const IMPACT_PER_SHARE: f64 = 5.0e-9;

pub struct SlippageModel {
    base_bps: f64,
    noise: Normal<f64>,
}

impl SlippageModel {
    pub fn new(base_bps: f64) -> Self {
        Self {
            base_bps,
            noise: Normal::new(0.0, NOISE_STD).expect("noise std dev is positive"),
        }
    }

    /// Execution price after slippage. A non-positive decision price is
    /// returned unchanged (the caller rejects it upstream).
    pub fn execution_price(&self, decision_price: f64, side: FillSide, qty: u32) -> f64 {
        if decision_price <= 0.0 {
            return decision_price;
        }
        let noise = self.noise.sample(&mut rand::thread_rng());
        let impact = qty as f64 * IMPACT_PER_SHARE;
        let slippage_pct = noise + impact + self.base_bps / 10_000.0;

        match side {
            FillSide::Buy => decision_price * (1.0 + slippage_pct.abs()),
            FillSide::Sell => decision_price * (1.0 - slippage_pct.abs()),
        }
    }

    /// Adverse price movement of an executed fill, in dollars per share.
    /// Non-negative for any slippage draw.
    pub fn adverse_move(decision_price: f64, executed_price: f64, side: FillSide) -> f64 {
        match side {
            FillSide::Buy => executed_price - decision_price,
            FillSide::Sell => decision_price - executed_price,
        }
    }
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::new(5.0)
    }
}

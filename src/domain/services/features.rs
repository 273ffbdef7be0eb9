//! Feature engineering: a pure transformation from OHLCV bars to the
//! engineered feature rows consumed by the model-driven strategies.

use crate::domain::entities::market::Bar;
use crate::domain::services::indicators::{atr, wilder_rsi, BollingerBands, Macd};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BB_PERIOD: usize = 20;
pub const BB_STD: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;

/// One fully-populated feature row. Every field is finite; rows with any
/// NaN after indicator computation are dropped before they get here.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBar {
    pub close: f64,
    pub log_ret: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub atr: f64,
}

impl FeatureBar {
    pub const NAMES: [&'static str; 10] = [
        "close",
        "log_ret",
        "rsi",
        "macd",
        "macd_signal",
        "macd_hist",
        "bb_upper",
        "bb_middle",
        "bb_lower",
        "atr",
    ];

    /// Column values in `NAMES` order, for window-tensor consumers.
    pub fn values(&self) -> [f64; 10] {
        [
            self.close,
            self.log_ret,
            self.rsi,
            self.macd,
            self.macd_signal,
            self.macd_hist,
            self.bb_upper,
            self.bb_middle,
            self.bb_lower,
            self.atr,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }
}

/// Compute the engineered feature rows for a bar series. The output is
/// shorter than the input: warm-up rows and any row with a non-finite
/// value are dropped.
pub fn compute_features(bars: &[Bar]) -> Vec<FeatureBar> {
    if bars.len() < 2 {
        return Vec::new();
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let mut log_ret = vec![f64::NAN; closes.len()];
    for i in 1..closes.len() {
        if closes[i] > 0.0 && closes[i - 1] > 0.0 {
            log_ret[i] = (closes[i] / closes[i - 1]).ln();
        }
    }

    let rsi = wilder_rsi(&closes, RSI_PERIOD);
    let macd = Macd::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL).calculate(&closes);
    let bands = BollingerBands::new(BB_PERIOD, BB_STD).calculate(&closes);
    let atr_series = atr(bars, ATR_PERIOD);

    let mut rows = Vec::with_capacity(bars.len());
    for i in 0..bars.len() {
        let row = FeatureBar {
            close: closes[i],
            log_ret: log_ret[i],
            rsi: rsi[i],
            macd: macd.line[i],
            macd_signal: macd.signal[i],
            macd_hist: macd.histogram[i],
            bb_upper: bands.upper[i],
            bb_middle: bands.middle[i],
            bb_lower: bands.lower[i],
            atr: atr_series[i],
        };
        if row.is_finite() {
            rows.push(row);
        }
    }
    rows
}

//! Technical indicator toolkit.
//!
//! Every function returns a series aligned with its input: positions that
//! fall inside an indicator's warm-up window are `NaN`. Downstream feature
//! engineering drops rows containing any non-finite value, so alignment
//! stays trivial across indicators with different warm-up lengths.

use crate::domain::entities::market::Bar;

/// Simple moving average over the closes, NaN until `period` values exist.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut window_sum: f64 = values[..period].iter().sum();
    out[period - 1] = window_sum / period as f64;
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        out[i] = window_sum / period as f64;
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values.
pub struct Ema {
    pub period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Ema { period }
    }

    pub fn calculate(&self, values: &[f64]) -> Vec<f64> {
        let mut out = vec![f64::NAN; values.len()];
        if self.period == 0 || values.len() < self.period {
            return out;
        }
        let multiplier = 2.0 / (self.period as f64 + 1.0);
        let mut ema: f64 = values[..self.period].iter().sum::<f64>() / self.period as f64;
        out[self.period - 1] = ema;
        for i in self.period..values.len() {
            ema = (values[i] - ema) * multiplier + ema;
            out[i] = ema;
        }
        out
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Wilder-smoothed RSI: simple averages over the first `period` changes,
/// then `avg = (avg * (period - 1) + change) / period`.
pub fn wilder_rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_from_averages(avg_gain, avg_loss);

    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = rsi_from_averages(avg_gain, avg_loss);
    }
    out
}

/// MACD line, signal line and histogram, all input-aligned.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub struct Macd {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Macd {
            fast_period,
            slow_period,
            signal_period,
        }
    }

    pub fn calculate(&self, values: &[f64]) -> MacdSeries {
        let n = values.len();
        let fast = Ema::new(self.fast_period).calculate(values);
        let slow = Ema::new(self.slow_period).calculate(values);

        let mut line = vec![f64::NAN; n];
        for i in 0..n {
            if fast[i].is_finite() && slow[i].is_finite() {
                line[i] = fast[i] - slow[i];
            }
        }

        let mut signal = vec![f64::NAN; n];
        if let Some(start) = line.iter().position(|v| v.is_finite()) {
            let segment: Vec<f64> = line[start..].to_vec();
            let smoothed = Ema::new(self.signal_period).calculate(&segment);
            for (offset, value) in smoothed.into_iter().enumerate() {
                signal[start + offset] = value;
            }
        }

        let histogram = line
            .iter()
            .zip(&signal)
            .map(|(l, s)| {
                if l.is_finite() && s.is_finite() {
                    l - s
                } else {
                    f64::NAN
                }
            })
            .collect();

        MacdSeries {
            line,
            signal,
            histogram,
        }
    }
}

/// Upper, middle and lower Bollinger bands; `upper >= middle >= lower`
/// holds wherever the series is finite.
#[derive(Debug, Clone)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub struct BollingerBands {
    pub period: usize,
    pub std_dev: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev: f64) -> Self {
        BollingerBands { period, std_dev }
    }

    pub fn calculate(&self, values: &[f64]) -> BollingerSeries {
        let n = values.len();
        let mut upper = vec![f64::NAN; n];
        let mut middle = vec![f64::NAN; n];
        let mut lower = vec![f64::NAN; n];
        if self.period == 0 || n < self.period {
            return BollingerSeries { upper, middle, lower };
        }

        for i in (self.period - 1)..n {
            let slice = &values[i + 1 - self.period..=i];
            let mean = slice.iter().sum::<f64>() / self.period as f64;
            let variance =
                slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.period as f64;
            let std = variance.sqrt();
            upper[i] = mean + self.std_dev * std;
            middle[i] = mean;
            lower[i] = mean - self.std_dev * std;
        }

        BollingerSeries { upper, middle, lower }
    }
}

/// Wilder-smoothed average true range over OHLC bars; non-negative
/// wherever finite.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let mut true_ranges = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            let prev_close = bars[i - 1].close;
            (bar.high - bar.low)
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        };
        true_ranges.push(tr);
    }

    let mut value: f64 = true_ranges[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = value;
    for i in period..bars.len() {
        value = (value * (period as f64 - 1.0) + true_ranges[i]) / period as f64;
        out[i] = value;
    }
    out
}

//! Adaptive and momentum oscillators from Kaufman's *Trading Systems and
//! Methods*.

use super::{ema_defined, sma, window_max, window_min};

/// Kaufman Adaptive Moving Average (KAMA)
///
/// The smoothing constant moves between the fast and slow EMA constants
/// according to the efficiency ratio over `period` bars:
/// `sc = (ER·(fast_sc − slow_sc) + slow_sc)²`.
///
/// # Arguments
/// * `period` - efficiency ratio lookback
/// * `fast` / `slow` - EMA lengths bounding the adaptive constant
///
/// Seeded with the price at `period − 1`; everything earlier is `None`. A
/// series shorter than `period` is all `None`.
pub fn kama(prices: &[f64], period: usize, fast: f64, slow: f64) -> Vec<Option<f64>> {
    let mut result = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return result;
    }

    let fast_sc = 2.0 / (fast + 1.0);
    let slow_sc = 2.0 / (slow + 1.0);

    let mut prev = prices[period - 1];
    result[period - 1] = Some(prev);
    for i in period..prices.len() {
        let er = efficiency_at(prices, i, period);
        let sc = (er * (fast_sc - slow_sc) + slow_sc).powi(2);
        prev += sc * (prices[i] - prev);
        result[i] = Some(prev);
    }
    result
}

/// Percentage difference between a fast and a slow SMA.
pub fn price_oscillator(prices: &[f64], fast: usize, slow: usize) -> Vec<Option<f64>> {
    let fast_ma = sma(prices, fast);
    let slow_ma = sma(prices, slow);

    fast_ma
        .into_iter()
        .zip(slow_ma)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) if s.abs() > f64::EPSILON => Some((f - s) / s * 100.0),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        })
        .collect()
}

/// Commodity Channel Index on the typical price `(H + L + C) / 3`, scaled by
/// `factor` times the mean absolute deviation.
pub fn enhanced_cci(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    factor: f64,
) -> Vec<Option<f64>> {
    let mut result = vec![None; close.len()];
    if period == 0 || close.len() < period {
        return result;
    }

    let typical: Vec<f64> = close
        .iter()
        .zip(high.iter().zip(low))
        .map(|(c, (h, l))| (h + l + c) / 3.0)
        .collect();

    for i in (period - 1)..typical.len() {
        let window = &typical[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let mean_dev = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;

        result[i] = Some(if mean_dev > f64::EPSILON * mean.abs().max(1.0) {
            (typical[i] - mean) / (factor * mean_dev)
        } else {
            0.0
        });
    }
    result
}

/// `p[i] − p[i − period]`
pub fn momentum(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            if period > 0 && i >= period {
                Some(prices[i] - prices[i - period])
            } else {
                None
            }
        })
        .collect()
}

/// Momentum as a percentage of the price `period` bars ago. A zero base
/// price gives 0.
pub fn rate_of_change(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            if period == 0 || i < period {
                return None;
            }
            let base = prices[i - period];
            if base.abs() < f64::EPSILON {
                Some(0.0)
            } else {
                Some((prices[i] - base) / base * 100.0)
            }
        })
        .collect()
}

pub struct StochasticMomentum {
    pub smi: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

/// Stochastic Momentum Index
///
/// Distance of the close from the midpoint of the `period` high/low range,
/// double EMA-smoothed together with the range itself:
/// `SMI = 100 · D / (R / 2)`. The signal line is an EMA of the SMI.
/// A zero smoothed range gives 0.
pub fn stochastic_momentum(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    smoothing: usize,
    signal: usize,
) -> StochasticMomentum {
    let len = close.len();
    if period == 0 || len < period {
        return StochasticMomentum {
            smi: vec![None; len],
            signal: vec![None; len],
        };
    }

    let mut relative = vec![None; len];
    let mut range = vec![None; len];
    for i in (period - 1)..len {
        let hh = window_max(high, i, period);
        let ll = window_min(low, i, period);
        relative[i] = Some(close[i] - (hh + ll) / 2.0);
        range[i] = Some(hh - ll);
    }

    let relative = ema_defined(&ema_defined(&relative, smoothing), smoothing);
    let range = ema_defined(&ema_defined(&range, smoothing), smoothing);

    let smi: Vec<Option<f64>> = relative
        .into_iter()
        .zip(range)
        .map(|(d, r)| match (d, r) {
            (Some(d), Some(r)) if r.abs() > f64::EPSILON => Some(100.0 * d / (r / 2.0)),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        })
        .collect();
    let signal = ema_defined(&smi, signal);

    StochasticMomentum { smi, signal }
}

/// Kaufman Efficiency Ratio: net move over the sum of absolute bar moves,
/// in [0, 1]. A flat window gives 0.
pub fn efficiency_ratio(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            if period > 0 && i >= period {
                Some(efficiency_at(prices, i, period))
            } else {
                None
            }
        })
        .collect()
}

fn efficiency_at(prices: &[f64], i: usize, period: usize) -> f64 {
    let change = (prices[i] - prices[i - period]).abs();
    let volatility: f64 = prices[i + 1 - period..=i]
        .iter()
        .zip(&prices[i - period..i])
        .map(|(cur, prev)| (cur - prev).abs())
        .sum();

    if volatility > f64::EPSILON {
        (change / volatility).min(1.0)
    } else {
        0.0
    }
}

/// Accumulation/Distribution oscillator: the close-location value times
/// volume, cumulated into the A/D line, then fast SMA minus slow SMA of
/// that line. Bars with `high == low` contribute nothing.
pub fn accumulation_distribution(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    fast: usize,
    slow: usize,
) -> Vec<Option<f64>> {
    let ad_line: Vec<f64> = close
        .iter()
        .enumerate()
        .scan(0.0_f64, |acc, (i, &c)| {
            let spread = high[i] - low[i];
            let clv = if spread.abs() > f64::EPSILON {
                ((c - low[i]) - (high[i] - c)) / spread
            } else {
                0.0
            };
            *acc += clv * volume[i];
            Some(*acc)
        })
        .collect();

    sma(&ad_line, fast)
        .into_iter()
        .zip(sma(&ad_line, slow))
        .map(|(f, s)| Some(f? - s?))
        .collect()
}

//! Technical oscillators over a single price series.
//!
//! The raw functions in [`kaufman`] and [`ehlers`] take finite values and
//! return a vector aligned with their input: `None` through the warm-up
//! window, `Some(value)` afterwards. [`compute_oscillator`] is the entry point
//! for real series; it copes with missing data and attaches timestamps.

pub mod ehlers;
pub mod kaufman;

use tracing::{debug, info};

use crate::errors::AnalyticsError;
use crate::models::oscillator::{OscillatorKind, OscillatorLine, OscillatorPoint, OscillatorResult};
use crate::models::price_series::PriceSeries;

/// Simple Moving Average (SMA)
/// Returns a vector aligned with `values`:
/// - `None` until `window` values exist
/// - `Some(avg)` afterwards
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    values
        .iter()
        .enumerate()
        .scan(0.0_f64, move |sum, (i, &v)| {
            *sum += v;
            if i >= window {
                *sum -= values[i - window];
            }
            Some(if i + 1 >= window {
                Some(*sum / window as f64)
            } else {
                None
            })
        })
        .collect()
}

/// Exponential Moving Average seeded with the SMA of the first `window`
/// values, so a constant input gives exactly that constant.
pub fn ema(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    let alpha = 2.0 / (window as f64 + 1.0);
    let mut prev = values[..window].iter().sum::<f64>() / window as f64;
    out[window - 1] = Some(prev);
    for i in window..values.len() {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = Some(prev);
    }
    out
}

/// EMA over the defined suffix of an already warmed-up series. Used to
/// chain smoothers (SMI double smoothing, signal lines).
pub(crate) fn ema_defined(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };
    let suffix: Vec<f64> = values[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    for (i, v) in ema(&suffix, window).into_iter().enumerate() {
        out[start + i] = v;
    }
    out
}

/// Highest value of the trailing `window` values ending at `end` (inclusive).
pub(crate) fn window_max(values: &[f64], end: usize, window: usize) -> f64 {
    values[end + 1 - window..=end]
        .iter()
        .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
}

pub(crate) fn window_min(values: &[f64], end: usize, window: usize) -> f64 {
    values[end + 1 - window..=end]
        .iter()
        .fold(f64::INFINITY, |acc, &v| acc.min(v))
}

/// Compute one oscillator over a price series.
///
/// Leading missing closes are skipped (their outputs stay `None`); interior
/// gaps are carried forward from the last known value. Oscillators that read
/// the high/low range or volume fail with a `Validation` error when the series
/// does not carry them.
pub fn compute_oscillator(
    series: &PriceSeries,
    kind: &OscillatorKind,
) -> Result<OscillatorResult, AnalyticsError> {
    validate_params(kind)?;
    info!(
        "Computing {} for {} ({} points)",
        kind.name(),
        series.symbol,
        series.len()
    );

    let closes = series.closes();
    let highs = if kind.needs_range() {
        let highs = series.highs();
        let lows = series.lows();
        match (highs, lows) {
            (Some(h), Some(l)) => Some((h, l)),
            _ => {
                return Err(AnalyticsError::Validation(format!(
                    "{} requires high and low prices, none given for {}",
                    kind.name(),
                    series.symbol
                )))
            }
        }
    } else {
        None
    };
    let volumes = if kind.needs_volume() {
        match series.volumes() {
            Some(v) => Some(v),
            None => {
                return Err(AnalyticsError::Validation(format!(
                    "{} requires volume, none given for {}",
                    kind.name(),
                    series.symbol
                )))
            }
        }
    } else {
        None
    };

    let len = closes.len();
    let start = closes.iter().position(|c| c.is_finite()).unwrap_or(len);
    if start > 0 {
        debug!(skipped = start, "Skipping leading missing closes");
    }

    let close = forward_fill(&closes[start..], f64::NAN);
    let seed = close.first().copied().unwrap_or(f64::NAN);
    let range = highs.map(|(h, l)| (forward_fill(&h[start..], seed), forward_fill(&l[start..], seed)));
    let volume = volumes.map(|v| forward_fill(&v[start..], 0.0));

    let raw_lines = dispatch(kind, &close, range.as_ref(), volume.as_deref());

    let timestamps = series.timestamps();
    let lines: Vec<OscillatorLine> = raw_lines
        .into_iter()
        .map(|(name, values)| {
            let points = timestamps
                .iter()
                .enumerate()
                .map(|(i, ts)| OscillatorPoint {
                    timestamp: *ts,
                    value: if i < start { None } else { values[i - start] },
                })
                .collect();
            OscillatorLine {
                name: name.to_string(),
                points,
            }
        })
        .collect();

    let warmup = lines
        .first()
        .map(|line| line.points.iter().take_while(|p| p.value.is_none()).count())
        .unwrap_or(len);

    Ok(OscillatorResult {
        symbol: series.symbol.clone(),
        oscillator: *kind,
        warmup,
        lines,
    })
}

type Lines = Vec<(&'static str, Vec<Option<f64>>)>;

fn dispatch(
    kind: &OscillatorKind,
    close: &[f64],
    range: Option<&(Vec<f64>, Vec<f64>)>,
    volume: Option<&[f64]>,
) -> Lines {
    // The range/volume presence was checked by the caller for kinds that need it
    let empty: &[f64] = &[];
    let (high, low) = range
        .map(|(h, l)| (h.as_slice(), l.as_slice()))
        .unwrap_or((empty, empty));
    let volume = volume.unwrap_or(empty);

    match *kind {
        OscillatorKind::Kama { period, fast, slow } => {
            vec![("kama", kaufman::kama(close, period, fast, slow))]
        }
        OscillatorKind::PriceOscillator { fast, slow } => {
            vec![("price_oscillator", kaufman::price_oscillator(close, fast, slow))]
        }
        OscillatorKind::EnhancedCci { period, factor } => {
            vec![("enhanced_cci", kaufman::enhanced_cci(high, low, close, period, factor))]
        }
        OscillatorKind::Momentum { period } => vec![("momentum", kaufman::momentum(close, period))],
        OscillatorKind::RateOfChange { period } => {
            vec![("rate_of_change", kaufman::rate_of_change(close, period))]
        }
        OscillatorKind::StochasticMomentum {
            period,
            smoothing,
            signal,
        } => {
            let smi = kaufman::stochastic_momentum(high, low, close, period, smoothing, signal);
            vec![("smi", smi.smi), ("signal", smi.signal)]
        }
        OscillatorKind::EfficiencyRatio { period } => {
            vec![("efficiency_ratio", kaufman::efficiency_ratio(close, period))]
        }
        OscillatorKind::AccumulationDistribution { fast, slow } => vec![(
            "accumulation_distribution",
            kaufman::accumulation_distribution(high, low, close, volume, fast, slow),
        )],
        OscillatorKind::FisherTransform { period } => {
            vec![("fisher", ehlers::fisher_transform(close, period))]
        }
        OscillatorKind::StochasticCenterOfGravity { period } => {
            vec![("stochastic_cg", ehlers::stochastic_center_of_gravity(close, period))]
        }
        OscillatorKind::SuperSmoother { period } => {
            vec![("super_smoother", ehlers::super_smoother(close, period))]
        }
        OscillatorKind::CyclePeriod => vec![("cycle_period", ehlers::cycle_period(close))],
        OscillatorKind::Mama {
            fast_limit,
            slow_limit,
        } => {
            let mama = ehlers::mama(close, fast_limit, slow_limit);
            vec![("mama", mama.mama), ("fama", mama.fama)]
        }
        OscillatorKind::Sinewave => {
            let wave = ehlers::sinewave(close);
            vec![("sine", wave.sine), ("lead_sine", wave.lead_sine)]
        }
        OscillatorKind::HilbertDiscriminator => {
            let ht = ehlers::hilbert_discriminator(close);
            vec![
                ("phase", ht.phase),
                ("in_phase", ht.in_phase),
                ("quadrature", ht.quadrature),
            ]
        }
    }
}

/// Replace non-finite values with the last finite one; values before the
/// first finite one take `seed`.
fn forward_fill(values: &[f64], seed: f64) -> Vec<f64> {
    values
        .iter()
        .scan(seed, |last, &v| {
            if v.is_finite() {
                *last = v;
            }
            Some(*last)
        })
        .collect()
}

fn validate_params(kind: &OscillatorKind) -> Result<(), AnalyticsError> {
    let positive = |name: &str, value: usize| {
        if value == 0 {
            Err(AnalyticsError::Validation(format!(
                "{}: {} must be at least 1",
                kind.name(),
                name
            )))
        } else {
            Ok(())
        }
    };

    match *kind {
        OscillatorKind::Kama { period, fast, slow } => {
            positive("period", period)?;
            if !(fast >= 1.0 && slow >= 1.0 && fast.is_finite() && slow.is_finite()) {
                return Err(AnalyticsError::Validation(
                    "kama: fast and slow must be finite and at least 1".to_string(),
                ));
            }
        }
        OscillatorKind::PriceOscillator { fast, slow }
        | OscillatorKind::AccumulationDistribution { fast, slow } => {
            positive("fast", fast)?;
            positive("slow", slow)?;
        }
        OscillatorKind::EnhancedCci { period, factor } => {
            positive("period", period)?;
            if !(factor > 0.0 && factor.is_finite()) {
                return Err(AnalyticsError::Validation(
                    "enhanced_cci: factor must be positive".to_string(),
                ));
            }
        }
        OscillatorKind::StochasticMomentum {
            period,
            smoothing,
            signal,
        } => {
            positive("period", period)?;
            positive("smoothing", smoothing)?;
            positive("signal", signal)?;
        }
        OscillatorKind::Momentum { period }
        | OscillatorKind::RateOfChange { period }
        | OscillatorKind::EfficiencyRatio { period }
        | OscillatorKind::FisherTransform { period }
        | OscillatorKind::StochasticCenterOfGravity { period } => positive("period", period)?,
        OscillatorKind::SuperSmoother { period } => {
            if period < 2 {
                return Err(AnalyticsError::Validation(
                    "super_smoother: period must be at least 2".to_string(),
                ));
            }
        }
        OscillatorKind::Mama {
            fast_limit,
            slow_limit,
        } => {
            if !(slow_limit > 0.0 && slow_limit <= fast_limit && fast_limit <= 1.0) {
                return Err(AnalyticsError::Validation(format!(
                    "mama: limits must satisfy 0 < slow_limit <= fast_limit <= 1, got {} / {}",
                    slow_limit, fast_limit
                )));
            }
        }
        OscillatorKind::CyclePeriod | OscillatorKind::Sinewave | OscillatorKind::HilbertDiscriminator => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::price_series::PricePoint;
    use chrono::{TimeZone, Utc};

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_sma_basic() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let out = ema(&[2.0, 4.0, 6.0, 6.0], 3);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(4.0));
        assert!((out[3].unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_forward_fill_interior_gaps() {
        let filled = forward_fill(&[1.0, f64::NAN, f64::NAN, 4.0], f64::NAN);
        assert_eq!(filled, vec![1.0, 1.0, 1.0, 4.0]);
    }

    #[test]
    fn test_leading_nans_stay_undefined() {
        let mut closes = vec![f64::NAN, f64::NAN];
        closes.extend((0..20).map(|i| 100.0 + i as f64));
        let series = PriceSeries::from_closes("CL", start(), &closes).unwrap();

        let result = compute_oscillator(&series, &OscillatorKind::Momentum { period: 3 }).unwrap();
        let values = result.primary().unwrap().values();
        assert_eq!(values.len(), 22);
        assert!(values[..5].iter().all(Option::is_none));
        assert_eq!(values[5], Some(3.0));
        assert_eq!(result.warmup, 5);
    }

    #[test]
    fn test_all_missing_closes_yield_all_none() {
        let series = PriceSeries::from_closes("CL", start(), &[f64::NAN; 6]).unwrap();
        let result = compute_oscillator(&series, &OscillatorKind::Kama { period: 3, fast: 2.0, slow: 30.0 }).unwrap();
        assert_eq!(result.warmup, 6);
        assert!(result.primary().unwrap().values().iter().all(Option::is_none));
    }

    #[test]
    fn test_range_oscillator_requires_high_low() {
        let series = PriceSeries::from_closes("NG", start(), &[1.0; 30]).unwrap();
        let err = compute_oscillator(&series, &OscillatorKind::EnhancedCci { period: 20, factor: 0.015 }).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_missing_high_is_carried_forward() {
        let points: Vec<serde_json::Value> = (0..30)
            .map(|i| {
                let close = 70.0 + (i as f64 * 0.4).sin() * 2.0;
                let high = if i == 12 { serde_json::Value::Null } else { serde_json::json!(close + 1.0) };
                serde_json::json!({
                    "timestamp": (start() + chrono::Duration::days(i)).to_rfc3339(),
                    "close": close,
                    "high": high,
                    "low": close - 1.0,
                })
            })
            .collect();
        let series: PriceSeries =
            serde_json::from_value(serde_json::json!({ "symbol": "CL", "points": points })).unwrap();

        let result = compute_oscillator(&series, &OscillatorKind::EnhancedCci { period: 20, factor: 0.015 }).unwrap();
        let values = result.primary().unwrap().values();
        assert_eq!(result.warmup, 19);
        assert!(values[19..].iter().all(|v| v.map_or(false, f64::is_finite)));
    }

    #[test]
    fn test_volume_oscillator_requires_volume() {
        let points = (0..15)
            .map(|i| PricePoint::new(start() + chrono::Duration::days(i), 10.0).with_range(11.0, 9.0))
            .collect();
        let series = PriceSeries::new("HO", points).unwrap();
        let err = compute_oscillator(&series, &OscillatorKind::AccumulationDistribution { fast: 3, slow: 10 })
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_zero_period_rejected() {
        let series = PriceSeries::from_closes("CL", start(), &[1.0; 5]).unwrap();
        assert!(compute_oscillator(&series, &OscillatorKind::Momentum { period: 0 }).is_err());
    }

    #[test]
    fn test_multi_line_oscillators_keep_length() {
        let closes: Vec<f64> = (0..120).map(|i| 50.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let series = PriceSeries::from_closes("CL", start(), &closes).unwrap();
        let result = compute_oscillator(&series, &OscillatorKind::Mama { fast_limit: 0.5, slow_limit: 0.05 }).unwrap();
        assert_eq!(result.lines.len(), 2);
        assert!(result.line("fama").is_some());
        assert!(result.lines.iter().all(|l| l.points.len() == 120));
    }
}

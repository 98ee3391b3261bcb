//! Cycle and DSP oscillators after John Ehlers (*Rocket Science for
//! Traders*, *Cybernetic Analysis for Stocks and Futures*).

use std::f64::consts::PI;

use super::{window_max, window_min};

/// Bars before outputs driven by the Hilbert transform are reported. The
/// FIR chain (smoother, detrender, quadrature, phase advance) needs about
/// 25 bars and the period estimate a few more to settle.
pub const HILBERT_WARMUP: usize = 32;

/// The sinewave DFT looks back one dominant period, at most [`MAX_PERIOD`] bars.
pub const SINEWAVE_WARMUP: usize = 50;

pub const MIN_PERIOD: f64 = 6.0;
pub const MAX_PERIOD: f64 = 50.0;

/// Starting period estimate before any cycle has been measured.
const INITIAL_PERIOD: f64 = 20.0;

const CYCLE_MIN_PERIOD: f64 = 10.0;
const CYCLE_MAX_PERIOD: f64 = 50.0;
/// Delta phase bounds in degrees per bar (periods 50 and 10)
const MIN_DELTA_PHASE: f64 = 7.2;
const MAX_DELTA_PHASE: f64 = 36.0;

/// Fisher Transform
///
/// The close is placed in its `period` high/low range as a value in
/// [−1, 1], clamped to ±0.999 and smoothed (0.66 / 0.34), then mapped
/// through `0.5·ln((1 + x) / (1 − x))` and smoothed again (0.5 / 0.5).
/// A flat window gives 0.
pub fn fisher_transform(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return result;
    }

    let mut value_prev: Option<f64> = None;
    let mut fisher_prev: Option<f64> = None;
    for i in (period - 1)..prices.len() {
        let hh = window_max(prices, i, period);
        let ll = window_min(prices, i, period);
        let raw = if hh - ll > f64::EPSILON * hh.abs().max(1.0) {
            2.0 * (prices[i] - ll) / (hh - ll) - 1.0
        } else {
            0.0
        };
        let raw = raw.clamp(-0.999, 0.999);

        let value = match value_prev {
            Some(prev) => 0.66 * raw + 0.34 * prev,
            None => raw,
        };
        let fisher = 0.5 * ((1.0 + value) / (1.0 - value)).ln();
        let fisher = match fisher_prev {
            Some(prev) => 0.5 * fisher + 0.5 * prev,
            None => fisher,
        };

        value_prev = Some(value);
        fisher_prev = Some(fisher);
        result[i] = Some(fisher);
    }
    result
}

/// Stochastic Center of Gravity
///
/// Ehlers' center of gravity of the last `period` closes, normalized
/// stochastically over the last `period` CG values, smoothed with a 4-bar
/// weighted average and mapped to [−1, 1]. Flat input sits at 0.
pub fn stochastic_center_of_gravity(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = prices.len();
    let mut result = vec![None; len];
    if period == 0 || len < period {
        return result;
    }

    let offset = (period as f64 + 1.0) / 2.0;
    let mut cg = vec![None; len];
    for i in (period - 1)..len {
        let (num, den) = (0..period).fold((0.0, 0.0), |(num, den), k| {
            let p = prices[i - k];
            (num + (k as f64 + 1.0) * p, den + p)
        });
        cg[i] = Some(if den.abs() > f64::EPSILON {
            -num / den + offset
        } else {
            0.0
        });
    }

    let mut stochastic = vec![None; len];
    for i in (2 * period - 2)..len {
        let window: Vec<f64> = cg[i + 1 - period..=i].iter().flatten().copied().collect();
        let hi = window.iter().fold(f64::NEG_INFINITY, |a, &v| a.max(v));
        let lo = window.iter().fold(f64::INFINITY, |a, &v| a.min(v));
        let current = cg[i].unwrap_or(0.0);
        stochastic[i] = Some(if hi - lo > 1e-12 {
            (current - lo) / (hi - lo)
        } else {
            0.5
        });
    }

    for i in (2 * period + 1)..len {
        if let (Some(a), Some(b), Some(c), Some(d)) =
            (stochastic[i], stochastic[i - 1], stochastic[i - 2], stochastic[i - 3])
        {
            let weighted = (4.0 * a + 3.0 * b + 2.0 * c + d) / 10.0;
            result[i] = Some(2.0 * (weighted - 0.5));
        }
    }
    result
}

/// Two-pole Super Smoother filter. Unity gain at DC, so a constant input
/// stays constant. The first two outputs are the prices themselves.
pub fn super_smoother(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let period = period.max(2) as f64;
    let a = (-1.414 * PI / period).exp();
    let c2 = 2.0 * a * (1.414 * PI / period).cos();
    let c3 = -a * a;
    let c1 = 1.0 - c2 - c3;

    let mut filt: Vec<f64> = Vec::with_capacity(prices.len());
    for i in 0..prices.len() {
        let value = if i < 2 {
            prices[i]
        } else {
            c1 * (prices[i] + prices[i - 1]) / 2.0 + c2 * filt[i - 1] + c3 * filt[i - 2]
        };
        filt.push(value);
    }
    filt.into_iter().map(Some).collect()
}

/// Intermediate series of the MESA Hilbert transform, one entry per bar.
pub(crate) struct HilbertCore {
    pub smooth: Vec<f64>,
    pub in_phase: Vec<f64>,
    pub quadrature: Vec<f64>,
    pub smooth_period: Vec<f64>,
    /// Cycle energy below this is treated as none
    pub energy_floor: f64,
}

/// Hilbert FIR `0.0962·x + 0.5769·x[2] − 0.5769·x[4] − 0.0962·x[6]`, scaled
/// for the current period. Grouped as differences so a constant input
/// yields exactly zero.
fn hilbert_fir(x: &[f64], i: usize, adjust: f64) -> f64 {
    if i < 6 {
        return 0.0;
    }
    (0.0962 * (x[i] - x[i - 6]) + 0.5769 * (x[i - 2] - x[i - 4])) * adjust
}

/// Run the MESA front end: 4-bar WMA smoothing, detrending, in-phase and
/// quadrature components, and the homodyne dominant-period estimate.
pub(crate) fn hilbert_core(prices: &[f64]) -> HilbertCore {
    let n = prices.len();
    let lag = |i: usize, k: usize| prices[i.saturating_sub(k)];
    let smooth: Vec<f64> = (0..n)
        .map(|i| (4.0 * lag(i, 0) + 3.0 * lag(i, 1) + 2.0 * lag(i, 2) + lag(i, 3)) / 10.0)
        .collect();

    let mut detrender = vec![0.0; n];
    let mut i1 = vec![0.0; n];
    let mut q1 = vec![0.0; n];
    let mut period = vec![INITIAL_PERIOD; n];
    let mut smooth_period = vec![INITIAL_PERIOD; n];

    let (mut i2_prev, mut q2_prev) = (0.0, 0.0);
    let (mut re_prev, mut im_prev) = (0.0, 0.0);
    for i in 0..n {
        let prev_period = if i > 0 { period[i - 1] } else { INITIAL_PERIOD };
        let prev_smooth_period = if i > 0 { smooth_period[i - 1] } else { INITIAL_PERIOD };
        let adjust = 0.075 * prev_period + 0.54;

        detrender[i] = hilbert_fir(&smooth, i, adjust);
        q1[i] = hilbert_fir(&detrender, i, adjust);
        i1[i] = if i >= 3 { detrender[i - 3] } else { 0.0 };

        // Advance the phase of I1 and Q1 by 90 degrees
        let ji = hilbert_fir(&i1, i, adjust);
        let jq = hilbert_fir(&q1, i, adjust);

        let i2 = 0.2 * (i1[i] - jq) + 0.8 * i2_prev;
        let q2 = 0.2 * (q1[i] + ji) + 0.8 * q2_prev;

        // Homodyne discriminator
        let re = 0.2 * (i2 * i2_prev + q2 * q2_prev) + 0.8 * re_prev;
        let im = 0.2 * (i2 * q2_prev - q2 * i2_prev) + 0.8 * im_prev;
        i2_prev = i2;
        q2_prev = q2;
        re_prev = re;
        im_prev = im;

        let mut p = prev_period;
        if im != 0.0 && re != 0.0 {
            p = 360.0 / (im / re).atan().to_degrees();
        }
        let p = p
            .min(1.5 * prev_period)
            .max(0.67 * prev_period)
            .clamp(MIN_PERIOD, MAX_PERIOD);
        period[i] = 0.2 * p + 0.8 * prev_period;
        smooth_period[i] = 0.33 * period[i] + 0.67 * prev_smooth_period;
    }

    let scale = prices.iter().fold(1.0_f64, |acc, p| acc.max(p.abs()));
    HilbertCore {
        smooth,
        in_phase: i1,
        quadrature: q1,
        smooth_period,
        energy_floor: scale * 1e-10,
    }
}

/// Phase of the (I, Q) phasor in degrees, resolved to [0, 360).
fn quadrant_phase(in_phase: f64, quadrature: f64) -> f64 {
    let phase = quadrature.atan2(in_phase).to_degrees().rem_euclid(360.0);
    // rem_euclid can round a tiny negative angle up to exactly 360
    if phase >= 360.0 {
        0.0
    } else {
        phase
    }
}

/// Dominant cycle period by phase accumulation.
///
/// Per-bar phase change of the in-phase / quadrature pair is clamped to
/// [7.2°, 36°]; the instantaneous period is the number of bars needed to
/// accumulate a full 360°. The result is smoothed (0.25 / 0.75) and kept
/// inside [10, 50] bars. Without cycle energy the period is held (20 at the
/// start).
pub fn cycle_period(prices: &[f64]) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut result = vec![None; n];
    if n <= HILBERT_WARMUP {
        return result;
    }

    let core = hilbert_core(prices);
    let mut deltas: Vec<Option<f64>> = vec![None; n];
    let mut prev_phase: Option<f64> = None;
    let mut instantaneous = INITIAL_PERIOD;
    let mut period = INITIAL_PERIOD;

    for i in 0..n {
        let (ip, q) = (core.in_phase[i], core.quadrature[i]);
        if ip.hypot(q) > core.energy_floor {
            let phase = quadrant_phase(ip, q);
            if let Some(prev) = prev_phase {
                let mut delta = prev - phase;
                if prev < 90.0 && phase > 270.0 {
                    delta = 360.0 + prev - phase;
                }
                deltas[i] = Some(delta.clamp(MIN_DELTA_PHASE, MAX_DELTA_PHASE));
            }
            prev_phase = Some(phase);

            let mut accumulated = 0.0;
            for (bars, delta) in deltas[..=i].iter().rev().enumerate() {
                let Some(d) = delta else { break };
                accumulated += d;
                if accumulated >= 360.0 {
                    instantaneous = (bars + 1) as f64;
                    break;
                }
            }
        } else {
            prev_phase = None;
        }

        period = (0.25 * instantaneous + 0.75 * period).clamp(CYCLE_MIN_PERIOD, CYCLE_MAX_PERIOD);
        if i >= HILBERT_WARMUP {
            result[i] = Some(period);
        }
    }
    result
}

pub struct Mama {
    pub mama: Vec<Option<f64>>,
    pub fama: Vec<Option<f64>>,
}

/// MESA Adaptive Moving Average and its Following Adaptive Moving Average.
///
/// `alpha = fast_limit / Δphase`, clamped to `[slow_limit, fast_limit]`,
/// where Δphase is the per-bar decrease of `atan(Q/I)` in degrees (at
/// least 1). FAMA follows MAMA with half the alpha.
pub fn mama(prices: &[f64], fast_limit: f64, slow_limit: f64) -> Mama {
    let n = prices.len();
    let mut out = Mama {
        mama: vec![None; n],
        fama: vec![None; n],
    };
    if n <= HILBERT_WARMUP {
        return out;
    }

    let core = hilbert_core(prices);
    let mut phase_prev = 0.0;
    let mut mama_prev = prices[0];
    let mut fama_prev = prices[0];

    for i in 0..n {
        let ip = core.in_phase[i];
        let phase = if ip.abs() > core.energy_floor {
            (core.quadrature[i] / ip).atan().to_degrees()
        } else {
            phase_prev
        };
        let delta_phase = (phase_prev - phase).max(1.0);
        phase_prev = phase;

        let alpha = (fast_limit / delta_phase).clamp(slow_limit, fast_limit);
        let mama = alpha * prices[i] + (1.0 - alpha) * mama_prev;
        let fama = 0.5 * alpha * mama + (1.0 - 0.5 * alpha) * fama_prev;
        mama_prev = mama;
        fama_prev = fama;

        if i >= HILBERT_WARMUP {
            out.mama[i] = Some(mama);
            out.fama[i] = Some(fama);
        }
    }
    out
}

pub struct Sinewave {
    pub sine: Vec<Option<f64>>,
    pub lead_sine: Vec<Option<f64>>,
}

/// Sinewave indicator: sine of the dominant-cycle phase and of the phase
/// advanced by 45°. The phase comes from a one-period DFT of the smoothed
/// price; without measurable cycle energy both lines are 0.
pub fn sinewave(prices: &[f64]) -> Sinewave {
    let n = prices.len();
    let mut out = Sinewave {
        sine: vec![None; n],
        lead_sine: vec![None; n],
    };
    if n <= SINEWAVE_WARMUP {
        return out;
    }

    let core = hilbert_core(prices);
    for i in SINEWAVE_WARMUP..n {
        let smooth_period = core.smooth_period[i];
        let dc_period = (smooth_period.round() as usize).clamp(1, i + 1);

        let (mut real, mut imag, mut magnitude) = (0.0, 0.0, 0.0);
        for k in 0..dc_period {
            let angle = 2.0 * PI * k as f64 / dc_period as f64;
            let value = core.smooth[i - k];
            real += angle.sin() * value;
            imag += angle.cos() * value;
            magnitude += value.abs();
        }

        if real.hypot(imag) <= magnitude * 1e-9 {
            out.sine[i] = Some(0.0);
            out.lead_sine[i] = Some(0.0);
            continue;
        }

        let mut phase = if imag.abs() > 0.0 {
            (real / imag).atan().to_degrees()
        } else {
            0.0
        };
        if imag.abs() <= 0.001 {
            phase += 90.0 * real.signum();
        }
        phase += 90.0;
        // Compensate for the one-bar lag of the smoother
        phase += 360.0 / smooth_period;
        if imag < 0.0 {
            phase += 180.0;
        }
        if phase > 315.0 {
            phase -= 360.0;
        }

        out.sine[i] = Some(phase.to_radians().sin());
        out.lead_sine[i] = Some((phase + 45.0).to_radians().sin());
    }
    out
}

pub struct HilbertDiscriminator {
    pub phase: Vec<Option<f64>>,
    pub in_phase: Vec<Option<f64>>,
    pub quadrature: Vec<Option<f64>>,
}

/// Instantaneous phase of the analytic signal in degrees, [0, 360), along
/// with its in-phase and quadrature components. Zero cycle energy gives
/// phase 0.
pub fn hilbert_discriminator(prices: &[f64]) -> HilbertDiscriminator {
    let n = prices.len();
    let mut out = HilbertDiscriminator {
        phase: vec![None; n],
        in_phase: vec![None; n],
        quadrature: vec![None; n],
    };
    if n <= HILBERT_WARMUP {
        return out;
    }

    let core = hilbert_core(prices);
    for i in HILBERT_WARMUP..n {
        let (ip, q) = (core.in_phase[i], core.quadrature[i]);
        let phase = if ip.hypot(q) > core.energy_floor {
            quadrant_phase(ip, q)
        } else {
            0.0
        };
        out.phase[i] = Some(phase);
        out.in_phase[i] = Some(ip);
        out.quadrature[i] = Some(q);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wave(n: usize, period: f64) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 5.0 * (2.0 * PI * i as f64 / period).sin())
            .collect()
    }

    fn choppy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 60.0 + (i as f64 * 0.37).sin() * 3.0 + (i as f64 * 0.11).cos() * 6.0 + i as f64 * 0.02)
            .collect()
    }

    #[test]
    fn test_fisher_flat_window_is_zero() {
        let out = fisher_transform(&vec![70.0; 20], 10);
        assert_eq!(out[8], None);
        assert!(out[9..].iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn test_fisher_positive_in_uptrend() {
        let prices: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();
        let out = fisher_transform(&prices, 10);
        assert!(out[29].unwrap() > 1.0);
    }

    #[test]
    fn test_fisher_finite_on_extremes() {
        for v in fisher_transform(&choppy(200), 10).into_iter().flatten() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_stochastic_cg_constant_is_neutral() {
        let out = stochastic_center_of_gravity(&vec![25.0; 30], 8);
        assert_eq!(out[16], None);
        assert!(out[17..].iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn test_stochastic_cg_bounded() {
        for v in stochastic_center_of_gravity(&choppy(150), 8).into_iter().flatten() {
            assert!((-1.0 - 1e-12..=1.0 + 1e-12).contains(&v));
        }
    }

    #[test]
    fn test_super_smoother_constant_and_seed() {
        let out = super_smoother(&vec![3.5; 50], 10);
        assert_eq!(out[0], Some(3.5));
        assert_eq!(out[1], Some(3.5));
        for v in out.into_iter().flatten() {
            assert!((v - 3.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_super_smoother_removes_two_bar_noise() {
        let prices: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 101.0 } else { 99.0 }).collect();
        let out = super_smoother(&prices, 10);
        for v in out[60..].iter().flatten() {
            assert!((v - 100.0).abs() < 0.05);
        }
    }

    #[test]
    fn test_hilbert_outputs_need_warmup() {
        let prices = choppy(20);
        assert!(cycle_period(&prices).iter().all(Option::is_none));
        assert!(mama(&prices, 0.5, 0.05).mama.iter().all(Option::is_none));
        assert!(sinewave(&prices).sine.iter().all(Option::is_none));
        assert!(hilbert_discriminator(&prices).phase.iter().all(Option::is_none));
    }

    #[test]
    fn test_constant_input_is_neutral() {
        let prices = vec![88.0; 120];

        let period = cycle_period(&prices);
        assert_eq!(period[HILBERT_WARMUP - 1], None);
        assert!(period[HILBERT_WARMUP..].iter().all(|v| *v == Some(20.0)));

        let m = mama(&prices, 0.5, 0.05);
        for (a, f) in m.mama.iter().zip(&m.fama).skip(HILBERT_WARMUP) {
            assert!((a.unwrap() - 88.0).abs() < 1e-9);
            assert!((f.unwrap() - 88.0).abs() < 1e-9);
        }

        let wave = sinewave(&prices);
        assert!(wave.sine[SINEWAVE_WARMUP..].iter().all(|v| *v == Some(0.0)));
        assert!(wave.lead_sine[SINEWAVE_WARMUP..].iter().all(|v| *v == Some(0.0)));

        let ht = hilbert_discriminator(&prices);
        assert!(ht.phase[HILBERT_WARMUP..].iter().all(|v| *v == Some(0.0)));
        assert!(ht.in_phase[HILBERT_WARMUP..].iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn test_dominant_period_tracks_pure_cycle() {
        let prices = sine_wave(400, 20.0);
        let core = hilbert_core(&prices);
        let estimate = core.smooth_period[399];
        assert!((14.0..=26.0).contains(&estimate), "estimate {}", estimate);

        let period = cycle_period(&prices)[399].unwrap();
        assert!((15.0..=25.0).contains(&period), "period {}", period);
    }

    #[test]
    fn test_cycle_period_bounded() {
        for v in cycle_period(&choppy(300)).into_iter().flatten() {
            assert!((10.0..=50.0).contains(&v));
        }
    }

    #[test]
    fn test_mama_stays_within_price_range() {
        let prices = choppy(250);
        let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let out = mama(&prices, 0.5, 0.05);
        for v in out.mama.iter().chain(out.fama.iter()).flatten() {
            assert!(*v >= min - 1e-9 && *v <= max + 1e-9);
        }
    }

    #[test]
    fn test_sinewave_and_phase_ranges() {
        let prices = sine_wave(300, 25.0);
        let wave = sinewave(&prices);
        for v in wave.sine.iter().chain(wave.lead_sine.iter()).flatten() {
            assert!((-1.0..=1.0).contains(v));
        }
        // A clean cycle swings the sine through most of its range
        let defined: Vec<f64> = wave.sine.iter().flatten().copied().collect();
        let hi = defined.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lo = defined.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(hi > 0.8 && lo < -0.8);

        for v in hilbert_discriminator(&prices).phase.into_iter().flatten() {
            assert!((0.0..360.0).contains(&v));
        }
    }
}

/// Oscillator behaviour through the public API: warm-up handling, neutral
/// values on flat markets, and the JSON parameter defaults.
use chrono::{DateTime, Duration, TimeZone, Utc};
use commodity_analytics::models::{OscillatorKind, PricePoint, PriceSeries};
use commodity_analytics::services::oscillators::compute_oscillator;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn bars(closes: &[f64]) -> PriceSeries {
    let points = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            PricePoint::new(start() + Duration::days(i as i64), c)
                .with_range(c, c)
                .with_volume(1_000.0)
        })
        .collect();
    PriceSeries::new("CL", points).unwrap()
}

fn all_kinds() -> Vec<OscillatorKind> {
    [
        "kama",
        "price_oscillator",
        "enhanced_cci",
        "momentum",
        "rate_of_change",
        "stochastic_momentum",
        "efficiency_ratio",
        "accumulation_distribution",
        "fisher_transform",
        "stochastic_center_of_gravity",
        "super_smoother",
        "cycle_period",
        "mama",
        "sinewave",
        "hilbert_discriminator",
    ]
    .iter()
    .map(|name| serde_json::from_value(serde_json::json!({ "type": name })).unwrap())
    .collect()
}

// ---------------------------------------------------------------------------
// Flat markets
// ---------------------------------------------------------------------------

#[cfg(test)]
mod flat_market {
    use super::*;

    /// Expected value of a line on a constant price
    fn neutral(line: &str, price: f64) -> f64 {
        match line {
            "kama" | "super_smoother" | "mama" | "fama" => price,
            "cycle_period" => 20.0,
            _ => 0.0,
        }
    }

    #[test]
    fn test_constant_series_is_neutral_for_every_oscillator() {
        let series = bars(&[72.5; 150]);

        for kind in all_kinds() {
            let result = compute_oscillator(&series, &kind).unwrap();
            assert!(result.warmup < 150, "{} never warmed up", kind.name());

            for line in &result.lines {
                assert_eq!(line.points.len(), 150);
                let expected = neutral(&line.name, 72.5);
                for value in line.values().into_iter().flatten() {
                    assert!(
                        (value - expected).abs() < 1e-9,
                        "{}/{} gave {} on a flat market",
                        kind.name(),
                        line.name,
                        value
                    );
                }
            }
        }
    }

    #[test]
    fn test_primary_line_defined_after_warmup() {
        let closes: Vec<f64> = (0..150).map(|i| 60.0 + (i as f64 * 0.25).sin() * 4.0 + i as f64 * 0.05).collect();
        let series = bars(&closes);

        for kind in all_kinds() {
            let result = compute_oscillator(&series, &kind).unwrap();
            let values = result.primary().unwrap().values();
            assert!(
                values[result.warmup..].iter().all(Option::is_some),
                "{} has gaps after warm-up",
                kind.name()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Short and gappy input
// ---------------------------------------------------------------------------

#[cfg(test)]
mod short_input {
    use super::*;

    #[test]
    fn test_kama_on_three_points_is_all_undefined() {
        let series = PriceSeries::from_closes("NG", start(), &[2.5, 2.6, 2.55]).unwrap();
        let kind = OscillatorKind::Kama { period: 10, fast: 2.0, slow: 30.0 };

        let result = compute_oscillator(&series, &kind).unwrap();
        let values = result.primary().unwrap().values();

        assert_eq!(values.len(), 3);
        assert!(values.iter().all(Option::is_none));
        assert_eq!(result.warmup, 3);
    }

    #[test]
    fn test_short_input_never_panics() {
        let series = bars(&[70.0, 71.0, 69.5, 70.2]);
        for kind in all_kinds() {
            let result = compute_oscillator(&series, &kind).unwrap();
            assert!(result.lines.iter().all(|l| l.points.len() == 4));
        }
    }

    #[test]
    fn test_interior_gap_is_carried_forward() {
        let mut closes: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();
        closes[15] = f64::NAN;
        let series = PriceSeries::from_closes("HO", start(), &closes).unwrap();

        let result = compute_oscillator(&series, &OscillatorKind::Momentum { period: 1 }).unwrap();
        let values = result.primary().unwrap().values();

        // The gap repeats the previous close, so the move lands on the next bar
        assert_eq!(values[15], Some(0.0));
        assert_eq!(values[16], Some(2.0));
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[cfg(test)]
mod parameters {
    use super::*;

    #[test]
    fn test_json_defaults_fill_conventional_periods() {
        let kind: OscillatorKind = serde_json::from_str(r#"{"type": "stochastic_momentum"}"#).unwrap();
        assert_eq!(kind, OscillatorKind::StochasticMomentum { period: 14, smoothing: 3, signal: 3 });
    }

    #[test]
    fn test_invalid_mama_limits_rejected() {
        let series = bars(&[70.0; 60]);
        let kind = OscillatorKind::Mama { fast_limit: 0.05, slow_limit: 0.5 };
        let err = compute_oscillator(&series, &kind).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_kama_stays_inside_price_range() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 80.0 + (i as f64 * 0.17).sin() * 6.0 + (i as f64 * 0.91).cos() * 1.5)
            .collect();
        let (lo, hi) = closes
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)));
        let series = PriceSeries::from_closes("CL", start(), &closes).unwrap();

        let result = compute_oscillator(&series, &OscillatorKind::Kama { period: 10, fast: 2.0, slow: 30.0 }).unwrap();
        for v in result.primary().unwrap().values().into_iter().flatten() {
            assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
        }
    }
}

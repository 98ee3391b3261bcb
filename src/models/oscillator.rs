use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Oscillator selection with its parameters.
///
/// JSON form is internally tagged, e.g.
/// `{"type": "kama", "period": 10, "fast": 2.0, "slow": 30.0}`.
/// Omitted parameters take their conventional defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OscillatorKind {
    Kama {
        #[serde(default = "period_10")]
        period: usize,
        #[serde(default = "kama_fast")]
        fast: f64,
        #[serde(default = "kama_slow")]
        slow: f64,
    },
    PriceOscillator {
        #[serde(default = "period_12")]
        fast: usize,
        #[serde(default = "period_26")]
        slow: usize,
    },
    EnhancedCci {
        #[serde(default = "period_20")]
        period: usize,
        #[serde(default = "cci_factor")]
        factor: f64,
    },
    Momentum {
        #[serde(default = "period_10")]
        period: usize,
    },
    RateOfChange {
        #[serde(default = "period_12")]
        period: usize,
    },
    StochasticMomentum {
        #[serde(default = "period_14")]
        period: usize,
        #[serde(default = "period_3")]
        smoothing: usize,
        #[serde(default = "period_3")]
        signal: usize,
    },
    EfficiencyRatio {
        #[serde(default = "period_10")]
        period: usize,
    },
    AccumulationDistribution {
        #[serde(default = "period_3")]
        fast: usize,
        #[serde(default = "period_10")]
        slow: usize,
    },
    FisherTransform {
        #[serde(default = "period_10")]
        period: usize,
    },
    StochasticCenterOfGravity {
        #[serde(default = "period_8")]
        period: usize,
    },
    SuperSmoother {
        #[serde(default = "period_10")]
        period: usize,
    },
    CyclePeriod,
    Mama {
        #[serde(default = "mama_fast")]
        fast_limit: f64,
        #[serde(default = "mama_slow")]
        slow_limit: f64,
    },
    Sinewave,
    HilbertDiscriminator,
}

fn period_3() -> usize {
    3
}

fn period_8() -> usize {
    8
}

fn period_10() -> usize {
    10
}

fn period_12() -> usize {
    12
}

fn period_14() -> usize {
    14
}

fn period_20() -> usize {
    20
}

fn period_26() -> usize {
    26
}

fn kama_fast() -> f64 {
    2.0
}

fn kama_slow() -> f64 {
    30.0
}

fn cci_factor() -> f64 {
    0.015
}

fn mama_fast() -> f64 {
    0.5
}

fn mama_slow() -> f64 {
    0.05
}

impl OscillatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            OscillatorKind::Kama { .. } => "kama",
            OscillatorKind::PriceOscillator { .. } => "price_oscillator",
            OscillatorKind::EnhancedCci { .. } => "enhanced_cci",
            OscillatorKind::Momentum { .. } => "momentum",
            OscillatorKind::RateOfChange { .. } => "rate_of_change",
            OscillatorKind::StochasticMomentum { .. } => "stochastic_momentum",
            OscillatorKind::EfficiencyRatio { .. } => "efficiency_ratio",
            OscillatorKind::AccumulationDistribution { .. } => "accumulation_distribution",
            OscillatorKind::FisherTransform { .. } => "fisher_transform",
            OscillatorKind::StochasticCenterOfGravity { .. } => "stochastic_center_of_gravity",
            OscillatorKind::SuperSmoother { .. } => "super_smoother",
            OscillatorKind::CyclePeriod => "cycle_period",
            OscillatorKind::Mama { .. } => "mama",
            OscillatorKind::Sinewave => "sinewave",
            OscillatorKind::HilbertDiscriminator => "hilbert_discriminator",
        }
    }

    pub fn needs_range(&self) -> bool {
        matches!(
            self,
            OscillatorKind::EnhancedCci { .. }
                | OscillatorKind::StochasticMomentum { .. }
                | OscillatorKind::AccumulationDistribution { .. }
        )
    }

    pub fn needs_volume(&self) -> bool {
        matches!(self, OscillatorKind::AccumulationDistribution { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OscillatorPoint {
    pub timestamp: DateTime<Utc>,
    /// `None` inside the warm-up window
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OscillatorLine {
    pub name: String,
    pub points: Vec<OscillatorPoint>,
}

impl OscillatorLine {
    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Output of one oscillator over one price series. Every line has exactly
/// as many points as the input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OscillatorResult {
    pub symbol: String,
    pub oscillator: OscillatorKind,
    /// Leading `None` values of the primary line (the whole length when
    /// nothing is defined)
    pub warmup: usize,
    pub lines: Vec<OscillatorLine>,
}

impl OscillatorResult {
    pub fn primary(&self) -> Option<&OscillatorLine> {
        self.lines.first()
    }

    pub fn line(&self, name: &str) -> Option<&OscillatorLine> {
        self.lines.iter().find(|l| l.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_defaults_fill_missing_params() {
        let kind: OscillatorKind = serde_json::from_str(r#"{"type": "kama"}"#).unwrap();
        assert_eq!(kind, OscillatorKind::Kama { period: 10, fast: 2.0, slow: 30.0 });

        let kind: OscillatorKind = serde_json::from_str(r#"{"type": "momentum"}"#).unwrap();
        assert_eq!(kind, OscillatorKind::Momentum { period: 10 });

        let kind: OscillatorKind = serde_json::from_str(r#"{"type": "sinewave"}"#).unwrap();
        assert_eq!(kind, OscillatorKind::Sinewave);
    }

    #[test]
    fn test_kind_accepts_explicit_params() {
        let kind: OscillatorKind =
            serde_json::from_str(r#"{"type": "price_oscillator", "fast": 5, "slow": 20}"#).unwrap();
        assert_eq!(kind, OscillatorKind::PriceOscillator { fast: 5, slow: 20 });
    }
}

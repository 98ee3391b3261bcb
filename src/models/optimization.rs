use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Risk profile selecting the optimization objective.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    /// Penalty on annualized variance subtracted from the Sharpe objective.
    pub fn variance_penalty(&self) -> f64 {
        match self {
            RiskTolerance::Conservative => 0.0,
            RiskTolerance::Moderate => 1.0,
            RiskTolerance::Aggressive => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    MaxSharpe,
    PenalizedSharpe,
    MinVariance,
    MinVarianceForTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OptimizationParams {
    pub risk_tolerance: RiskTolerance,
    /// Annualized return the optimal portfolio must reach exactly
    pub target_return: Option<f64>,
    /// Upper bound on any single weight (long-only lower bound is always 0)
    pub max_weight: Option<f64>,
    /// Upper bound on the summed weight of positions in each sector
    pub sector_caps: BTreeMap<String, f64>,
}

impl OptimizationParams {
    pub fn new(risk_tolerance: RiskTolerance) -> Self {
        Self {
            risk_tolerance,
            ..Default::default()
        }
    }

    pub fn with_target_return(mut self, target: f64) -> Self {
        self.target_return = Some(target);
        self
    }

    pub fn with_max_weight(mut self, cap: f64) -> Self {
        self.max_weight = Some(cap);
        self
    }

    pub fn with_sector_cap(mut self, sector: impl Into<String>, cap: f64) -> Self {
        self.sector_caps.insert(sector.into(), cap);
        self
    }

    pub fn objective(&self) -> Objective {
        match (self.target_return, self.risk_tolerance) {
            (Some(_), _) => Objective::MinVarianceForTarget,
            (None, RiskTolerance::Conservative) => Objective::MinVariance,
            (None, RiskTolerance::Moderate) => Objective::PenalizedSharpe,
            (None, RiskTolerance::Aggressive) => Objective::MaxSharpe,
        }
    }
}

/// Rebalancing guidance for one position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightChange {
    pub symbol: String,
    pub current_weight: f64,
    pub optimal_weight: f64,
    pub change: f64,
    /// Relative change in percent; 0 when the current weight is 0
    pub percentage_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationResult {
    pub objective: Objective,
    pub risk_tolerance: RiskTolerance,
    pub target_return: Option<f64>,
    pub expected_annual_return: f64,
    pub expected_annual_volatility: f64,
    pub sharpe_ratio: Option<f64>,
    pub iterations: usize,
    pub allocations: Vec<WeightChange>,
}

impl OptimizationResult {
    pub fn optimal_weight(&self, symbol: &str) -> Option<f64> {
        self.allocations
            .iter()
            .find(|a| a.symbol == symbol)
            .map(|a| a.optimal_weight)
    }
}

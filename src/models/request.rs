use serde::{Deserialize, Serialize};

use crate::models::optimization::{OptimizationParams, OptimizationResult};
use crate::models::oscillator::{OscillatorKind, OscillatorResult};
use crate::models::portfolio::PortfolioPosition;
use crate::models::price_series::PriceSeries;
use crate::models::risk::RiskMetrics;
use crate::models::simulation::{SimulationParams, SimulationResult};

/// One analytics call, tagged by `operation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum AnalyticsRequest {
    Oscillator {
        series: PriceSeries,
        oscillator: OscillatorKind,
    },
    Metrics {
        positions: Vec<PortfolioPosition>,
    },
    Simulation {
        positions: Vec<PortfolioPosition>,
        #[serde(default)]
        params: SimulationParams,
    },
    Optimization {
        positions: Vec<PortfolioPosition>,
        #[serde(default)]
        params: OptimizationParams,
    },
}

impl AnalyticsRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            AnalyticsRequest::Oscillator { .. } => "oscillator",
            AnalyticsRequest::Metrics { .. } => "metrics",
            AnalyticsRequest::Simulation { .. } => "simulation",
            AnalyticsRequest::Optimization { .. } => "optimization",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operation", content = "result", rename_all = "snake_case")]
pub enum AnalyticsResponse {
    Oscillator(OscillatorResult),
    Metrics(RiskMetrics),
    Simulation(SimulationResult),
    Optimization(OptimizationResult),
}

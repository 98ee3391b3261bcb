use serde::{Deserialize, Serialize};

/// Request parameters for a Monte Carlo run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub num_simulations: usize,
    pub horizon_days: usize,
    /// Fixed seed for reproducible runs; `None` seeds from the OS
    pub seed: Option<u64>,
    /// How many full value paths to include in the result
    pub paths_returned: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            num_simulations: 1000,
            horizon_days: 252,
            seed: None,
            paths_returned: 100,
        }
    }
}

impl SimulationParams {
    pub fn new(num_simulations: usize, horizon_days: usize) -> Self {
        Self {
            num_simulations,
            horizon_days,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_paths_returned(mut self, paths: usize) -> Self {
        self.paths_returned = paths;
        self
    }
}

/// One simulated cumulative-value path and its statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulatedPath {
    /// Cumulative value after each simulated day; the implicit start is 1.0
    pub values: Vec<f64>,
    pub final_return: f64,
    /// Annualized standard deviation of the path's daily returns
    pub volatility: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionSummary {
    pub mean: f64,
    pub std: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_50: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
}

/// p5 / median / p95 of a per-path statistic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PercentileBand {
    pub percentile_5: f64,
    pub median: f64,
    pub percentile_95: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathStatistics {
    pub volatility: PercentileBand,
    pub max_drawdown: PercentileBand,
    /// Computed over paths with a defined Sharpe ratio; `None` if there are none
    pub sharpe_ratio: Option<PercentileBand>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub num_simulations: usize,
    pub horizon_days: usize,
    /// Seed the run used; drawn from the OS when none was requested
    pub seed: u64,
    pub paths: Vec<SimulatedPath>,
    pub final_value_stats: DistributionSummary,
    /// Share of paths ending below the starting value of 1.0
    pub probability_of_loss: f64,
    /// Mean final value − 1
    pub expected_return: f64,
    /// 5th percentile final value − 1
    pub var_95: f64,
    /// Mean of final values at or below the 5th percentile, − 1
    pub cvar_95: f64,
    pub path_statistics: PathStatistics,
}

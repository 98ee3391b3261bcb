/// Trading days per year used for every annualization. A policy choice
/// (US equity calendar) applied uniformly, not a property of the data.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Minimum aligned observations before portfolio statistics are computed.
pub const MIN_OBSERVATIONS: usize = 10;

/// Minimum number of assets in a portfolio.
pub const MIN_ASSETS: usize = 2;

/// Runtime limits and defaults for the analytics engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
    /// Upper bound on Monte Carlo trials per request
    pub max_simulations: usize,
    /// Upper bound on the simulated horizon, in trading days
    pub max_horizon_days: usize,
    /// Annual risk-free rate used in Sharpe/Sortino (0.0 unless supplied)
    pub risk_free_rate: f64,
    /// Upper bound on full value paths returned in a simulation result
    pub max_returned_paths: usize,
    pub optimizer_max_iterations: usize,
    pub optimizer_tolerance: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_simulations: 5000,
            max_horizon_days: 2520,
            risk_free_rate: 0.0,
            max_returned_paths: 100,
            optimizer_max_iterations: 5000,
            optimizer_tolerance: 1e-8,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_simulations: env_or("ANALYTICS_MAX_SIMULATIONS", defaults.max_simulations),
            max_horizon_days: env_or("ANALYTICS_MAX_HORIZON_DAYS", defaults.max_horizon_days),
            risk_free_rate: env_or("ANALYTICS_RISK_FREE_RATE", defaults.risk_free_rate),
            max_returned_paths: env_or("ANALYTICS_MAX_RETURNED_PATHS", defaults.max_returned_paths),
            optimizer_max_iterations: env_or(
                "ANALYTICS_OPTIMIZER_MAX_ITERATIONS",
                defaults.optimizer_max_iterations,
            ),
            optimizer_tolerance: env_or("ANALYTICS_OPTIMIZER_TOLERANCE", defaults.optimizer_tolerance),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_simulations == 0 {
            return Err("ANALYTICS_MAX_SIMULATIONS must be at least 1".to_string());
        }
        if self.max_horizon_days == 0 {
            return Err("ANALYTICS_MAX_HORIZON_DAYS must be at least 1".to_string());
        }
        if !self.risk_free_rate.is_finite() || self.risk_free_rate.abs() >= 1.0 {
            return Err(format!(
                "ANALYTICS_RISK_FREE_RATE must be an annual fraction in (-1, 1), got {}",
                self.risk_free_rate
            ));
        }
        if self.optimizer_max_iterations == 0 {
            return Err("ANALYTICS_OPTIMIZER_MAX_ITERATIONS must be at least 1".to_string());
        }
        if !(self.optimizer_tolerance > 0.0 && self.optimizer_tolerance < 1.0) {
            return Err("ANALYTICS_OPTIMIZER_TOLERANCE must be in (0, 1)".to_string());
        }
        Ok(())
    }

    /// Same limits, different risk-free rate.
    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, info, warn};

use crate::config::{AnalyticsConfig, TRADING_DAYS_PER_YEAR};
use crate::errors::AnalyticsError;
use crate::models::portfolio::{AlignedPortfolio, Portfolio};
use crate::models::simulation::{
    DistributionSummary, PathStatistics, PercentileBand, SimulatedPath, SimulationParams,
    SimulationResult,
};
use crate::services::statistics::{
    self, cholesky_psd, covariance_matrix, max_drawdown_from_values, mean_vector, percentile_sorted,
    sample_std,
};

/// Diagonal jitter retries before the covariance is declared degenerate.
const JITTER_ATTEMPTS: usize = 8;

/// Check simulation parameters against the configured limits.
pub fn validate_params(
    params: &SimulationParams,
    config: &AnalyticsConfig,
) -> Result<(), AnalyticsError> {
    if params.num_simulations == 0 || params.num_simulations > config.max_simulations {
        return Err(AnalyticsError::Validation(format!(
            "num_simulations must be between 1 and {}, got {}",
            config.max_simulations, params.num_simulations
        )));
    }
    if params.horizon_days == 0 || params.horizon_days > config.max_horizon_days {
        return Err(AnalyticsError::Validation(format!(
            "horizon_days must be between 1 and {}, got {}",
            config.max_horizon_days, params.horizon_days
        )));
    }
    Ok(())
}

/// Simulate future portfolio value paths from the historical return
/// distribution.
///
/// Daily asset returns are drawn from a multivariate normal with the
/// historical mean vector and sample covariance (`μ + L·z`), combined with
/// the portfolio weights and compounded from 1.0. A fixed `seed` makes the
/// run reproducible.
pub fn simulate_portfolio(
    portfolio: &Portfolio,
    params: &SimulationParams,
    config: &AnalyticsConfig,
) -> Result<SimulationResult, AnalyticsError> {
    validate_params(params, config)?;
    info!(
        "Running {} simulations over {} days for {} positions",
        params.num_simulations,
        params.horizon_days,
        portfolio.positions.len()
    );

    let aligned = portfolio.align()?;
    simulate_aligned(&aligned, params, config)
}

pub fn simulate_aligned(
    aligned: &AlignedPortfolio,
    params: &SimulationParams,
    config: &AnalyticsConfig,
) -> Result<SimulationResult, AnalyticsError> {
    validate_params(params, config)?;

    let mu = mean_vector(aligned.returns());
    let covariance = covariance_matrix(aligned.returns());
    let factor = factorize(&covariance)?;
    let weights = aligned.weights();

    // An unseeded run still reports the seed it drew, so it can be replayed
    let seed = params.seed.unwrap_or_else(|| StdRng::from_os_rng().random());
    let mut rng = StdRng::seed_from_u64(seed);

    let keep_paths = params.paths_returned.min(config.max_returned_paths);
    let mut paths = Vec::with_capacity(keep_paths.min(params.num_simulations));
    let mut finals = Vec::with_capacity(params.num_simulations);
    let mut volatilities = Vec::with_capacity(params.num_simulations);
    let mut drawdowns = Vec::with_capacity(params.num_simulations);
    let mut sharpes = Vec::with_capacity(params.num_simulations);

    let mut z = Array1::<f64>::zeros(aligned.n_assets());
    for sim in 0..params.num_simulations {
        let mut value = 1.0_f64;
        let mut values = Vec::with_capacity(params.horizon_days);
        let mut daily = Vec::with_capacity(params.horizon_days);

        for _ in 0..params.horizon_days {
            for zi in z.iter_mut() {
                *zi = StandardNormal.sample(&mut rng);
            }
            let asset_returns = &mu + &factor.dot(&z);
            let portfolio_return = weights.dot(&asset_returns);

            // Value cannot go below zero
            let next = (value * (1.0 + portfolio_return)).max(0.0);
            daily.push(if value > 0.0 { next / value - 1.0 } else { 0.0 });
            value = next;
            values.push(value);
        }

        let path = path_statistics(values, &daily, config.risk_free_rate);
        finals.push(value);
        volatilities.push(path.volatility);
        drawdowns.push(path.max_drawdown);
        if let Some(s) = path.sharpe_ratio {
            sharpes.push(s);
        }
        if sim < keep_paths {
            paths.push(path);
        }
    }

    let mut sorted_finals = finals.clone();
    sorted_finals.sort_by(|a, b| a.total_cmp(b));
    let final_value_stats = summarize(&finals, &sorted_finals);

    let losses = finals.iter().filter(|v| **v < 1.0).count();
    let probability_of_loss = losses as f64 / finals.len() as f64;
    let expected_return = final_value_stats.mean - 1.0;
    let var_95 = final_value_stats.percentile_5 - 1.0;
    let tail: Vec<f64> = sorted_finals
        .iter()
        .copied()
        .take_while(|v| *v <= final_value_stats.percentile_5)
        .collect();
    let cvar_95 = if tail.is_empty() {
        var_95
    } else {
        statistics::mean(&tail) - 1.0
    };

    let path_statistics = PathStatistics {
        volatility: band(volatilities),
        max_drawdown: band(drawdowns),
        sharpe_ratio: if sharpes.is_empty() {
            None
        } else {
            Some(band(sharpes))
        },
    };

    debug!(
        expected_return,
        probability_of_loss, var_95, cvar_95, "Simulation summary"
    );

    Ok(SimulationResult {
        num_simulations: params.num_simulations,
        horizon_days: params.horizon_days,
        seed,
        paths,
        final_value_stats,
        probability_of_loss,
        expected_return,
        var_95,
        cvar_95,
        path_statistics,
    })
}

/// Lower-triangular factor of the covariance matrix.
///
/// Zero-variance assets are fine (semi-definite factor). A matrix that is
/// not positive-semi-definite through rounding gets a growing diagonal
/// jitter before giving up with `DegenerateInput`.
fn factorize(covariance: &Array2<f64>) -> Result<Array2<f64>, AnalyticsError> {
    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::DegenerateInput(
            "Covariance matrix contains non-finite values".to_string(),
        ));
    }
    if let Some(l) = cholesky_psd(covariance) {
        return Ok(l);
    }

    let n = covariance.nrows();
    let scale = covariance
        .diag()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(1e-12);
    let mut jitter = scale * 1e-10;
    for attempt in 1..=JITTER_ATTEMPTS {
        warn!(
            attempt,
            jitter, "Covariance not positive semi-definite, adding diagonal jitter"
        );
        let adjusted = covariance + &(Array2::<f64>::eye(n) * jitter);
        if let Some(l) = cholesky_psd(&adjusted) {
            return Ok(l);
        }
        jitter *= 10.0;
    }

    Err(AnalyticsError::DegenerateInput(
        "Covariance matrix is not positive semi-definite".to_string(),
    ))
}

fn path_statistics(values: Vec<f64>, daily: &[f64], risk_free_rate: f64) -> SimulatedPath {
    let final_return = values.last().copied().unwrap_or(1.0) - 1.0;
    let volatility = sample_std(daily) * TRADING_DAYS_PER_YEAR.sqrt();
    let max_drawdown = max_drawdown_from_values(&values);
    let sharpe_ratio = if volatility.abs() < f64::EPSILON {
        None
    } else {
        Some((statistics::mean(daily) * TRADING_DAYS_PER_YEAR - risk_free_rate) / volatility)
    };

    SimulatedPath {
        values,
        final_return,
        volatility,
        max_drawdown,
        sharpe_ratio,
    }
}

fn summarize(values: &[f64], sorted: &[f64]) -> DistributionSummary {
    DistributionSummary {
        mean: statistics::mean(values),
        std: sample_std(values),
        percentile_5: percentile_sorted(sorted, 5.0),
        percentile_25: percentile_sorted(sorted, 25.0),
        percentile_50: percentile_sorted(sorted, 50.0),
        percentile_75: percentile_sorted(sorted, 75.0),
        percentile_95: percentile_sorted(sorted, 95.0),
    }
}

fn band(mut values: Vec<f64>) -> PercentileBand {
    values.sort_by(|a, b| a.total_cmp(b));
    PercentileBand {
        percentile_5: percentile_sorted(&values, 5.0),
        median: percentile_sorted(&values, 50.0),
        percentile_95: percentile_sorted(&values, 95.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::portfolio::PortfolioPosition;
    use ndarray::array;

    fn portfolio() -> Portfolio {
        let a: Vec<f64> = (0..40).map(|i| ((i as f64) * 0.8).sin() * 0.015 + 0.001).collect();
        let b: Vec<f64> = (0..40).map(|i| ((i as f64) * 1.3 + 0.5).cos() * 0.02).collect();
        Portfolio::new(vec![
            PortfolioPosition::new("CL", 0.6, a),
            PortfolioPosition::new("NG", 0.4, b),
        ])
    }

    #[test]
    fn test_validate_params_rejects_zero_and_over_cap() {
        let config = AnalyticsConfig::default();
        assert!(validate_params(&SimulationParams::new(0, 10), &config).is_err());
        assert!(validate_params(&SimulationParams::new(5001, 10), &config).is_err());
        assert!(validate_params(&SimulationParams::new(10, 0), &config).is_err());
        assert!(validate_params(&SimulationParams::new(10, 2521), &config).is_err());
        assert!(validate_params(&SimulationParams::new(5000, 2520), &config).is_ok());
    }

    #[test]
    fn test_same_seed_reproduces_results() {
        let config = AnalyticsConfig::default();
        let params = SimulationParams::new(50, 30).with_seed(42);
        let first = simulate_portfolio(&portfolio(), &params, &config).unwrap();
        let second = simulate_portfolio(&portfolio(), &params, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seeds_differ() {
        let config = AnalyticsConfig::default();
        let first = simulate_portfolio(&portfolio(), &SimulationParams::new(20, 30).with_seed(1), &config).unwrap();
        let second = simulate_portfolio(&portfolio(), &SimulationParams::new(20, 30).with_seed(2), &config).unwrap();
        assert_ne!(first.final_value_stats.mean, second.final_value_stats.mean);
    }

    #[test]
    fn test_unseeded_run_can_be_replayed() {
        let config = AnalyticsConfig::default();
        let params = SimulationParams::new(20, 30);
        let first = simulate_portfolio(&portfolio(), &params, &config).unwrap();
        let second = simulate_portfolio(&portfolio(), &params, &config).unwrap();
        assert_ne!(first.seed, second.seed);
        assert_ne!(first.final_value_stats.mean, second.final_value_stats.mean);

        let replay = simulate_portfolio(&portfolio(), &params.clone().with_seed(first.seed), &config).unwrap();
        assert_eq!(replay, first);
    }

    #[test]
    fn test_result_invariants() {
        let config = AnalyticsConfig::default();
        let params = SimulationParams::new(200, 60).with_seed(7).with_paths_returned(5);
        let result = simulate_portfolio(&portfolio(), &params, &config).unwrap();

        assert_eq!(result.paths.len(), 5);
        assert!(result.paths.iter().all(|p| p.values.len() == 60));
        assert!((0.0..=1.0).contains(&result.probability_of_loss));
        assert!(result.cvar_95 <= result.var_95);

        let stats = &result.final_value_stats;
        assert!(stats.percentile_5 <= stats.percentile_25);
        assert!(stats.percentile_25 <= stats.percentile_50);
        assert!(stats.percentile_50 <= stats.percentile_75);
        assert!(stats.percentile_75 <= stats.percentile_95);
        assert!(result.path_statistics.max_drawdown.percentile_95 <= 0.0);
    }

    #[test]
    fn test_returned_paths_capped_by_config() {
        let config = AnalyticsConfig {
            max_returned_paths: 3,
            ..AnalyticsConfig::default()
        };
        let params = SimulationParams::new(10, 5).with_seed(3).with_paths_returned(50);
        let result = simulate_portfolio(&portfolio(), &params, &config).unwrap();
        assert_eq!(result.paths.len(), 3);
    }

    #[test]
    fn test_zero_variance_asset_is_simulated() {
        let flat = vec![0.0; 20];
        let moving: Vec<f64> = (0..20).map(|i| ((i as f64) * 0.7).sin() * 0.01).collect();
        let portfolio = Portfolio::new(vec![
            PortfolioPosition::new("CASH", 0.5, flat),
            PortfolioPosition::new("CL", 0.5, moving),
        ]);
        let params = SimulationParams::new(10, 10).with_seed(11);
        let result = simulate_portfolio(&portfolio, &params, &AnalyticsConfig::default()).unwrap();
        assert!(result.final_value_stats.mean.is_finite());
    }

    #[test]
    fn test_factorize_accepts_rounding_level_indefiniteness() {
        // Perfectly correlated pair with a tiny negative eigenvalue
        let cov = array![[1.0, 1.0 + 1e-13], [1.0 + 1e-13, 1.0]];
        let l = factorize(&cov).unwrap();
        assert!(l.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_factorize_rejects_indefinite_matrix() {
        let cov = array![[1.0, 3.0], [3.0, 1.0]];
        match factorize(&cov) {
            Err(AnalyticsError::DegenerateInput(_)) => {}
            other => panic!("expected DegenerateInput, got {:?}", other),
        }
    }
}

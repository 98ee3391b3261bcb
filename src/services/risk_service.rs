use ndarray::{Array1, Array2};
use tracing::{debug, info};

use crate::config::{AnalyticsConfig, TRADING_DAYS_PER_YEAR};
use crate::errors::AnalyticsError;
use crate::models::portfolio::{AlignedPortfolio, Portfolio};
use crate::models::risk::{AssetMetrics, CorrelationMatrix, RiskContribution, RiskMetrics};
use crate::services::statistics::{
    self, correlation_matrix, covariance_matrix, max_drawdown_from_returns, percentile, sample_std,
    VARIANCE_EPSILON,
};

/// Compute the full risk/return report for a portfolio.
///
/// The positions are aligned first (common tail, complete periods only,
/// normalized weights); fewer than 2 assets or 10 aligned observations fail
/// with `InsufficientData` and no partial report.
pub fn compute_portfolio_metrics(
    portfolio: &Portfolio,
    config: &AnalyticsConfig,
) -> Result<RiskMetrics, AnalyticsError> {
    info!(
        "Analyzing portfolio risk for {} positions",
        portfolio.positions.len()
    );
    let aligned = portfolio.align()?;
    Ok(metrics_for_aligned(&aligned, config.risk_free_rate))
}

/// Risk report for an already aligned portfolio.
///
/// # Arguments
/// * `aligned` - Portfolio with common-length returns and normalized weights
/// * `risk_free_rate` - Annual risk-free rate (e.g., 0.045 for 4.5%)
pub fn metrics_for_aligned(aligned: &AlignedPortfolio, risk_free_rate: f64) -> RiskMetrics {
    let returns = aligned.portfolio_returns().to_vec();
    let weights = aligned.weights();
    let covariance = covariance_matrix(aligned.returns());

    let annualized_return = statistics::mean(&returns) * TRADING_DAYS_PER_YEAR;
    let annualized_volatility = sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt();
    let sharpe_ratio = sharpe(annualized_return, annualized_volatility, risk_free_rate);
    let sortino_ratio = compute_sortino(&returns, risk_free_rate);

    let (var_95, cvar_95) = historical_var(&returns, 0.95);
    let (var_99, cvar_99) = historical_var(&returns, 0.99);
    let max_drawdown = max_drawdown_from_returns(&returns);

    let correlation = correlation_matrix(aligned.returns());
    let correlation_matrix = CorrelationMatrix {
        symbols: aligned.symbols().to_vec(),
        values: correlation.outer_iter().map(|row| row.to_vec()).collect(),
    };

    let diversification_ratio = diversification_ratio(weights, &covariance);
    let risk_decomposition = risk_decomposition(aligned.symbols(), weights, &covariance);
    let individual_metrics = individual_metrics(aligned, risk_free_rate);

    debug!(
        annualized_return,
        annualized_volatility, var_95, max_drawdown, diversification_ratio, "Portfolio risk computed"
    );

    RiskMetrics {
        symbols: aligned.symbols().to_vec(),
        weights: weights.to_vec(),
        observations: aligned.n_observations(),
        annualized_return,
        annualized_volatility,
        sharpe_ratio,
        sortino_ratio,
        var_95,
        var_99,
        cvar_95,
        cvar_99,
        max_drawdown,
        correlation_matrix,
        diversification_ratio,
        risk_decomposition,
        individual_metrics,
    }
}

fn sharpe(annualized_return: f64, annualized_volatility: f64, risk_free_rate: f64) -> Option<f64> {
    if annualized_volatility.powi(2) < VARIANCE_EPSILON {
        return None;
    }
    Some((annualized_return - risk_free_rate) / annualized_volatility)
}

/// Annualized Sortino ratio.
///
/// Like Sharpe, but divides by the deviation of returns below the daily
/// risk-free rate only. `None` when fewer than two returns fall below it.
pub fn compute_sortino(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let risk_free_daily = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let mean = statistics::mean(returns);

    let downside: Vec<f64> = returns
        .iter()
        .filter(|&&r| r < risk_free_daily)
        .map(|r| r - risk_free_daily)
        .collect();
    if downside.len() < 2 {
        return None;
    }

    let downside_variance =
        downside.iter().map(|d| d.powi(2)).sum::<f64>() / (downside.len() as f64 - 1.0);
    let downside_deviation = downside_variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt();
    if downside_deviation.abs() < f64::EPSILON {
        return None;
    }

    Some(((mean - risk_free_daily) * TRADING_DAYS_PER_YEAR) / downside_deviation)
}

/// Historical VaR and CVaR at `confidence` (e.g. 0.95).
///
/// VaR is the `(1 − confidence)` percentile of the returns (linear
/// interpolation); CVaR is the mean of the returns at or below it, which
/// is never above VaR. Both are returns, so losses are negative.
pub fn historical_var(returns: &[f64], confidence: f64) -> (f64, f64) {
    let var = percentile(returns, (1.0 - confidence) * 100.0);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    let cvar = if tail.is_empty() {
        var
    } else {
        statistics::mean(&tail).min(var)
    };
    (var, cvar)
}

/// Weighted average asset volatility over portfolio volatility. 1.0 when
/// the portfolio has no volatility.
pub fn diversification_ratio(weights: &Array1<f64>, covariance: &Array2<f64>) -> f64 {
    let portfolio_variance = weights.dot(&covariance.dot(weights));
    if portfolio_variance < VARIANCE_EPSILON {
        return 1.0;
    }
    let weighted_vol: f64 = weights
        .iter()
        .zip(covariance.diag().iter())
        .map(|(w, var)| w * var.max(0.0).sqrt())
        .sum();
    weighted_vol / portfolio_variance.sqrt()
}

/// Split portfolio variance into per-position contributions.
///
/// Marginal contribution is `(Σw)ᵢ`, component contribution `wᵢ·(Σw)ᵢ`, and
/// the percentage is the component over `w'Σw`, so percentages sum to 100.
/// With zero portfolio variance the weights themselves are reported.
pub fn risk_decomposition(
    symbols: &[String],
    weights: &Array1<f64>,
    covariance: &Array2<f64>,
) -> Vec<RiskContribution> {
    let marginal = covariance.dot(weights);
    let component = weights * &marginal;
    let variance = component.sum();

    symbols
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            let percentage_contribution = if variance.abs() < VARIANCE_EPSILON {
                weights[i] * 100.0
            } else {
                component[i] / variance * 100.0
            };
            RiskContribution {
                symbol: symbol.clone(),
                weight: weights[i],
                marginal_contribution: marginal[i],
                component_contribution: component[i],
                percentage_contribution,
            }
        })
        .collect()
}

fn individual_metrics(aligned: &AlignedPortfolio, risk_free_rate: f64) -> Vec<AssetMetrics> {
    aligned
        .returns()
        .outer_iter()
        .zip(aligned.symbols())
        .zip(aligned.weights().iter())
        .map(|((row, symbol), &weight)| {
            let values = row.to_vec();
            let annualized_return = statistics::mean(&values) * TRADING_DAYS_PER_YEAR;
            let annualized_volatility = sample_std(&values) * TRADING_DAYS_PER_YEAR.sqrt();
            AssetMetrics {
                symbol: symbol.clone(),
                weight,
                annualized_return,
                annualized_volatility,
                sharpe_ratio: sharpe(annualized_return, annualized_volatility, risk_free_rate),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::portfolio::PortfolioPosition;
    use ndarray::array;

    fn wave(len: usize, phase: f64, scale: f64) -> Vec<f64> {
        (0..len)
            .map(|i| ((i as f64) * 0.9 + phase).sin() * scale + 0.0005)
            .collect()
    }

    #[test]
    fn test_historical_var_and_cvar() {
        let returns = vec![-0.05, -0.02, -0.01, 0.0, 0.01, 0.02, 0.03, 0.01, 0.0, -0.03];
        let (var, cvar) = historical_var(&returns, 0.95);
        // Sorted: -0.05, -0.03, ... ; rank 0.45 → −0.05 + 0.45·0.02
        assert!((var + 0.041).abs() < 1e-12);
        assert!((cvar + 0.05).abs() < 1e-12);
        assert!(cvar <= var);
    }

    #[test]
    fn test_sharpe_none_for_zero_volatility() {
        assert_eq!(sharpe(0.1, 0.0, 0.0), None);
        assert!((sharpe(0.1, 0.2, 0.02).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_constant_return_asset_has_no_sharpe() {
        let portfolio = Portfolio::new(vec![
            PortfolioPosition::new("CL", 0.5, wave(40, 0.0, 0.02)),
            PortfolioPosition::new("CASH", 0.5, vec![0.0001; 40]),
        ]);
        let metrics = compute_portfolio_metrics(&portfolio, &AnalyticsConfig::default()).unwrap();

        let cash = &metrics.individual_metrics[1];
        assert!(cash.annualized_volatility < 1e-9);
        assert_eq!(cash.sharpe_ratio, None);
        assert!(metrics.individual_metrics[0].sharpe_ratio.is_some());
    }

    #[test]
    fn test_sortino_requires_downside() {
        assert_eq!(compute_sortino(&[0.01, 0.02, 0.03], 0.0), None);
        assert!(compute_sortino(&[0.01, -0.02, 0.03, -0.01], 0.0).unwrap() > 0.0);
    }

    #[test]
    fn test_risk_decomposition_sums_to_hundred() {
        let symbols = vec!["CL".to_string(), "NG".to_string(), "HO".to_string()];
        let weights = array![0.5, 0.3, 0.2];
        let cov = array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.02], [0.0, 0.02, 0.01]];
        let parts = risk_decomposition(&symbols, &weights, &cov);
        let total: f64 = parts.iter().map(|p| p.percentage_contribution).sum();
        assert!((total - 100.0).abs() < 1e-9);
        // marginal for CL: 0.04·0.5 + 0.01·0.3
        assert!((parts[0].marginal_contribution - 0.023).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_falls_back_to_weights() {
        let symbols = vec!["A".to_string(), "B".to_string()];
        let weights = array![0.7, 0.3];
        let cov = Array2::<f64>::zeros((2, 2));
        let parts = risk_decomposition(&symbols, &weights, &cov);
        assert!((parts[0].percentage_contribution - 70.0).abs() < 1e-12);
        assert_eq!(diversification_ratio(&weights, &cov), 1.0);
    }

    #[test]
    fn test_metrics_report_is_consistent() {
        let portfolio = Portfolio::new(vec![
            PortfolioPosition::new("CL", 0.5, wave(60, 0.0, 0.02)),
            PortfolioPosition::new("NG", 0.5, wave(60, 2.0, 0.03)),
        ]);
        let metrics = compute_portfolio_metrics(&portfolio, &AnalyticsConfig::default()).unwrap();

        assert_eq!(metrics.observations, 60);
        assert!(metrics.annualized_volatility > 0.0);
        assert!(metrics.sharpe_ratio.is_some());
        assert!(metrics.cvar_95 <= metrics.var_95);
        assert!(metrics.cvar_99 <= metrics.var_99);
        assert!(metrics.var_99 <= metrics.var_95);
        assert!(metrics.max_drawdown <= 0.0);
        assert!(metrics.diversification_ratio >= 1.0 - 1e-12);
        assert_eq!(metrics.correlation_matrix.values[0][0], 1.0);
        assert_eq!(metrics.individual_metrics.len(), 2);

        // Volatility from returns matches the covariance form
        let w = array![0.5, 0.5];
        let portfolio_aligned = portfolio.align().unwrap();
        let cov = covariance_matrix(portfolio_aligned.returns());
        let vol = w.dot(&cov.dot(&w)).sqrt() * TRADING_DAYS_PER_YEAR.sqrt();
        assert!((vol - metrics.annualized_volatility).abs() < 1e-10);
    }

    #[test]
    fn test_single_asset_is_insufficient() {
        let portfolio = Portfolio::new(vec![PortfolioPosition::new("CL", 1.0, wave(30, 0.0, 0.01))]);
        match compute_portfolio_metrics(&portfolio, &AnalyticsConfig::default()) {
            Err(AnalyticsError::InsufficientData { required, actual, .. }) => {
                assert_eq!(required, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }
}

use serde::{Deserialize, Serialize};

/// Portfolio risk/return report.
///
/// Returns, volatilities and VaR/CVaR are fractions (0.12 for 12%), not
/// percentages. Annualized figures use 252 trading days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub symbols: Vec<String>,

    /// Normalized weights, in `symbols` order
    pub weights: Vec<f64>,

    /// Number of aligned observations used
    pub observations: usize,

    /// Mean daily portfolio return × 252
    pub annualized_return: f64,

    /// Sample standard deviation of daily portfolio returns × √252
    pub annualized_volatility: f64,

    /// `None` when volatility is zero
    pub sharpe_ratio: Option<f64>,

    /// `None` when there is no downside deviation
    pub sortino_ratio: Option<f64>,

    /// 5th percentile of historical daily portfolio returns
    pub var_95: f64,

    /// 1st percentile of historical daily portfolio returns
    pub var_99: f64,

    /// Mean of daily returns at or below `var_95`
    pub cvar_95: f64,

    pub cvar_99: f64,

    /// Largest peak-to-trough decline of the cumulative value curve (≤ 0)
    pub max_drawdown: f64,

    pub correlation_matrix: CorrelationMatrix,

    /// Weighted average asset volatility / portfolio volatility
    pub diversification_ratio: f64,

    pub risk_decomposition: Vec<RiskContribution>,

    pub individual_metrics: Vec<AssetMetrics>,
}

/// Pairwise Pearson correlations. `values[i][j]` pairs `symbols[i]` with
/// `symbols[j]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        Some(self.values[i][j])
    }
}

/// Contribution of a single position to total portfolio variance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskContribution {
    pub symbol: String,
    pub weight: f64,
    /// (Σw)ᵢ, daily
    pub marginal_contribution: f64,
    /// wᵢ·(Σw)ᵢ, daily
    pub component_contribution: f64,
    /// Share of portfolio variance, in percent; sums to 100 across positions
    pub percentage_contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetrics {
    pub symbol: String,
    pub weight: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: Option<f64>,
}

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{MIN_ASSETS, MIN_OBSERVATIONS};
use crate::errors::{AnalyticsError, Shortfall};
use crate::models::price_series::{PriceSeries, ReturnKind, ReturnSeries};

// One holding: its weight (any positive scale) and its return history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub symbol: String,
    pub weight: f64,
    pub returns: ReturnSeries,
    #[serde(default)]
    pub sector: Option<String>,
}

impl PortfolioPosition {
    pub fn new(symbol: impl Into<String>, weight: f64, returns: Vec<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            weight,
            returns: ReturnSeries::from_values(returns),
            sector: None,
        }
    }

    pub fn from_prices(series: &PriceSeries, weight: f64, kind: ReturnKind) -> Self {
        Self {
            symbol: series.symbol.clone(),
            weight,
            returns: ReturnSeries::from_prices(series, kind),
            sector: None,
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub positions: Vec<PortfolioPosition>,
}

impl Portfolio {
    pub fn new(positions: Vec<PortfolioPosition>) -> Self {
        Self { positions }
    }

    /// Truncate every return series to the most recent common window, drop
    /// periods where any asset is missing, and normalize the weights.
    pub fn align(&self) -> Result<AlignedPortfolio, AnalyticsError> {
        if self.positions.len() < MIN_ASSETS {
            return Err(AnalyticsError::InsufficientData {
                what: Shortfall::Assets,
                required: MIN_ASSETS,
                actual: self.positions.len(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for position in &self.positions {
            if !seen.insert(position.symbol.as_str()) {
                return Err(AnalyticsError::Validation(format!(
                    "Duplicate symbol in portfolio: {}",
                    position.symbol
                )));
            }
            if !position.weight.is_finite() || position.weight < 0.0 {
                return Err(AnalyticsError::Validation(format!(
                    "Weight for {} must be a non-negative number, got {}",
                    position.symbol, position.weight
                )));
            }
        }

        let total_weight: f64 = self.positions.iter().map(|p| p.weight).sum();
        if total_weight <= 0.0 {
            return Err(AnalyticsError::Validation(
                "Portfolio weights must sum to a positive value".to_string(),
            ));
        }

        let min_length = self
            .positions
            .iter()
            .map(|p| p.returns.len())
            .min()
            .unwrap_or(0);

        // Keep the tail of each series, then only periods where every asset has data
        let tails: Vec<&[f64]> = self
            .positions
            .iter()
            .map(|p| &p.returns.values[p.returns.len() - min_length..])
            .collect();
        let complete_periods: Vec<usize> = (0..min_length)
            .filter(|&t| tails.iter().all(|series| series[t].is_finite()))
            .collect();

        if complete_periods.len() < min_length {
            debug!(
                dropped = min_length - complete_periods.len(),
                "Dropped periods with missing returns during alignment"
            );
        }

        if complete_periods.len() < MIN_OBSERVATIONS {
            return Err(AnalyticsError::InsufficientData {
                what: Shortfall::Observations,
                required: MIN_OBSERVATIONS,
                actual: complete_periods.len(),
            });
        }

        let n_assets = self.positions.len();
        let n_obs = complete_periods.len();
        let returns = Array2::from_shape_fn((n_assets, n_obs), |(asset, k)| {
            tails[asset][complete_periods[k]]
        });
        let weights = Array1::from_iter(self.positions.iter().map(|p| p.weight / total_weight));

        Ok(AlignedPortfolio {
            symbols: self.positions.iter().map(|p| p.symbol.clone()).collect(),
            sectors: self.positions.iter().map(|p| p.sector.clone()).collect(),
            weights,
            returns,
        })
    }
}

/// A portfolio whose return series share one length and whose weights sum
/// to 1. Only [`Portfolio::align`] builds one, so holding it is proof the
/// alignment precondition was checked.
#[derive(Debug, Clone)]
pub struct AlignedPortfolio {
    symbols: Vec<String>,
    sectors: Vec<Option<String>>,
    weights: Array1<f64>,
    /// assets × observations
    returns: Array2<f64>,
}

impl AlignedPortfolio {
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn sectors(&self) -> &[Option<String>] {
        &self.sectors
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn returns(&self) -> &Array2<f64> {
        &self.returns
    }

    pub fn n_assets(&self) -> usize {
        self.returns.nrows()
    }

    pub fn n_observations(&self) -> usize {
        self.returns.ncols()
    }

    /// Weighted sum of asset returns for every period.
    pub fn portfolio_returns(&self) -> Array1<f64> {
        self.weights.dot(&self.returns)
    }
}

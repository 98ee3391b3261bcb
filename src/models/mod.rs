pub mod optimization;
pub mod oscillator;
pub mod portfolio;
pub mod price_series;
pub mod request;
pub mod risk;
pub mod simulation;

pub use optimization::{Objective, OptimizationParams, OptimizationResult, RiskTolerance, WeightChange};
pub use oscillator::{OscillatorKind, OscillatorLine, OscillatorPoint, OscillatorResult};
pub use portfolio::{AlignedPortfolio, Portfolio, PortfolioPosition};
pub use price_series::{PricePoint, PriceSeries, ReturnKind, ReturnSeries};
pub use request::{AnalyticsRequest, AnalyticsResponse};
pub use risk::{AssetMetrics, CorrelationMatrix, RiskContribution, RiskMetrics};
pub use simulation::{
    DistributionSummary, PathStatistics, PercentileBand, SimulatedPath, SimulationParams,
    SimulationResult,
};

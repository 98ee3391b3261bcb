use tracing::{info, warn};

use crate::config::AnalyticsConfig;
use crate::errors::AnalyticsError;
use crate::models::portfolio::Portfolio;
use crate::models::request::{AnalyticsRequest, AnalyticsResponse};
use crate::services::{monte_carlo_service, optimization_service, oscillators, risk_service};

/// Run one analytics request to completion.
///
/// Each operation is a pure function of its inputs (plus the seed for
/// simulations); nothing is cached between calls.
pub fn handle_request(
    request: AnalyticsRequest,
    config: &AnalyticsConfig,
) -> Result<AnalyticsResponse, AnalyticsError> {
    let operation = request.operation();
    info!("Handling {} request", operation);

    let result = match request {
        AnalyticsRequest::Oscillator { series, oscillator } => {
            oscillators::compute_oscillator(&series, &oscillator).map(AnalyticsResponse::Oscillator)
        }
        AnalyticsRequest::Metrics { positions } => {
            risk_service::compute_portfolio_metrics(&Portfolio::new(positions), config)
                .map(AnalyticsResponse::Metrics)
        }
        AnalyticsRequest::Simulation { positions, params } => {
            monte_carlo_service::simulate_portfolio(&Portfolio::new(positions), &params, config)
                .map(AnalyticsResponse::Simulation)
        }
        AnalyticsRequest::Optimization { positions, params } => {
            optimization_service::optimize_portfolio(&Portfolio::new(positions), &params, config)
                .map(AnalyticsResponse::Optimization)
        }
    };

    if let Err(e) = &result {
        warn!("{} request failed: {}", operation, e);
    }
    result
}

/// Parse a JSON request, run it and serialize the outcome.
///
/// Failures come back as an error payload rather than an `Err`, so callers
/// always get a JSON document; the flag reports whether the call succeeded.
pub fn handle_json(raw: &str, config: &AnalyticsConfig) -> (bool, serde_json::Value) {
    let request: AnalyticsRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => {
            let err = AnalyticsError::Validation(format!("malformed request: {}", e));
            return (false, payload_json(&err));
        }
    };

    match handle_request(request, config) {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(value) => (true, value),
            Err(e) => {
                let err = AnalyticsError::Validation(format!("unserializable response: {}", e));
                (false, payload_json(&err))
            }
        },
        Err(err) => (false, payload_json(&err)),
    }
}

fn payload_json(err: &AnalyticsError) -> serde_json::Value {
    serde_json::to_value(err.to_payload()).unwrap_or_else(|_| {
        serde_json::json!({ "error": err.kind(), "message": err.to_string() })
    })
}

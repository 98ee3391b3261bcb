use serde::Serialize;
use thiserror::Error;

/// Allocation reported alongside a failed optimization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeightSnapshot {
    pub symbol: String,
    pub weight: f64,
}

/// Which minimum an [`AnalyticsError::InsufficientData`] refers to.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Shortfall {
    Assets,
    Observations,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shortfall::Assets => write!(f, "assets"),
            Shortfall::Observations => write!(f, "observations"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Insufficient data: need at least {required} {what}, got {actual}")]
    InsufficientData {
        what: Shortfall,
        required: usize,
        actual: usize,
    },
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
    #[error("Optimization failed after {iterations} iterations: {reason}")]
    OptimizationFailed {
        reason: String,
        iterations: usize,
        best_weights: Option<Vec<WeightSnapshot>>,
    },
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Serializable form of an [`AnalyticsError`], handed back to JSON callers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insufficient: Option<Shortfall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_weights: Option<Vec<WeightSnapshot>>,
}

impl AnalyticsError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::InsufficientData { .. } => "insufficient_data",
            AnalyticsError::DegenerateInput(_) => "degenerate_input",
            AnalyticsError::OptimizationFailed { .. } => "optimization_failed",
            AnalyticsError::Validation(_) => "validation",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let mut payload = ErrorPayload {
            error: self.kind(),
            message: self.to_string(),
            insufficient: None,
            required: None,
            actual: None,
            best_weights: None,
        };
        match self {
            AnalyticsError::InsufficientData {
                what,
                required,
                actual,
            } => {
                payload.insufficient = Some(*what);
                payload.required = Some(*required);
                payload.actual = Some(*actual);
            }
            AnalyticsError::OptimizationFailed { best_weights, .. } => {
                payload.best_weights = best_weights.clone();
            }
            AnalyticsError::DegenerateInput(_) | AnalyticsError::Validation(_) => {}
        }
        payload
    }
}

impl From<String> for AnalyticsError {
    fn from(value: String) -> Self {
        AnalyticsError::Validation(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_payload_keeps_counts() {
        let err = AnalyticsError::InsufficientData {
            what: Shortfall::Observations,
            required: 10,
            actual: 4,
        };
        let payload = err.to_payload();

        assert_eq!(payload.error, "insufficient_data");
        assert_eq!(payload.insufficient, Some(Shortfall::Observations));
        assert_eq!(payload.required, Some(10));
        assert_eq!(payload.actual, Some(4));
        assert!(payload.message.contains("10"));
    }

    #[test]
    fn test_asset_shortfall_names_assets() {
        let err = AnalyticsError::InsufficientData {
            what: Shortfall::Assets,
            required: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "Insufficient data: need at least 2 assets, got 1");

        let json = serde_json::to_value(err.to_payload()).unwrap();
        assert_eq!(json["insufficient"], "assets");
    }

    #[test]
    fn test_optimization_failure_payload_carries_best_point() {
        let err = AnalyticsError::OptimizationFailed {
            reason: "iteration budget exhausted".to_string(),
            iterations: 50,
            best_weights: Some(vec![WeightSnapshot { symbol: "CL".to_string(), weight: 1.0 }]),
        };
        let json = serde_json::to_value(err.to_payload()).unwrap();

        assert_eq!(json["error"], "optimization_failed");
        assert_eq!(json["best_weights"][0]["symbol"], "CL");
        assert!(json.get("required").is_none());
    }

    #[test]
    fn test_string_converts_to_validation() {
        let err: AnalyticsError = "bad horizon".to_string().into();
        assert_eq!(err.kind(), "validation");
    }
}

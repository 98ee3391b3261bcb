//! Oscillators and portfolio analytics for commodity price series.
//!
//! Every operation is a synchronous, pure computation over in-memory
//! inputs; the binary in `main.rs` wraps [`services::analytics_service`]
//! as a JSON runner.

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;

pub use config::AnalyticsConfig;
pub use errors::AnalyticsError;

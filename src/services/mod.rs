pub mod analytics_service;
pub mod monte_carlo_service;
pub mod optimization_service;
pub mod oscillators;
pub mod risk_service;
pub mod statistics;

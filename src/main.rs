use std::io::Read;

use anyhow::{anyhow, Context};
use commodity_analytics::config::AnalyticsConfig;
use commodity_analytics::logging::{init_logging, LoggingConfig};
use commodity_analytics::services::analytics_service;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let config = AnalyticsConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow!("Invalid analytics configuration: {}", e))?;

    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read request file {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };

    let (ok, response) = analytics_service::handle_json(&raw, &config);
    let rendered = serde_json::to_string_pretty(&response).context("Failed to render response")?;
    println!("{}", rendered);

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

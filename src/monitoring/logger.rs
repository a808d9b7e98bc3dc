use std::io::IsTerminal;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::MonitoringConfig;

/// Install the global subscriber. Logs always go to stderr so stdout carries
/// nothing but the JSON result.
pub fn init_logging(config: &MonitoringConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true);

    let installed = if config.json_logs {
        builder
            .json()
            .with_file(true)
            .with_line_number(true)
            .try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| anyhow!("Failed to install log subscriber: {e}"))
}

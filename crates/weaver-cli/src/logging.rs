//! Structured logging for the command line.
//!
//! Logs go to stderr so that command output on stdout stays machine readable.

use anyhow::Context;
use std::io;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use weaver_deploy::WeaverConfig;

/// Initialize structured logging
pub fn init_logging(config: &WeaverConfig) -> anyhow::Result<()> {
    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // JSON logs for log aggregation
    let json_layer = config.log_json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(io::stderr)
    });

    // Compact logs for terminals
    let fmt_layer = (!config.log_json).then(|| fmt::layer().with_target(true).with_writer(io::stderr));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber).context("Failed to set global default subscriber")?;

    debug!(
        log_level = %config.log_level,
        log_format = if config.log_json { "json" } else { "text" },
        "Logging initialized"
    );

    Ok(())
}

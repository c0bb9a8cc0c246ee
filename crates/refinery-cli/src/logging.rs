//! Logging initialization.

use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// parseable with `--format json`.
pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
        LogFormat::Pretty => {
            fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

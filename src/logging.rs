//! Structured logging
//!
//! Installs the global `tracing` subscriber. Output goes to stderr so stdout
//! carries only the positions CSV.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per line
    Json,
}

/// Initialize the global tracing subscriber
///
/// Call once, early in `main()`. `RUST_LOG` overrides `default_level` when
/// set.
///
/// # Arguments
///
/// * `default_level` - Filter directive used without `RUST_LOG`, e.g. `"warn"`
///   or `"credit_line_engine=debug"`
/// * `format` - Output format
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}

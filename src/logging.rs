//! Structured logging
//!
//! Initializes the `tracing` subscriber with a pretty or JSON formatter and
//! `RUST_LOG`-style filtering. Log output goes to stderr.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output for local development
    #[default]
    Pretty,
    /// JSON lines for log aggregation
    Json,
}

/// Build the filter used by the subscriber
///
/// `RUST_LOG` wins when it is set and valid; otherwise `default_level` is used,
/// and an unparsable level falls back to `info`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber
///
/// Call once, early in `main()`.
///
/// # Arguments
///
/// * `default_level` - Level or directive list used when `RUST_LOG` is unset,
///   e.g. `"info"` or `"wallet_ledger=debug,tower_http=info"`
/// * `format` - Output format
pub fn init_logging(default_level: &str, format: LogFormat) {
    let filter = env_filter(default_level);

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::info!(?format, "logging initialized");
}

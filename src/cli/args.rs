use crate::core::{RetryPolicy, StoreConfig};
use crate::logging::LogFormat;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Wallet balance ledger served over HTTP
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Serve wallet deposits, withdrawals and balance reads", long_about = None)]
pub struct CliArgs {
    /// Address the HTTP server binds to
    #[arg(
        long = "listen",
        env = "WALLET_LISTEN",
        value_name = "ADDR",
        default_value = "0.0.0.0:8080"
    )]
    pub listen: SocketAddr,

    /// Directory of the ledger database
    #[arg(
        long = "data-dir",
        env = "WALLET_DATA_DIR",
        value_name = "DIR",
        default_value = "./data"
    )]
    pub data_dir: PathBuf,

    /// Default log level, overridden by RUST_LOG
    #[arg(
        long = "log-level",
        env = "LOG_LEVEL",
        value_name = "LEVEL",
        default_value = "info"
    )]
    pub log_level: String,

    /// Log output format
    #[arg(
        long = "log-format",
        env = "LOG_FORMAT",
        value_name = "FORMAT",
        default_value = "pretty",
        help = "Log format: 'pretty' for humans or 'json' for log aggregation"
    )]
    pub log_format: LogFormat,

    /// Number of runtime worker threads
    #[arg(
        long = "workers",
        env = "WALLET_WORKERS",
        value_name = "COUNT",
        help = "Number of runtime worker threads (default: CPU cores)"
    )]
    pub workers: Option<usize>,

    /// Attempts per operation before a transient error is returned
    #[arg(long = "max-attempts", value_name = "COUNT", default_value_t = 3)]
    pub max_attempts: u32,

    /// Backoff unit in microseconds, doubled after each failed attempt
    #[arg(long = "base-backoff-us", value_name = "MICROS", default_value_t = 10)]
    pub base_backoff_us: u64,

    /// Maximum wait for a wallet's row lock in milliseconds
    #[arg(long = "lock-timeout-ms", value_name = "MILLIS", default_value_t = 2000)]
    pub lock_timeout_ms: u64,

    /// Deadline of each HTTP request in milliseconds
    #[arg(long = "request-timeout-ms", value_name = "MILLIS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Write an operation history record with every balance update
    #[arg(long = "record-history", env = "WALLET_RECORD_HISTORY")]
    pub record_history: bool,
}

impl CliArgs {
    /// Create a RetryPolicy from CLI arguments
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_micros(self.base_backoff_us),
        )
    }

    /// Create a StoreConfig from CLI arguments
    ///
    /// A zero lock timeout falls back to the default with a warning.
    pub fn to_store_config(&self) -> StoreConfig {
        let default = StoreConfig::default();

        let lock_timeout = if self.lock_timeout_ms == 0 {
            tracing::warn!(
                default_ms = default.lock_timeout.as_millis() as u64,
                "invalid lock_timeout_ms, using default"
            );
            default.lock_timeout
        } else {
            Duration::from_millis(self.lock_timeout_ms)
        };

        StoreConfig {
            lock_timeout,
            record_history: self.record_history,
        }
    }

    /// Deadline applied to every HTTP request
    pub fn request_timeout(&self) -> Duration {
        if self.request_timeout_ms == 0 {
            tracing::warn!(default_ms = 5000u64, "invalid request_timeout_ms, using default");
            return Duration::from_millis(5000);
        }
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Worker thread count, defaulting to the number of CPU cores
    pub fn worker_threads(&self) -> usize {
        match self.workers {
            Some(0) | None => num_cpus::get(),
            Some(workers) => workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // Flags are passed explicitly so environment variables of the test process
    // cannot change the outcome of the cases below.
    const BASE: [&str; 5] = [
        "program",
        "--listen",
        "127.0.0.1:8080",
        "--data-dir",
        "./data",
    ];

    fn parse(extra: &[&str]) -> CliArgs {
        let args: Vec<&str> = BASE.iter().chain(extra).copied().collect();
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let parsed = parse(&["--log-level", "info", "--log-format", "pretty"]);

        assert_eq!(parsed.listen, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(parsed.data_dir, PathBuf::from("./data"));
        assert_eq!(parsed.max_attempts, 3);
        assert_eq!(parsed.base_backoff_us, 10);
        assert_eq!(parsed.lock_timeout_ms, 2000);
        assert_eq!(parsed.request_timeout_ms, 5000);
    }

    #[rstest]
    #[case::pretty(&["--log-format", "pretty"], LogFormat::Pretty)]
    #[case::json(&["--log-format", "json"], LogFormat::Json)]
    fn test_log_format_parsing(#[case] extra: &[&str], #[case] expected: LogFormat) {
        assert_eq!(parse(extra).log_format, expected);
    }

    // RetryPolicy conversion tests
    #[rstest]
    #[case::custom(&["--max-attempts", "5", "--base-backoff-us", "100"], 5, 100)]
    #[case::zero_attempts(&["--max-attempts", "0", "--base-backoff-us", "10"], 3, 10)]
    #[case::zero_backoff(&["--max-attempts", "4", "--base-backoff-us", "0"], 4, 10)]
    fn test_retry_policy_conversion(
        #[case] extra: &[&str],
        #[case] expected_attempts: u32,
        #[case] expected_backoff_us: u64,
    ) {
        let policy = parse(extra).to_retry_policy();

        assert_eq!(policy.max_attempts, expected_attempts);
        assert_eq!(
            policy.base_backoff,
            Duration::from_micros(expected_backoff_us)
        );
    }

    // StoreConfig conversion tests, zero lock timeout falls back to the default
    #[rstest]
    #[case::custom(&["--lock-timeout-ms", "250"], 250)]
    #[case::zero(&["--lock-timeout-ms", "0"], 2000)]
    fn test_store_config_conversion(#[case] extra: &[&str], #[case] expected_ms: u64) {
        let config = parse(extra).to_store_config();
        assert_eq!(config.lock_timeout, Duration::from_millis(expected_ms));
    }

    #[test]
    fn test_record_history_flag() {
        assert!(parse(&["--record-history"]).to_store_config().record_history);
    }

    #[rstest]
    #[case::custom(&["--request-timeout-ms", "750"], 750)]
    #[case::zero(&["--request-timeout-ms", "0"], 5000)]
    fn test_request_timeout(#[case] extra: &[&str], #[case] expected_ms: u64) {
        assert_eq!(
            parse(extra).request_timeout(),
            Duration::from_millis(expected_ms)
        );
    }

    #[rstest]
    #[case::explicit(&["--workers", "8"], 8)]
    #[case::zero(&["--workers", "0"], num_cpus::get())]
    fn test_worker_threads(#[case] extra: &[&str], #[case] expected: usize) {
        assert_eq!(parse(extra).worker_threads(), expected);
    }

    // Error handling tests
    #[rstest]
    #[case::invalid_listen(&["program", "--listen", "not-an-address"])]
    #[case::invalid_format(&["program", "--log-format", "xml"])]
    #[case::negative_attempts(&["program", "--max-attempts", "-1"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}

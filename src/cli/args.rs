use crate::logging::LogFormat;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay a credit-line ledger against a world file
#[derive(Parser, Debug)]
#[command(name = "credit-line-engine")]
#[command(about = "Replay a credit-line ledger and print the resulting positions", long_about = None)]
pub struct CliArgs {
    /// World file (JSON) describing pools, borrowers and engine config
    #[arg(value_name = "WORLD", help = "Path to the world JSON file")]
    pub world_file: PathBuf,

    /// Ledger file (CSV) of operations to replay
    #[arg(value_name = "LEDGER", help = "Path to the ledger CSV file")]
    pub ledger_file: PathBuf,

    /// Ledger reading strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Reading strategy: 'sync' for synchronous or 'async' for batched prefetch"
    )]
    pub strategy: StrategyType,

    /// Number of ledger rows per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of ledger rows per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of batches read ahead (async mode only)
    #[arg(
        long = "prefetch",
        value_name = "COUNT",
        help = "Number of batches read ahead of the engine (default: CPU cores)"
    )]
    pub prefetch: Option<usize>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Available ledger reading strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments, defaulting unset values
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.prefetch.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.prefetch.unwrap_or(default.prefetch),
            )
        } else {
            BatchConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "w.json", "l.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "w.json", "l.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "w.json", "l.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
        assert_eq!(parsed.world_file, PathBuf::from("w.json"));
        assert_eq!(parsed.ledger_file, PathBuf::from("l.csv"));
    }

    #[rstest]
    #[case::defaults(&["program", "w.json", "l.csv"], "warn", LogFormat::Pretty)]
    #[case::json_debug(
        &["program", "--log-level", "debug", "--log-format", "json", "w.json", "l.csv"],
        "debug",
        LogFormat::Json
    )]
    fn test_logging_options(
        #[case] args: &[&str],
        #[case] level: &str,
        #[case] format: LogFormat,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.log_level, level);
        assert_eq!(parsed.log_format, format);
    }

    #[rstest]
    #[case::all_defaults(&["program", "w.json", "l.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "w.json", "l.csv"], 2000, num_cpus::get())]
    #[case::custom_prefetch(&["program", "--prefetch", "8", "w.json", "l.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "w.json", "l.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_prefetch: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.prefetch, expected_prefetch);
    }

    #[rstest]
    #[case::missing_ledger(&["program", "w.json"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "w.json", "l.csv"])]
    #[case::invalid_log_format(&["program", "--log-format", "xml", "w.json", "l.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}

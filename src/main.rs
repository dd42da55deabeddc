//! Credit-Line Engine CLI
//!
//! Replays a ledger of credit-line operations against a world file and prints
//! the resulting open positions as CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- world.json ledger.csv > positions.csv
//! cargo run -- --strategy sync world.json ledger.csv > positions.csv
//! cargo run -- --strategy async --batch-size 2000 --prefetch 8 world.json ledger.csv
//! RUST_LOG=credit_line_engine=info cargo run -- --log-format json world.json ledger.csv
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success (rejected and malformed rows are logged, not fatal)
//! - 1: Fatal error (unreadable input, invalid world, engine fault)

use credit_line_engine::cli;
use credit_line_engine::logging;
use credit_line_engine::strategy;
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();
    logging::init_logging(&args.log_level, args.log_format);

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.world_file, &args.ledger_file, &mut output) {
        error!(error = %e, fault = e.is_fault(), "replay failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

//! Processing strategy module for ledger replay
//!
//! This module defines the Strategy pattern for complete replay pipelines:
//! load a world file, read a ledger, apply every row to the engine in file
//! order, and write the final positions. Strategies differ only in how the
//! ledger is read (synchronously, or in prefetched async batches).
//!
//! Row handling is shared through [`Replay`]:
//! - malformed rows are logged at `warn` and skipped
//! - business rejections are logged at `warn` and skipped
//! - faults (clock regression, collaborator failure, overflow) abort

use crate::cli::StrategyType;
use crate::io::csv_format::write_positions_csv;
use crate::io::world::{LoadedWorld, WorldFile};
use crate::types::{CreditError, LedgerEntry};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Row counts of a finished replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Rows the engine accepted
    pub applied: u64,
    /// Rows the engine rejected as business errors
    pub rejected: u64,
    /// Rows that could not be parsed
    pub malformed: u64,
}

/// Processing strategy trait for complete replay pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Replay a ledger against a world and write the final positions
    ///
    /// # Arguments
    ///
    /// * `world_path` - JSON world file
    /// * `ledger_path` - Ledger CSV file
    /// * `output` - Writer receiving the positions CSV
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read, the world is invalid,
    /// the engine reports a fault, or the output cannot be written.
    fn process(
        &self,
        world_path: &Path,
        ledger_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReplayStats, CreditError>;
}

/// Engine replay state shared by every strategy
pub struct Replay {
    loaded: LoadedWorld,
    stats: ReplayStats,
}

impl Replay {
    /// Load and build a world file
    pub fn open(world_path: &Path) -> Result<Self, CreditError> {
        let loaded = WorldFile::load(world_path)?.build()?;
        Ok(Replay {
            loaded,
            stats: ReplayStats::default(),
        })
    }

    /// Operator substituted into `default` rows without one
    pub fn admin(&self) -> crate::types::OperatorId {
        self.loaded.admin
    }

    /// Apply one ledger row
    ///
    /// Sets the clock to the row's time, then applies its operation.
    ///
    /// # Errors
    ///
    /// Returns the engine error only when it is a fault.
    pub fn apply(&mut self, row: Result<LedgerEntry, CreditError>) -> Result<(), CreditError> {
        let entry = match row {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping malformed ledger row");
                self.stats.malformed += 1;
                return Ok(());
            }
        };

        self.loaded.world.clock.set(entry.time);
        let op_type = entry.operation.op_type();
        match self.loaded.engine.apply(entry.operation) {
            Ok(()) => {
                self.stats.applied += 1;
                Ok(())
            }
            Err(e) if e.is_fault() => Err(e),
            Err(e) => {
                warn!(time = entry.time, ?op_type, error = %e, "operation rejected");
                self.stats.rejected += 1;
                Ok(())
            }
        }
    }

    /// Write the final positions and return the row counts
    pub fn finish(self, output: &mut dyn Write) -> Result<ReplayStats, CreditError> {
        let positions = self.loaded.engine.position_summaries()?;
        write_positions_csv(&positions, output)?;
        info!(
            applied = self.stats.applied,
            rejected = self.stats.rejected,
            malformed = self.stats.malformed,
            positions = positions.len(),
            "replay finished"
        );
        Ok(self.stats)
    }
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `config` - Optional configuration for async batch reading (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config))
        }
    }
}

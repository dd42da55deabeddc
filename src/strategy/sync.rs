//! Synchronous processing strategy
//!
//! Streams the ledger through [`SyncReader`] one row at a time and applies
//! each row before reading the next. Memory use is O(open positions), not
//! O(ledger rows).

use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingStrategy, Replay, ReplayStats};
use crate::types::CreditError;
use std::io::Write;
use std::path::Path;

/// Synchronous, single-threaded replay
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        world_path: &Path,
        ledger_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReplayStats, CreditError> {
        let mut replay = Replay::open(world_path)?;
        let reader = SyncReader::new(ledger_path, replay.admin())?;

        for row in reader {
            replay.apply(row)?;
        }

        replay.finish(output)
    }
}

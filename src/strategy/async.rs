//! Asynchronous batch processing strategy
//!
//! Reads the ledger in batches on a tokio task and applies rows on the
//! calling task as batches arrive. Reading runs ahead of application by up
//! to `prefetch` batches; rows are still applied strictly in file order, one
//! at a time, because every operation reads the state the previous one left.
//!
//! # Architecture
//!
//! ```text
//! reader task: AsyncReader ──batches──▶ mpsc(prefetch) ──▶ Replay::apply
//! ```

use crate::io::async_reader::AsyncReader;
use crate::strategy::{ProcessingStrategy, Replay, ReplayStats};
use crate::types::CreditError;
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration for batch reading
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of ledger rows per batch
    pub batch_size: usize,
    /// Number of batches the reader may run ahead
    pub prefetch: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            prefetch: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, prefetch: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let prefetch = if prefetch == 0 {
            warn!(prefetch, default = default.prefetch, "invalid prefetch, using default");
            default.prefetch
        } else {
            prefetch
        };

        Self {
            batch_size,
            prefetch,
        }
    }
}

/// Asynchronous batch replay
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(
        &self,
        world_path: &Path,
        ledger_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ReplayStats, CreditError> {
        // one thread reads ahead while the other applies rows
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .build()
            .map_err(|e| CreditError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let mut replay = Replay::open(world_path)?;

            let file = tokio::fs::File::open(ledger_path)
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => CreditError::FileNotFound {
                        path: ledger_path.display().to_string(),
                    },
                    _ => CreditError::from(e),
                })?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file, replay.admin());

            let (tx, mut rx) = mpsc::channel(self.config.prefetch);
            let batch_size = self.config.batch_size;
            let producer = tokio::spawn(async move {
                loop {
                    let batch = reader.read_batch(batch_size).await;
                    if batch.is_empty() {
                        break;
                    }
                    debug!(rows = batch.len(), "ledger batch read");
                    if tx.send(batch).await.is_err() {
                        // consumer stopped on a fault
                        break;
                    }
                }
            });

            while let Some(batch) = rx.recv().await {
                for row in batch {
                    replay.apply(row)?;
                }
            }
            producer.await.map_err(|e| CreditError::IoError {
                message: format!("Ledger reader task failed: {}", e),
            })?;

            replay.finish(output)
        })
    }
}

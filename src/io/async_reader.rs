//! Asynchronous ledger reader with batch interface
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of Result<LedgerEntry>
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```
//!
//! Malformed rows are kept in the batch as `ParseError` items so the replay
//! loop can report and count them in file order.

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::{CreditError, LedgerEntry, OperatorId};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

/// Asynchronous ledger reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    default_operator: OperatorId,
    line_num: u64,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Async reader providing CSV data
    /// * `default_operator` - Operator used by `default` rows without one
    pub fn new(reader: R, default_operator: OperatorId) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            default_operator,
            line_num: 1,
        }
    }

    /// Read up to `batch_size` ledger rows
    ///
    /// # Returns
    ///
    /// Converted rows in file order, each either an entry or the parse error
    /// for that row. Returns an empty vector at the end of the file.
    pub async fn read_batch(
        &mut self,
        batch_size: usize,
    ) -> Vec<Result<LedgerEntry, CreditError>> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            let Some(result) = records.next().await else {
                break;
            };
            self.line_num += 1;
            let line = Some(self.line_num);

            batch.push(match result {
                Ok(csv_record) => convert_csv_record(csv_record, self.default_operator)
                    .map_err(|e| match e {
                        CreditError::ParseError { message, .. } => {
                            CreditError::ParseError { line, message }
                        }
                        other => other,
                    }),
                Err(e) => Err(CreditError::ParseError {
                    line,
                    message: e.to_string(),
                }),
            });
        }

        batch
    }
}

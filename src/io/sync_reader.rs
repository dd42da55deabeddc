//! Synchronous ledger reader with iterator interface
//!
//! Provides a streaming iterator over ledger entries from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<LedgerEntry, CreditError>` for each CSV row:
//!
//! ```no_run
//! use credit_line_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("ledger.csv"), 1).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(entry) => println!("{:?}", entry),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Malformed rows are yielded as `ParseError` items carrying the line number

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::{CreditError, LedgerEntry, OperatorId};
use csv::{DeserializeRecordsIntoIter, ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous ledger reader
///
/// Reads one CSV record at a time; memory use does not grow with the ledger.
pub struct SyncReader {
    records: DeserializeRecordsIntoIter<File, CsvRecord>,
    default_operator: OperatorId,
    line_num: u64,
}

impl SyncReader {
    /// Open a ledger file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ledger CSV file
    /// * `default_operator` - Operator used by `default` rows without one
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` or `IoError` if the file cannot be opened.
    pub fn new(path: &Path, default_operator: OperatorId) -> Result<Self, CreditError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CreditError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => CreditError::from(e),
        })?;

        let records = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file)
            .into_deserialize::<CsvRecord>();

        Ok(Self {
            records,
            default_operator,
            line_num: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<LedgerEntry, CreditError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.records.next()?;
        self.line_num += 1;

        let line = self.line_num;
        Some(match result {
            Ok(csv_record) => {
                convert_csv_record(csv_record, self.default_operator).map_err(|e| match e {
                    CreditError::ParseError { message, .. } => CreditError::ParseError {
                        line: Some(line),
                        message,
                    },
                    other => other,
                })
            }
            Err(e) => Err(CreditError::from(e)),
        })
    }
}

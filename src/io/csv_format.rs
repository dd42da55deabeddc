//! CSV format handling for ledger rows and position output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to ledger entries
//! - Position output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Ledger format
//!
//! Columns: `type,time,pool,borrower,amount,operator`. Columns an operation
//! does not use may be left empty. `operator` is only read by `default` rows
//! and falls back to the world's admin when empty.

use crate::types::{
    BorrowerId, CreditError, LedgerEntry, Operation, OperationType, OperatorId, PoolId,
    PositionSummary, Timestamp,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Every column except `type` and `time` is optional because most operations
/// use only some of them.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub op_type: String,
    pub time: Timestamp,
    pub pool: Option<PoolId>,
    pub borrower: Option<BorrowerId>,
    pub amount: Option<String>,
    pub operator: Option<OperatorId>,
}

fn malformed(message: String) -> CreditError {
    CreditError::ParseError {
        line: None,
        message,
    }
}

/// Convert a CsvRecord to a LedgerEntry
///
/// # Arguments
///
/// * `csv_record` - The deserialized CSV record
/// * `default_operator` - Operator used by `default` rows without one
///
/// # Errors
///
/// Returns `ParseError` (without a line number) if the type is unknown, the
/// amount is not a decimal, or a column the operation needs is missing.
pub fn convert_csv_record(
    csv_record: CsvRecord,
    default_operator: OperatorId,
) -> Result<LedgerEntry, CreditError> {
    let op_type = OperationType::parse(csv_record.op_type.trim()).ok_or_else(|| {
        malformed(format!("Invalid operation type: '{}'", csv_record.op_type))
    })?;

    let amount = match csv_record.amount {
        Some(amount_str) if !amount_str.trim().is_empty() => Some(
            Decimal::from_str(amount_str.trim())
                .map_err(|_| malformed(format!("Invalid amount '{}'", amount_str)))?,
        ),
        _ => None,
    };

    let missing = |column: &str| malformed(format!("{:?} requires a {} column", op_type, column));
    let pool = match csv_record.pool {
        Some(pool) => pool,
        None if op_type.requires_pool() => return Err(missing("pool")),
        None => 0,
    };
    let borrower = match csv_record.borrower {
        Some(borrower) => borrower,
        None if op_type.requires_borrower() => return Err(missing("borrower")),
        None => 0,
    };
    let amount = match amount {
        Some(amount) => amount,
        None if op_type.requires_amount() => return Err(missing("amount")),
        None => Decimal::ZERO,
    };

    let operation = match op_type {
        OperationType::Borrow => Operation::Borrow {
            pool,
            borrower,
            amount,
        },
        OperationType::Repay => Operation::Repay {
            pool,
            borrower,
            amount,
        },
        OperationType::RepayInFull => Operation::RepayInFull { pool, borrower },
        OperationType::PayInterest => Operation::PayInterest { pool, borrower },
        OperationType::Poke => Operation::Poke { pool },
        OperationType::PokeAll => Operation::PokeAll,
        OperationType::PokeTimer => Operation::PokeTimer { pool, borrower },
        OperationType::UpdateScore => Operation::UpdateScore { pool, borrower },
        OperationType::UpdateAllScores => Operation::UpdateAllScores { borrower },
        OperationType::Default => Operation::Default {
            operator: csv_record.operator.unwrap_or(default_operator),
            borrower,
        },
    };

    Ok(LedgerEntry {
        time: csv_record.time,
        operation,
    })
}

/// Write position summaries in CSV format
///
/// Columns: pool, borrower, principal, interest, score,
/// next_interest_deadline, over_limit_since. Rows are sorted by pool then
/// borrower; amounts are printed with four decimal places.
///
/// # Errors
///
/// Returns `IoError` if the output cannot be written.
pub fn write_positions_csv(
    positions: &[PositionSummary],
    output: &mut dyn Write,
) -> Result<(), CreditError> {
    use csv::Writer;

    let write_error = |e: csv::Error| CreditError::IoError {
        message: format!("Failed to write positions: {}", e),
    };
    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "pool",
            "borrower",
            "principal",
            "interest",
            "score",
            "next_interest_deadline",
            "over_limit_since",
        ])
        .map_err(write_error)?;

    let mut sorted = positions.to_vec();
    sorted.sort_by_key(|position| (position.pool, position.borrower));

    for position in sorted {
        writer
            .write_record(&[
                position.pool.to_string(),
                position.borrower.to_string(),
                format!("{:.4}", position.principal),
                format!("{:.4}", position.interest),
                position.score.to_string(),
                position.next_interest_deadline.to_string(),
                position.over_limit_since.to_string(),
            ])
            .map_err(write_error)?;
    }

    writer.flush()?;
    Ok(())
}

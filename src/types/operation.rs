//! Transaction-log records for the credit-line engine
//!
//! Every mutating engine operation has an [`Operation`] variant. A sequence of
//! operations is the engine's serializable transaction log: replaying it in
//! order against the same collaborators reproduces the same state.

use super::ids::{BorrowerId, OperatorId, PoolId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Operation types accepted in a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Take additional principal from a pool
    Borrow,
    /// Pay interest first, then principal
    Repay,
    /// Clear the position exactly
    RepayInFull,
    /// Pay only accrued interest
    PayInterest,
    /// Refresh every active bucket of a pool
    Poke,
    /// Refresh every supported pool
    PokeAll,
    /// Set or clear the over-limit timer
    PokeTimer,
    /// Rebucket one position if the oracle score changed
    UpdateScore,
    /// Rebucket every open position of a borrower
    UpdateAllScores,
    /// Force a borrower into default
    Default,
}

impl OperationType {
    /// Parse a ledger type column (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        let op = match value.to_lowercase().as_str() {
            "borrow" => OperationType::Borrow,
            "repay" => OperationType::Repay,
            "repay_in_full" => OperationType::RepayInFull,
            "pay_interest" => OperationType::PayInterest,
            "poke" => OperationType::Poke,
            "poke_all" => OperationType::PokeAll,
            "poke_timer" => OperationType::PokeTimer,
            "update_score" => OperationType::UpdateScore,
            "update_all_scores" => OperationType::UpdateAllScores,
            "default" => OperationType::Default,
            _ => return None,
        };
        Some(op)
    }

    /// Whether this operation needs a pool column
    pub fn requires_pool(&self) -> bool {
        !matches!(
            self,
            OperationType::PokeAll | OperationType::UpdateAllScores | OperationType::Default
        )
    }

    /// Whether this operation needs a borrower column
    pub fn requires_borrower(&self) -> bool {
        !matches!(self, OperationType::Poke | OperationType::PokeAll)
    }

    /// Whether this operation needs an amount column
    pub fn requires_amount(&self) -> bool {
        matches!(self, OperationType::Borrow | OperationType::Repay)
    }
}

/// One mutating engine operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Borrow {
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    },
    Repay {
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    },
    RepayInFull {
        pool: PoolId,
        borrower: BorrowerId,
    },
    PayInterest {
        pool: PoolId,
        borrower: BorrowerId,
    },
    Poke {
        pool: PoolId,
    },
    PokeAll,
    PokeTimer {
        pool: PoolId,
        borrower: BorrowerId,
    },
    UpdateScore {
        pool: PoolId,
        borrower: BorrowerId,
    },
    UpdateAllScores {
        borrower: BorrowerId,
    },
    Default {
        operator: OperatorId,
        borrower: BorrowerId,
    },
}

impl Operation {
    /// The type tag of this operation
    pub fn op_type(&self) -> OperationType {
        match self {
            Operation::Borrow { .. } => OperationType::Borrow,
            Operation::Repay { .. } => OperationType::Repay,
            Operation::RepayInFull { .. } => OperationType::RepayInFull,
            Operation::PayInterest { .. } => OperationType::PayInterest,
            Operation::Poke { .. } => OperationType::Poke,
            Operation::PokeAll => OperationType::PokeAll,
            Operation::PokeTimer { .. } => OperationType::PokeTimer,
            Operation::UpdateScore { .. } => OperationType::UpdateScore,
            Operation::UpdateAllScores { .. } => OperationType::UpdateAllScores,
            Operation::Default { .. } => OperationType::Default,
        }
    }
}

/// One ledger row: an operation and the clock reading it executes at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub time: Timestamp,
    #[serde(flatten)]
    pub operation: Operation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("borrow", Some(OperationType::Borrow))]
    #[case("REPAY", Some(OperationType::Repay))]
    #[case("repay_in_full", Some(OperationType::RepayInFull))]
    #[case("Poke_All", Some(OperationType::PokeAll))]
    #[case("default", Some(OperationType::Default))]
    #[case("deposit", None)]
    fn test_parse(#[case] value: &str, #[case] expected: Option<OperationType>) {
        assert_eq!(OperationType::parse(value), expected);
    }

    #[test]
    fn test_operation_json_shape() {
        let op = Operation::Borrow {
            pool: 1,
            borrower: 7,
            amount: dec!(1000),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "borrow");
        assert_eq!(json["pool"], 1);
        assert_eq!(op.op_type(), OperationType::Borrow);

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}

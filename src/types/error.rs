//! Error types for the credit-line engine
//!
//! This module defines every error an engine operation or a ledger replay can
//! produce.
//!
//! # Error Categories
//!
//! - **Business rejections**: precondition failures detected before any state
//!   is touched (invalid amount, ineligible borrower, limit exceeded, ...).
//!   The caller may resubmit once the condition is resolved.
//! - **Faults**: malformed collaborator responses, clock regressions and
//!   arithmetic overflow. These are never swallowed; replay aborts on them.
//! - **File I/O and parsing**: world file and ledger input problems.

use super::ids::{BorrowerId, LockHolder, OperatorId, PoolId, Score, Timestamp};
use rust_decimal::Decimal;
use thiserror::Error;

/// Failure reported by an injected collaborator
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{collaborator}: {message}")]
pub struct CollaboratorError {
    /// Which collaborator failed (rate source, pool adapter, ...)
    pub collaborator: String,
    /// What went wrong
    pub message: String,
}

impl CollaboratorError {
    /// Create a CollaboratorError
    pub fn new(collaborator: &str, message: impl Into<String>) -> Self {
        CollaboratorError {
            collaborator: collaborator.to_string(),
            message: message.into(),
        }
    }
}

/// Main error type for the credit-line engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CreditError {
    /// Amount is zero or negative
    #[error("Invalid amount {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Borrower is not on the allow list
    #[error("Borrower {borrower} is not allowed")]
    NotAllowed {
        /// Borrower ID
        borrower: BorrowerId,
    },

    /// Pool is not recognized by the pool adapter
    #[error("Pool {pool} is not supported")]
    PoolNotSupported {
        /// Pool ID
        pool: PoolId,
    },

    /// Credit oracle reports the borrower as ineligible (stale or on hold)
    #[error("Borrower {borrower} is not eligible")]
    IneligibleBorrower {
        /// Borrower ID
        borrower: BorrowerId,
    },

    /// Borrower's score is under the configured minimum
    #[error("Borrower {borrower} score {score} is below minimum {minimum}")]
    BelowMinimumScore {
        /// Borrower ID
        borrower: BorrowerId,
        /// Current score
        score: Score,
        /// Configured minimum
        minimum: Score,
    },

    /// Interest deadline passed in this pool; new borrowing is blocked
    #[error("Interest overdue for borrower {borrower} in pool {pool} since {deadline}")]
    InterestOverdue {
        /// Pool ID
        pool: PoolId,
        /// Borrower ID
        borrower: BorrowerId,
        /// Missed deadline
        deadline: Timestamp,
    },

    /// Requested amount exceeds the additional amount the borrower may take
    #[error("Borrow of {requested} exceeds limit {limit} for borrower {borrower} in pool {pool}")]
    ExceedsBorrowLimit {
        /// Pool ID
        pool: PoolId,
        /// Borrower ID
        borrower: BorrowerId,
        /// Additional amount currently allowed
        limit: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Pool does not hold enough cash to fund the borrow
    #[error("Pool {pool} has {available} available, cannot lend {requested} to borrower {borrower}")]
    InsufficientLiquidity {
        /// Pool ID
        pool: PoolId,
        /// Borrower ID
        borrower: BorrowerId,
        /// Cash the pool can lend now
        available: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Repayment larger than the outstanding debt
    #[error("Repayment of {requested} exceeds debt {debt} for borrower {borrower} in pool {pool}")]
    ExceedsDebt {
        /// Pool ID
        pool: PoolId,
        /// Borrower ID
        borrower: BorrowerId,
        /// Outstanding principal plus interest
        debt: Decimal,
        /// Requested repayment
        requested: Decimal,
    },

    /// Exclusivity lock is held by another product (or the borrower is banned)
    #[error("Exclusivity lock for borrower {borrower} is held by {holder}")]
    LockHeldByOther {
        /// Borrower ID
        borrower: BorrowerId,
        /// Current holder
        holder: LockHolder,
    },

    /// Credit oracle never set a score for the borrower
    #[error("Score not set for borrower {borrower}")]
    ScoreNotSet {
        /// Borrower ID
        borrower: BorrowerId,
    },

    /// None of the default conditions holds
    #[error("No default reason for borrower {borrower}")]
    NoDefaultReason {
        /// Borrower ID
        borrower: BorrowerId,
    },

    /// Borrower has no open position where one is required
    #[error("No open position for borrower {borrower}{}", pool.map(|p| format!(" in pool {}", p)).unwrap_or_default())]
    NoOpenPosition {
        /// Pool ID (None when no pool holds debt at all)
        pool: Option<PoolId>,
        /// Borrower ID
        borrower: BorrowerId,
    },

    /// Operator lacks the capability required for an admin operation
    #[error("Operator {operator} lacks capability {capability}")]
    Unauthorized {
        /// Operator ID
        operator: OperatorId,
        /// Missing capability
        capability: String,
    },

    /// Engine configuration is invalid
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem
        message: String,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
    },

    /// Collaborator returned an error or malformed response
    #[error("Collaborator fault: {0}")]
    CollaboratorFault(#[from] CollaboratorError),

    /// Clock moved backwards relative to the last mutating operation
    #[error("Clock regression: last operation at {last}, clock reads {now}")]
    ClockRegression {
        /// Time of the last mutating operation
        last: Timestamp,
        /// Current clock reading
        now: Timestamp,
    },

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// Input parsing error
    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

impl From<std::io::Error> for CreditError {
    fn from(error: std::io::Error) -> Self {
        CreditError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for CreditError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        CreditError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for CreditError {
    fn from(error: serde_json::Error) -> Self {
        CreditError::ParseError {
            line: Some(error.line() as u64),
            message: error.to_string(),
        }
    }
}

impl CreditError {
    /// Whether this error is an engine fault rather than a business rejection
    ///
    /// Faults must abort a replay; rejections are logged and skipped.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            CreditError::ArithmeticOverflow { .. }
                | CreditError::CollaboratorFault(_)
                | CreditError::ClockRegression { .. }
                | CreditError::InvalidConfig { .. }
                | CreditError::FileNotFound { .. }
                | CreditError::IoError { .. }
        )
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal) -> Self {
        CreditError::InvalidAmount { amount }
    }

    /// Create a NotAllowed error
    pub fn not_allowed(borrower: BorrowerId) -> Self {
        CreditError::NotAllowed { borrower }
    }

    /// Create a PoolNotSupported error
    pub fn pool_not_supported(pool: PoolId) -> Self {
        CreditError::PoolNotSupported { pool }
    }

    /// Create an IneligibleBorrower error
    pub fn ineligible(borrower: BorrowerId) -> Self {
        CreditError::IneligibleBorrower { borrower }
    }

    /// Create a BelowMinimumScore error
    pub fn below_minimum_score(borrower: BorrowerId, score: Score, minimum: Score) -> Self {
        CreditError::BelowMinimumScore {
            borrower,
            score,
            minimum,
        }
    }

    /// Create an InterestOverdue error
    pub fn interest_overdue(pool: PoolId, borrower: BorrowerId, deadline: Timestamp) -> Self {
        CreditError::InterestOverdue {
            pool,
            borrower,
            deadline,
        }
    }

    /// Create an ExceedsBorrowLimit error
    pub fn exceeds_borrow_limit(
        pool: PoolId,
        borrower: BorrowerId,
        limit: Decimal,
        requested: Decimal,
    ) -> Self {
        CreditError::ExceedsBorrowLimit {
            pool,
            borrower,
            limit,
            requested,
        }
    }

    /// Create an InsufficientLiquidity error
    pub fn insufficient_liquidity(
        pool: PoolId,
        borrower: BorrowerId,
        available: Decimal,
        requested: Decimal,
    ) -> Self {
        CreditError::InsufficientLiquidity {
            pool,
            borrower,
            available,
            requested,
        }
    }

    /// Create an ExceedsDebt error
    pub fn exceeds_debt(
        pool: PoolId,
        borrower: BorrowerId,
        debt: Decimal,
        requested: Decimal,
    ) -> Self {
        CreditError::ExceedsDebt {
            pool,
            borrower,
            debt,
            requested,
        }
    }

    /// Create a LockHeldByOther error
    pub fn lock_held_by_other(borrower: BorrowerId, holder: LockHolder) -> Self {
        CreditError::LockHeldByOther { borrower, holder }
    }

    /// Create a ScoreNotSet error
    pub fn score_not_set(borrower: BorrowerId) -> Self {
        CreditError::ScoreNotSet { borrower }
    }

    /// Create a NoDefaultReason error
    pub fn no_default_reason(borrower: BorrowerId) -> Self {
        CreditError::NoDefaultReason { borrower }
    }

    /// Create a NoOpenPosition error
    pub fn no_open_position(pool: Option<PoolId>, borrower: BorrowerId) -> Self {
        CreditError::NoOpenPosition { pool, borrower }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(operator: OperatorId, capability: &str) -> Self {
        CreditError::Unauthorized {
            operator,
            capability: capability.to_string(),
        }
    }

    /// Create an InvalidConfig error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        CreditError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str) -> Self {
        CreditError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }
}

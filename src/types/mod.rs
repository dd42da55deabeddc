//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `ids`: identifier aliases, units and the exclusivity lock holder
//! - `position`: buckets, positions and credit reports
//! - `operation`: transaction-log records
//! - `event`: events and default reasons
//! - `error`: error types for the credit-line engine

pub mod error;
pub mod event;
pub mod ids;
pub mod operation;
pub mod position;

pub use error::{CollaboratorError, CreditError};
pub use event::{CreditEvent, DebtClaim, DefaultReason};
pub use ids::{
    BasisPoints, BorrowerId, LockHolder, OperatorId, PoolId, ProductId, Score, Timestamp,
    BPS_DENOMINATOR, MAX_SCORE, SECONDS_PER_YEAR,
};
pub use operation::{LedgerEntry, Operation, OperationType};
pub use position::{Bucket, CreditReport, Position, PositionSummary};

//! Debt record types for the credit-line engine
//!
//! This module defines the per-score accrual bucket, the per-borrower debt
//! position, and the credit report supplied by the credit oracle.

use super::ids::{BasisPoints, BorrowerId, PoolId, Score, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregated accrual state shared by every position in a pool with the same score
///
/// Buckets exist only while at least one position is tracked against them;
/// `total_borrowed == 0` if and only if `borrowers_count == 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Sum of member principals
    pub total_borrowed: Decimal,

    /// Number of positions tracked against this bucket
    pub borrowers_count: u32,

    /// Composite rate snapshot taken at the last update
    pub rate: BasisPoints,

    /// Interest owed per unit of principal since the bucket was opened
    ///
    /// Never decreases while the bucket exists.
    pub cumulative_interest_per_share: Decimal,

    /// Clock reading at the last accrual
    pub last_update_time: Timestamp,
}

impl Bucket {
    /// Create an empty bucket opened at `now`
    pub fn new(now: Timestamp) -> Self {
        Bucket {
            total_borrowed: Decimal::ZERO,
            borrowers_count: 0,
            rate: 0,
            cumulative_interest_per_share: Decimal::ZERO,
            last_update_time: now,
        }
    }
}

/// A borrower's debt in one pool
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// Pool the debt is owed to
    pub pool: PoolId,

    /// Borrower owing the debt
    pub borrower: BorrowerId,

    /// Outstanding borrowed amount, exclusive of interest
    pub principal: Decimal,

    /// Score of the bucket this position accrues against
    pub bucket_score: Score,

    /// Bucket index as of the position's last settlement
    pub interest_index_snapshot: Decimal,

    /// Interest settled at the last settlement and not yet paid
    pub interest_carried: Decimal,

    /// Deadline for the next interest payment (0 = none open)
    pub next_interest_deadline: Timestamp,

    /// Start of the current continuous over-limit period (0 = within limit)
    pub over_limit_since: Timestamp,

    /// Interest paid on this position since it was opened
    pub total_interest_paid: Decimal,
}

impl Position {
    /// Create a zero-principal position tracked against `score` at `index`
    pub fn new(pool: PoolId, borrower: BorrowerId, score: Score, index: Decimal) -> Self {
        Position {
            pool,
            borrower,
            principal: Decimal::ZERO,
            bucket_score: score,
            interest_index_snapshot: index,
            interest_carried: Decimal::ZERO,
            next_interest_deadline: 0,
            over_limit_since: 0,
            total_interest_paid: Decimal::ZERO,
        }
    }

    /// Whether the interest deadline has passed at `now`
    pub fn is_interest_overdue(&self, now: Timestamp) -> bool {
        self.next_interest_deadline != 0 && now > self.next_interest_deadline
    }
}

/// Point-in-time view of a position, with interest evaluated at a clock reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub pool: PoolId,
    pub borrower: BorrowerId,
    pub principal: Decimal,
    pub interest: Decimal,
    pub score: Score,
    pub next_interest_deadline: Timestamp,
    pub over_limit_since: Timestamp,
}

/// Credit oracle view of a borrower
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditReport {
    /// Current credit score
    pub score: Score,

    /// Whether the borrower may take on debt (not stale, not on hold)
    pub eligible: bool,

    /// Global credit ceiling before score adjustment
    pub credit_limit: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_new_bucket_is_empty() {
        let bucket = Bucket::new(42);
        assert_eq!(bucket.total_borrowed, Decimal::ZERO);
        assert_eq!(bucket.borrowers_count, 0);
        assert_eq!(bucket.cumulative_interest_per_share, Decimal::ZERO);
        assert_eq!(bucket.last_update_time, 42);
    }

    #[rstest]
    #[case::no_deadline(0, 1_000, false)]
    #[case::before_deadline(500, 400, false)]
    #[case::at_deadline(500, 500, false)]
    #[case::after_deadline(500, 501, true)]
    fn test_is_interest_overdue(
        #[case] deadline: Timestamp,
        #[case] now: Timestamp,
        #[case] expected: bool,
    ) {
        let mut position = Position::new(1, 1, 255, Decimal::ZERO);
        position.next_interest_deadline = deadline;
        assert_eq!(position.is_interest_overdue(now), expected);
    }
}

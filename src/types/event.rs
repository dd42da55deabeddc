//! Events emitted by successful engine operations

use super::ids::{BorrowerId, PoolId, Score, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a borrower was forced into default
///
/// Variants are listed in evaluation priority; the first one that holds is
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultReason {
    NotAllowed,
    Ineligible,
    BelowMinScore,
    InterestOverdue,
    BorrowLimitExceeded,
}

impl fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            DefaultReason::NotAllowed => "not_allowed",
            DefaultReason::Ineligible => "ineligible",
            DefaultReason::BelowMinScore => "below_min_score",
            DefaultReason::InterestOverdue => "interest_overdue",
            DefaultReason::BorrowLimitExceeded => "borrow_limit_exceeded",
        };
        f.write_str(code)
    }
}

/// External debt claim issued for a defaulted position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtClaim {
    pub pool: PoolId,
    pub borrower: BorrowerId,
    /// Principal plus interest owed at default
    pub amount: Decimal,
}

/// Observable state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CreditEvent {
    BorrowRecorded {
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    },
    Repaid {
        pool: PoolId,
        borrower: BorrowerId,
        principal: Decimal,
        interest: Decimal,
    },
    InterestPaid {
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    },
    Rebucketed {
        pool: PoolId,
        borrower: BorrowerId,
        from: Score,
        to: Score,
    },
    OverLimitTimerSet {
        pool: PoolId,
        borrower: BorrowerId,
        since: Timestamp,
    },
    OverLimitTimerCleared {
        pool: PoolId,
        borrower: BorrowerId,
    },
    EnteredDefault {
        borrower: BorrowerId,
        reason: DefaultReason,
        claims: Vec<DebtClaim>,
    },
    PoolRefreshed {
        pool: PoolId,
        active_buckets: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reason_codes() {
        assert_eq!(DefaultReason::InterestOverdue.to_string(), "interest_overdue");
        assert_eq!(
            serde_json::to_value(DefaultReason::BelowMinScore).unwrap(),
            "below_min_score"
        );
    }

    #[test]
    fn test_event_is_tagged() {
        let event = CreditEvent::Repaid {
            pool: 1,
            borrower: 2,
            principal: dec!(500),
            interest: dec!(100),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "repaid");
        assert_eq!(json["principal"], "500");
    }
}

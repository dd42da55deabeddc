//! Default condition evaluation
//!
//! The detector only decides *whether* and *why* a borrower may be forced
//! into default. Closing positions, issuing claims and banning the borrower
//! are the engine's job.

use crate::config::EngineConfig;
use crate::types::{CreditReport, DefaultReason, Position, Timestamp};

/// Evaluates default reasons in priority order
#[derive(Debug, Clone, Copy)]
pub struct DefaultDetector<'a> {
    config: &'a EngineConfig,
}

impl<'a> DefaultDetector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        DefaultDetector { config }
    }

    /// First default reason that holds, if any
    ///
    /// A missing credit report counts as ineligible. Interest and limit
    /// reasons look at every open position; one violating pool suffices.
    ///
    /// # Arguments
    ///
    /// * `allowed` - Whether the borrower is on the allow list
    /// * `report` - Credit oracle view of the borrower
    /// * `positions` - The borrower's open positions
    /// * `now` - Current clock reading
    pub fn reason(
        &self,
        allowed: bool,
        report: Option<&CreditReport>,
        positions: &[&Position],
        now: Timestamp,
    ) -> Option<DefaultReason> {
        if !allowed {
            return Some(DefaultReason::NotAllowed);
        }
        let report = match report {
            Some(report) if report.eligible => report,
            _ => return Some(DefaultReason::Ineligible),
        };
        if report.score < self.config.min_score {
            return Some(DefaultReason::BelowMinScore);
        }
        if positions.iter().any(|p| self.interest_overdue(p, now)) {
            return Some(DefaultReason::InterestOverdue);
        }
        if positions.iter().any(|p| self.limit_grace_expired(p, now)) {
            return Some(DefaultReason::BorrowLimitExceeded);
        }
        None
    }

    fn interest_overdue(&self, position: &Position, now: Timestamp) -> bool {
        position.next_interest_deadline != 0
            && now
                > position
                    .next_interest_deadline
                    .saturating_add(self.config.overdue_grace_period)
    }

    fn limit_grace_expired(&self, position: &Position, now: Timestamp) -> bool {
        position.over_limit_since != 0
            && now
                > position
                    .over_limit_since
                    .saturating_add(self.config.limit_grace_period)
    }
}

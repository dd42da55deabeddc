//! Settable credit oracle

use crate::core::traits::CreditSource;
use crate::types::{BorrowerId, CollaboratorError, CreditReport, Score};
use dashmap::DashMap;
use std::sync::Arc;

/// Credit reports keyed by borrower, written by the driver
#[derive(Debug, Clone, Default)]
pub struct InMemoryCreditOracle {
    reports: Arc<DashMap<BorrowerId, CreditReport>>,
}

impl InMemoryCreditOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a borrower's whole report
    pub fn set_report(&self, borrower: BorrowerId, report: CreditReport) {
        self.reports.insert(borrower, report);
    }

    /// Change only the score; no-op if the borrower has no report
    pub fn set_score(&self, borrower: BorrowerId, score: Score) {
        if let Some(mut report) = self.reports.get_mut(&borrower) {
            report.score = score;
        }
    }

    /// Change only the eligibility flag; no-op if the borrower has no report
    pub fn set_eligible(&self, borrower: BorrowerId, eligible: bool) {
        if let Some(mut report) = self.reports.get_mut(&borrower) {
            report.eligible = eligible;
        }
    }
}

impl CreditSource for InMemoryCreditOracle {
    fn credit_report(
        &self,
        borrower: BorrowerId,
    ) -> Result<Option<CreditReport>, CollaboratorError> {
        Ok(self.reports.get(&borrower).map(|entry| *entry))
    }
}

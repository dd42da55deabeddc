//! Borrow limit calculation
//!
//! Three independent caps bound a borrower's debt in a pool, each expressed
//! as a gross ceiling on that debt:
//!
//! - **A (credit)**: credit limit scaled by the adjustment curve at the
//!   borrower's score, minus what the borrower owes in every other pool.
//! - **B (single pool)**: a fixed fraction of the pool's value.
//! - **C (aggregate)**: a fixed fraction of all supported pools' value, minus
//!   the principal everybody else has drawn from the supported pools.
//!
//! The borrower may take `min(A, B, C) - debt_here` more, and is over limit
//! while `debt_here` exceeds the ceiling. The calculator is pure; the engine
//! gathers the inputs.

use crate::config::EngineConfig;
use crate::types::{CreditError, CreditReport};
use rust_decimal::Decimal;

/// Everything the limit decision depends on, gathered at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct LimitInputs {
    /// Credit oracle view of the borrower, `None` if never scored
    pub report: Option<CreditReport>,
    /// Principal plus interest owed in the target pool
    pub debt_here: Decimal,
    /// Principal owed in the target pool
    pub principal_here: Decimal,
    /// Principal plus interest owed in every other pool
    pub debt_elsewhere: Decimal,
    /// Value of the target pool
    pub pool_value: Decimal,
    /// Summed value of every supported pool
    pub supported_value: Decimal,
    /// Summed principal drawn from every supported pool, by all borrowers
    pub supported_principal: Decimal,
}

/// Ceiling and current debt for one (pool, borrower)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorrowCapacity {
    /// Gross ceiling on the borrower's debt in the pool, never negative
    pub ceiling: Decimal,
    /// Current principal plus interest in the pool
    pub debt: Decimal,
}

impl BorrowCapacity {
    /// Additional amount the borrower may take
    pub fn additional(&self) -> Decimal {
        (self.ceiling - self.debt).max(Decimal::ZERO)
    }

    /// Whether current debt is above the ceiling
    pub fn is_exceeded(&self) -> bool {
        self.debt > self.ceiling
    }
}

/// Pure borrow-limit math over an [`EngineConfig`]
#[derive(Debug, Clone, Copy)]
pub struct LimitCalculator<'a> {
    config: &'a EngineConfig,
}

impl<'a> LimitCalculator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        LimitCalculator { config }
    }

    /// Credit limit scaled by the adjustment curve at the reported score
    ///
    /// Zero without a report.
    pub fn single_credit_value(
        &self,
        report: Option<&CreditReport>,
    ) -> Result<Decimal, CreditError> {
        let Some(report) = report else {
            return Ok(Decimal::ZERO);
        };
        report
            .credit_limit
            .checked_mul(self.config.adjustment_curve.fraction(report.score))
            .ok_or_else(|| CreditError::arithmetic_overflow("single_credit_value"))
    }

    /// Share of one pool's value a single borrower may owe it
    pub fn pool_credit_value(&self, pool_value: Decimal) -> Result<Decimal, CreditError> {
        pool_value
            .checked_mul(self.config.single_pool_cap)
            .ok_or_else(|| CreditError::arithmetic_overflow("pool_credit_value"))
    }

    /// Aggregate room left across all supported pools
    pub fn aggregate_credit_value(
        &self,
        supported_value: Decimal,
        supported_principal: Decimal,
    ) -> Result<Decimal, CreditError> {
        supported_value
            .checked_mul(self.config.aggregate_cap)
            .and_then(|cap| cap.checked_sub(supported_principal))
            .ok_or_else(|| CreditError::arithmetic_overflow("aggregate_credit_value"))
    }

    /// Evaluate all three caps
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if any cap cannot be represented.
    pub fn capacity(&self, inputs: &LimitInputs) -> Result<BorrowCapacity, CreditError> {
        let overflow = || CreditError::arithmetic_overflow("borrow_capacity");

        let credit = self
            .single_credit_value(inputs.report.as_ref())?
            .checked_sub(inputs.debt_elsewhere)
            .ok_or_else(overflow)?;
        let pool = self.pool_credit_value(inputs.pool_value)?;
        let others_principal = inputs
            .supported_principal
            .checked_sub(inputs.principal_here)
            .ok_or_else(overflow)?;
        let aggregate =
            self.aggregate_credit_value(inputs.supported_value, others_principal)?;

        let ceiling = credit.min(pool).min(aggregate).max(Decimal::ZERO);
        Ok(BorrowCapacity {
            ceiling,
            debt: inputs.debt_here,
        })
    }
}

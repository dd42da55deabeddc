//! Collaborator contracts consumed by the credit-line engine
//!
//! The engine owns only the bucket and position state. Everything else (rates,
//! credit scores, pool liquidity, the cross-product exclusivity lock, default
//! claim issuance and time) is reached through these traits. Implementations
//! are injected as `Arc<dyn _>` at construction and can be swapped afterwards
//! only through the engine's admin operations.
//!
//! Each method reports failure as a [`CollaboratorError`]; the engine surfaces
//! it as a fatal `CollaboratorFault`, never as a business rejection.

use crate::types::{
    BasisPoints, BorrowerId, CollaboratorError, CreditReport, DebtClaim, LockHolder, PoolId,
    ProductId, Score, Timestamp,
};
use rust_decimal::Decimal;

/// Interest-rate model
pub trait RateSource: Send + Sync {
    /// Composite borrowing rate for a score bucket at the given pool utilization (0..=1)
    fn composite_rate(
        &self,
        pool: PoolId,
        score: Score,
        utilization: Decimal,
    ) -> Result<BasisPoints, CollaboratorError>;
}

/// Credit score and eligibility oracle
pub trait CreditSource: Send + Sync {
    /// Current report for a borrower, `None` if no score was ever set
    fn credit_report(&self, borrower: BorrowerId)
        -> Result<Option<CreditReport>, CollaboratorError>;
}

/// Lending pool registry and fund mover
pub trait PoolAdapter: Send + Sync {
    /// Every pool the engine may lend from
    fn supported_pools(&self) -> Vec<PoolId>;

    /// Whether `pool` is a recognized, supported pool
    fn is_supported(&self, pool: PoolId) -> bool;

    /// Total value of the pool's assets
    fn value(&self, pool: PoolId) -> Result<Decimal, CollaboratorError>;

    /// Cash the pool can lend right now
    fn liquidity(&self, pool: PoolId) -> Result<Decimal, CollaboratorError>;

    /// Move funds from the pool to the borrower
    fn transfer_out(
        &self,
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    ) -> Result<(), CollaboratorError>;

    /// Move funds from the borrower into the pool
    fn transfer_in(
        &self,
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    ) -> Result<(), CollaboratorError>;
}

/// Single global "open obligation" lock per borrower, shared across debt products
pub trait ExclusivityLock: Send + Sync {
    /// Current holder, if any
    fn holder_of(&self, borrower: BorrowerId) -> Result<Option<LockHolder>, CollaboratorError>;

    /// Take the lock for `product`; succeeds if free or already held by `product`
    fn try_acquire(&self, borrower: BorrowerId, product: ProductId)
        -> Result<(), CollaboratorError>;

    /// Release the lock if held by `product`
    fn release(&self, borrower: BorrowerId, product: ProductId) -> Result<(), CollaboratorError>;

    /// Set the lock to the permanent banned sentinel
    fn ban(&self, borrower: BorrowerId) -> Result<(), CollaboratorError>;
}

/// Issues external debt claims for defaulted positions
pub trait DefaultIssuer: Send + Sync {
    /// Issue every claim of a default, or none of them
    fn issue_claims(&self, claims: &[DebtClaim]) -> Result<(), CollaboratorError>;

    /// Withdraw a batch previously accepted by `issue_claims`
    fn withdraw_claims(&self, claims: &[DebtClaim]) -> Result<(), CollaboratorError>;
}

/// Monotonic time source, read once at the start of each operation
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock in whole seconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_past_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }

    #[test]
    fn test_traits_are_object_safe() {
        fn assert_object_safe(
            _: Option<&dyn RateSource>,
            _: Option<&dyn CreditSource>,
            _: Option<&dyn PoolAdapter>,
            _: Option<&dyn ExclusivityLock>,
            _: Option<&dyn DefaultIssuer>,
            _: Option<&dyn Clock>,
        ) {
        }
        assert_object_safe(None, None, None, None, None, None);
    }
}

//! Identifier and unit types shared across the credit-line engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lending pool identifier
pub type PoolId = u16;

/// Borrower identity
pub type BorrowerId = u32;

/// Credit score as reported by the credit oracle (0-255)
pub type Score = u8;

/// Seconds on the externally supplied monotonic clock
pub type Timestamp = u64;

/// Administrative caller identity
pub type OperatorId = u32;

/// Identity of a debt product that may hold a borrower's exclusivity lock
pub type ProductId = u32;

/// Interest rate in basis points (1 bp = 0.01%)
pub type BasisPoints = u32;

/// Basis points in 100%
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Seconds in the 365-day accrual year
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Highest credit score the oracle can report
pub const MAX_SCORE: Score = Score::MAX;

/// Holder of a borrower's exclusivity lock
///
/// `Banned` is the reserved sentinel written when a borrower defaults. It can
/// never compare equal to a real product, so ordinary borrowing through any
/// product is rejected from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockHolder {
    /// A debt product currently owning the borrower's open obligation
    Product(ProductId),
    /// Permanently barred after a forced default
    Banned,
}

impl LockHolder {
    /// Whether this holder is the given product
    pub fn is_product(&self, product: ProductId) -> bool {
        matches!(self, LockHolder::Product(p) if *p == product)
    }
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockHolder::Product(id) => write!(f, "product {}", id),
            LockHolder::Banned => write!(f, "banned"),
        }
    }
}

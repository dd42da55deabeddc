//! Core business logic module
//!
//! This module contains the credit-line accounting components:
//! - `traits` - Collaborator contracts (rates, credit, pools, lock, claims, clock)
//! - `bucket_ledger` - Per-pool, per-score interest accrual
//! - `position_store` - Per-(pool, borrower) debt positions
//! - `limit` - Borrow-limit math
//! - `default_detector` - Default reason evaluation
//! - `access` - Operator capabilities for admin operations
//! - `engine` - Operation orchestration
//! - `memory` - In-memory collaborator implementations

pub mod access;
pub mod bucket_ledger;
pub mod default_detector;
pub mod engine;
pub mod limit;
pub mod memory;
pub mod position_store;
pub mod traits;

pub use access::{AccessControl, Capability};
pub use bucket_ledger::BucketLedger;
pub use default_detector::DefaultDetector;
pub use engine::{Collaborators, CreditLineEngine};
pub use limit::{BorrowCapacity, LimitCalculator, LimitInputs};
pub use memory::InMemoryWorld;
pub use position_store::PositionStore;
pub use traits::{
    Clock, CreditSource, DefaultIssuer, ExclusivityLock, PoolAdapter, RateSource, SystemClock,
};

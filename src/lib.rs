//! Credit-Line Engine Library
//! # Overview
//!
//! Accounting core of an under-collateralized credit-line lending product.
//! Borrowers draw funds from lending pools against a credit score; interest
//! accrues per (pool, score) bucket at a rate supplied by an external rate
//! model, and positions that stay overdue or over their limit can be forced
//! into default.
//!
//! # Architecture
//!
//! - [`types`] - Identifiers, positions, buckets, operations, events, errors
//! - [`config`] - Engine parameters and the score adjustment curve
//! - [`core`] - Business logic components:
//!   - [`core::bucket_ledger`] - Score-bucketed interest accrual per pool
//!   - [`core::position_store`] - Per-(pool, borrower) debt positions
//!   - [`core::limit`] - Borrow-limit caps
//!   - [`core::default_detector`] - Default reason evaluation
//!   - [`core::engine`] - Operation orchestration
//!   - [`core::memory`] - In-memory collaborators
//! - [`io`] - Ledger CSV reading, world files and position output
//! - [`strategy`] - Sync and async ledger replay
//! - [`cli`], [`logging`] - Binary plumbing
//!
//! # Operations
//!
//! - **borrow**: take principal from a pool, within the borrow limit
//! - **repay**: pay accrued interest first, then principal
//! - **repay in full / pay interest**: exact-amount variants of repay
//! - **poke**: refresh bucket indices and rates of one or all pools
//! - **poke borrow limit timer**: start or stop the over-limit timer
//! - **update credit score**: move positions to the bucket of their current score
//! - **enter default**: close every position of a defaulting borrower and
//!   issue debt claims

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use crate::config::{AdjustmentCurve, CurvePoint, EngineConfig};
pub use crate::core::{Collaborators, CreditLineEngine, InMemoryWorld};
pub use io::write_positions_csv;
pub use types::{
    BorrowerId, CreditError, CreditEvent, LedgerEntry, Operation, PoolId, Position,
    PositionSummary, Score, Timestamp,
};

//! In-memory collaborator implementations
//!
//! This module provides thread-safe, shared-handle implementations of every
//! collaborator trait the engine consumes, so the engine can be driven
//! without any external system (ledger replay, tests, benchmarks).
//!
//! # Architecture
//!
//! - **RateTable**: per-pool base rate with per-(pool, score) overrides
//! - **InMemoryCreditOracle**: settable credit reports
//! - **InMemoryPools**: pool values and cash balances
//! - **LockRegistry**: the cross-product exclusivity lock
//! - **RecordingIssuer**: collects issued debt claims
//! - **ManualClock**: externally advanced time
//! - **InMemoryWorld**: one handle to each of the above, able to build an engine
//!
//! # Shared handles
//!
//! Each component stores its state behind an `Arc` (DashMap for keyed state),
//! so cloning a component yields a second handle onto the same state. The
//! engine holds one handle as `Arc<dyn _>`; the driver keeps another to set
//! scores, move time forward or inspect claims.

pub mod clock;
pub mod issuer;
pub mod lock;
pub mod oracle;
pub mod pools;
pub mod rates;
pub mod world;

pub use clock::ManualClock;
pub use issuer::RecordingIssuer;
pub use lock::LockRegistry;
pub use oracle::InMemoryCreditOracle;
pub use pools::InMemoryPools;
pub use rates::RateTable;
pub use world::InMemoryWorld;

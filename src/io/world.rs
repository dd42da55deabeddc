//! World file loading
//!
//! A world file is the JSON description of everything a replay needs besides
//! the ledger: engine configuration, the admin operator, the pools with their
//! values, cash and rates, and the borrowers with their credit reports.
//!
//! ```json
//! {
//!   "engine": { "min_score": 1 },
//!   "admin": 1,
//!   "pools": [ { "id": 1, "value": "100000", "cash": "100000", "rate_bps": 1000 } ],
//!   "rate_overrides": [ { "pool": 1, "score": 100, "rate_bps": 2000 } ],
//!   "borrowers": [ { "id": 7, "score": 255, "credit_limit": "10000" } ]
//! }
//! ```

use crate::config::EngineConfig;
use crate::core::memory::InMemoryWorld;
use crate::core::CreditLineEngine;
use crate::types::{
    BasisPoints, BorrowerId, CreditError, CreditReport, OperatorId, PoolId, Score, Timestamp,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolSpec {
    pub id: PoolId,
    pub value: Decimal,
    pub cash: Decimal,
    pub rate_bps: BasisPoints,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateOverride {
    pub pool: PoolId,
    pub score: Score,
    pub rate_bps: BasisPoints,
}

/// A borrower known to the credit oracle
///
/// Without `score` the oracle holds no report for the borrower.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BorrowerSpec {
    pub id: BorrowerId,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default)]
    pub credit_limit: Decimal,
    #[serde(default = "default_true")]
    pub eligible: bool,
    #[serde(default = "default_true")]
    pub allowed: bool,
}

fn default_true() -> bool {
    true
}

/// Parsed world file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldFile {
    #[serde(default)]
    pub engine: EngineConfig,
    pub admin: OperatorId,
    /// Clock reading before the first ledger row
    #[serde(default)]
    pub start_time: Timestamp,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub rate_overrides: Vec<RateOverride>,
    #[serde(default)]
    pub borrowers: Vec<BorrowerSpec>,
}

/// Engine and collaborators built from a world file
pub struct LoadedWorld {
    pub world: InMemoryWorld,
    pub engine: CreditLineEngine,
    pub admin: OperatorId,
}

impl WorldFile {
    /// Read and parse a world file
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound`, `IoError`, or `ParseError` for malformed JSON.
    pub fn load(path: &Path) -> Result<Self, CreditError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CreditError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => CreditError::from(e),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, CreditError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Populate in-memory collaborators and build an engine over them
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the engine section fails validation.
    pub fn build(&self) -> Result<LoadedWorld, CreditError> {
        let world = InMemoryWorld::new();
        world.clock.set(self.start_time);

        for pool in &self.pools {
            world.pools.add_pool(pool.id, pool.value, pool.cash);
            world.rates.set_base_rate(pool.id, pool.rate_bps);
        }
        for rate in &self.rate_overrides {
            world.rates.set_score_rate(rate.pool, rate.score, rate.rate_bps);
        }
        for borrower in &self.borrowers {
            if let Some(score) = borrower.score {
                world.oracle.set_report(
                    borrower.id,
                    CreditReport {
                        score,
                        eligible: borrower.eligible,
                        credit_limit: borrower.credit_limit,
                    },
                );
            }
        }

        let mut engine = world.build_engine(self.engine.clone(), self.admin)?;
        for borrower in self.borrowers.iter().filter(|b| b.allowed) {
            engine.set_allowed(self.admin, borrower.id, true)?;
        }

        debug!(
            pools = self.pools.len(),
            borrowers = self.borrowers.len(),
            "world built"
        );
        Ok(LoadedWorld {
            world,
            engine,
            admin: self.admin,
        })
    }
}

//! One handle onto every in-memory collaborator

use super::{
    InMemoryCreditOracle, InMemoryPools, LockRegistry, ManualClock, RateTable, RecordingIssuer,
};
use crate::config::EngineConfig;
use crate::core::engine::{Collaborators, CreditLineEngine};
use crate::types::{CreditError, OperatorId};
use std::sync::Arc;

/// In-memory collaborators sharing state with the engine built from them
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorld {
    pub rates: RateTable,
    pub oracle: InMemoryCreditOracle,
    pub pools: InMemoryPools,
    pub lock: LockRegistry,
    pub issuer: RecordingIssuer,
    pub clock: ManualClock,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine-side handles onto this world's state
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            rates: Arc::new(self.rates.clone()),
            credit: Arc::new(self.oracle.clone()),
            pools: Arc::new(self.pools.clone()),
            lock: Arc::new(self.lock.clone()),
            issuer: Arc::new(self.issuer.clone()),
            clock: Arc::new(self.clock.clone()),
        }
    }

    /// Build an engine wired to this world
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn build_engine(
        &self,
        config: EngineConfig,
        owner: OperatorId,
    ) -> Result<CreditLineEngine, CreditError> {
        CreditLineEngine::new(config, owner, self.collaborators())
    }
}

//! In-memory lending pools
//!
//! Each pool has a reported value (set by the driver, standing in for the
//! pool's own share accounting) and a cash balance that transfers move.
//! `transfer_out` fails when the pool lacks cash; `transfer_in` always
//! succeeds.

use crate::core::traits::PoolAdapter;
use crate::types::{BorrowerId, CollaboratorError, PoolId};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Balance sheet of one in-memory pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolState {
    /// Total value used by the limit caps and utilization
    pub value: Decimal,
    /// Cash available to lend
    pub cash: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPools {
    pools: Arc<DashMap<PoolId, PoolState>>,
}

impl InMemoryPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a supported pool
    pub fn add_pool(&self, pool: PoolId, value: Decimal, cash: Decimal) {
        self.pools.insert(pool, PoolState { value, cash });
    }

    /// Stop supporting a pool
    pub fn remove_pool(&self, pool: PoolId) {
        self.pools.remove(&pool);
    }

    pub fn set_value(&self, pool: PoolId, value: Decimal) {
        if let Some(mut state) = self.pools.get_mut(&pool) {
            state.value = value;
        }
    }

    pub fn state(&self, pool: PoolId) -> Option<PoolState> {
        self.pools.get(&pool).map(|entry| *entry)
    }

    fn unknown(pool: PoolId) -> CollaboratorError {
        CollaboratorError::new("pool adapter", format!("unknown pool {}", pool))
    }
}

impl PoolAdapter for InMemoryPools {
    fn supported_pools(&self) -> Vec<PoolId> {
        let mut pools: Vec<PoolId> = self.pools.iter().map(|entry| *entry.key()).collect();
        pools.sort_unstable();
        pools
    }

    fn is_supported(&self, pool: PoolId) -> bool {
        self.pools.contains_key(&pool)
    }

    fn value(&self, pool: PoolId) -> Result<Decimal, CollaboratorError> {
        self.state(pool)
            .map(|state| state.value)
            .ok_or_else(|| Self::unknown(pool))
    }

    fn liquidity(&self, pool: PoolId) -> Result<Decimal, CollaboratorError> {
        self.state(pool)
            .map(|state| state.cash)
            .ok_or_else(|| Self::unknown(pool))
    }

    fn transfer_out(
        &self,
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.pools.get_mut(&pool).ok_or_else(|| Self::unknown(pool))?;
        if state.cash < amount {
            return Err(CollaboratorError::new(
                "pool adapter",
                format!(
                    "pool {} has {} cash, cannot send {} to borrower {}",
                    pool, state.cash, amount, borrower
                ),
            ));
        }
        state.cash -= amount;
        Ok(())
    }

    fn transfer_in(
        &self,
        pool: PoolId,
        _borrower: BorrowerId,
        amount: Decimal,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.pools.get_mut(&pool).ok_or_else(|| Self::unknown(pool))?;
        state.cash += amount;
        Ok(())
    }
}

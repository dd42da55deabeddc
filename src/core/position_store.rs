//! Position storage module
//!
//! This module provides the `PositionStore` struct which holds every open
//! debt position, keyed by pool and borrower, plus a per-borrower index of
//! the pools where the borrower currently owes principal.
//!
//! The PositionStore is responsible for:
//! - Looking up, inserting and removing positions
//! - Answering "which pools does this borrower owe?" without a full scan
//! - Providing sorted position listings for output

use crate::types::{BorrowerId, PoolId, Position};
use std::collections::{BTreeSet, HashMap};

/// Open positions and the borrower → pools index
///
/// Only positions with nonzero principal are stored. The index always lists
/// exactly the pools a borrower has a stored position in.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    /// Map of (pool, borrower) to position state
    positions: HashMap<(PoolId, BorrowerId), Position>,

    /// Pools each borrower currently owes
    by_borrower: HashMap<BorrowerId, BTreeSet<PoolId>>,
}

impl PositionStore {
    /// Create an empty PositionStore
    pub fn new() -> Self {
        PositionStore {
            positions: HashMap::new(),
            by_borrower: HashMap::new(),
        }
    }

    /// Look up a borrower's position in a pool
    pub fn get(&self, pool: PoolId, borrower: BorrowerId) -> Option<&Position> {
        self.positions.get(&(pool, borrower))
    }

    /// Whether the borrower has an open position in the pool
    pub fn contains(&self, pool: PoolId, borrower: BorrowerId) -> bool {
        self.positions.contains_key(&(pool, borrower))
    }

    /// Store a position, replacing any previous one for the same key
    ///
    /// A position with zero principal is removed instead of stored.
    ///
    /// # Arguments
    ///
    /// * `position` - The position to store
    pub fn put(&mut self, position: Position) {
        if position.principal.is_zero() {
            self.remove(position.pool, position.borrower);
            return;
        }
        self.by_borrower
            .entry(position.borrower)
            .or_default()
            .insert(position.pool);
        self.positions
            .insert((position.pool, position.borrower), position);
    }

    /// Remove a borrower's position in a pool
    ///
    /// # Returns
    ///
    /// The removed position, or `None` if there was none
    pub fn remove(&mut self, pool: PoolId, borrower: BorrowerId) -> Option<Position> {
        let removed = self.positions.remove(&(pool, borrower));
        if let Some(pools) = self.by_borrower.get_mut(&borrower) {
            pools.remove(&pool);
            if pools.is_empty() {
                self.by_borrower.remove(&borrower);
            }
        }
        removed
    }

    /// Pools in which the borrower owes principal, in ascending order
    pub fn pools_of(&self, borrower: BorrowerId) -> Vec<PoolId> {
        self.by_borrower
            .get(&borrower)
            .map(|pools| pools.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of open positions
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Get all positions sorted by pool, then borrower
    ///
    /// Provides deterministic output for CSV generation.
    pub fn all_sorted(&self) -> Vec<&Position> {
        let mut positions: Vec<&Position> = self.positions.values().collect();
        positions.sort_by_key(|p| (p.pool, p.borrower));
        positions
    }
}

//! Table-driven rate source
//!
//! Rates are looked up rather than computed: a base rate per pool and an
//! optional override per (pool, score). Utilization is accepted but not
//! used, so replays stay reproducible regardless of pool size.

use crate::core::traits::RateSource;
use crate::types::{BasisPoints, CollaboratorError, PoolId, Score};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct RateTable {
    base: Arc<DashMap<PoolId, BasisPoints>>,
    overrides: Arc<DashMap<(PoolId, Score), BasisPoints>>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_base_rate(&self, pool: PoolId, rate: BasisPoints) {
        self.base.insert(pool, rate);
    }

    pub fn set_score_rate(&self, pool: PoolId, score: Score, rate: BasisPoints) {
        self.overrides.insert((pool, score), rate);
    }
}

impl RateSource for RateTable {
    fn composite_rate(
        &self,
        pool: PoolId,
        score: Score,
        _utilization: Decimal,
    ) -> Result<BasisPoints, CollaboratorError> {
        if let Some(rate) = self.overrides.get(&(pool, score)) {
            return Ok(*rate);
        }
        self.base
            .get(&pool)
            .map(|rate| *rate)
            .ok_or_else(|| CollaboratorError::new("rate source", format!("no rate for pool {}", pool)))
    }
}

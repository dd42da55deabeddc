//! Score-bucketed interest accrual for one pool
//!
//! Every position in a pool with the same credit score accrues at the same
//! rate, because the rate model only sees (pool, score, utilization). The
//! [`BucketLedger`] therefore keeps one accumulator per active score, the
//! bucket's cumulative interest per unit of principal, and each position only
//! remembers the accumulator value at its last settlement. Accrual for an
//! unbounded number of borrowers costs O(active buckets).
//!
//! # Settlement
//!
//! Whenever a position's principal or bucket changes, its accrued interest is
//! folded into `interest_carried` and its snapshot is moved to the bucket's
//! current index. Moving between buckets or changing principal therefore never
//! creates or destroys interest.
//!
//! # Sparse iteration
//!
//! [`UsedBuckets`] is a 256-bit set of scores with at least one member, so a
//! refresh walks set bits only and never scans all possible scores.

use crate::core::traits::RateSource;
use crate::types::{
    BasisPoints, Bucket, CreditError, PoolId, Position, Score, Timestamp, BPS_DENOMINATOR,
    SECONDS_PER_YEAR,
};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

/// Decimal places kept on cumulative interest indices (10^27 precision)
pub const INDEX_SCALE: u32 = 27;

/// Decimal places kept on interest amounts
pub const AMOUNT_SCALE: u32 = 18;

/// Set of scores with an active bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsedBuckets {
    words: [u64; 4],
}

impl UsedBuckets {
    /// Mark `score` active; returns true if it was not already
    pub fn insert(&mut self, score: Score) -> bool {
        let (word, bit) = Self::slot(score);
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Mark `score` inactive; returns true if it was active
    pub fn remove(&mut self, score: Score) -> bool {
        let (word, bit) = Self::slot(score);
        let present = self.words[word] & bit != 0;
        self.words[word] &= !bit;
        present
    }

    pub fn contains(&self, score: Score) -> bool {
        let (word, bit) = Self::slot(score);
        self.words[word] & bit != 0
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Active scores in ascending order
    pub fn iter(&self) -> UsedBucketsIter {
        UsedBucketsIter {
            words: self.words,
            word: 0,
        }
    }

    fn slot(score: Score) -> (usize, u64) {
        ((score / 64) as usize, 1u64 << (score % 64))
    }
}

/// Iterator over set bits of [`UsedBuckets`]
#[derive(Debug, Clone)]
pub struct UsedBucketsIter {
    words: [u64; 4],
    word: usize,
}

impl Iterator for UsedBucketsIter {
    type Item = Score;

    fn next(&mut self) -> Option<Self::Item> {
        while self.word < self.words.len() {
            let bits = self.words[self.word];
            if bits == 0 {
                self.word += 1;
                continue;
            }
            let bit = bits.trailing_zeros() as usize;
            self.words[self.word] = bits & (bits - 1);
            return Some((self.word * 64 + bit) as Score);
        }
        None
    }
}

/// Interest per unit of principal accrued at `rate` over `elapsed` seconds
fn index_growth(rate: BasisPoints, elapsed: Timestamp) -> Result<Decimal, CreditError> {
    if rate == 0 || elapsed == 0 {
        return Ok(Decimal::ZERO);
    }
    let year_bps = Decimal::from(BPS_DENOMINATOR * SECONDS_PER_YEAR);
    Decimal::from(rate)
        .checked_mul(Decimal::from(elapsed))
        .and_then(|n| n.checked_div(year_bps))
        .map(|g| g.round_dp_with_strategy(INDEX_SCALE, RoundingStrategy::ToZero))
        .ok_or_else(|| CreditError::arithmetic_overflow("index_growth"))
}

/// Per-pool bucket state and pool aggregates
#[derive(Debug, Clone)]
pub struct BucketLedger {
    pool: PoolId,
    buckets: HashMap<Score, Bucket>,
    used: UsedBuckets,
    /// Sum of principal across active buckets
    total_borrowed: Decimal,
    /// Interest ever paid into this pool
    total_paid_interest: Decimal,
}

impl BucketLedger {
    pub fn new(pool: PoolId) -> Self {
        BucketLedger {
            pool,
            buckets: HashMap::new(),
            used: UsedBuckets::default(),
            total_borrowed: Decimal::ZERO,
            total_paid_interest: Decimal::ZERO,
        }
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }

    pub fn bucket(&self, score: Score) -> Option<&Bucket> {
        self.buckets.get(&score)
    }

    pub fn used_buckets(&self) -> &UsedBuckets {
        &self.used
    }

    pub fn total_borrowed(&self) -> Decimal {
        self.total_borrowed
    }

    pub fn total_paid_interest(&self) -> Decimal {
        self.total_paid_interest
    }

    /// Accrue every active bucket up to `now`, then re-price it
    ///
    /// Elapsed time is charged at the rate stored by the previous refresh; the
    /// rate source is then asked for the rate that applies from `now` on.
    /// All new values are computed before any bucket is written, so a failing
    /// rate source leaves the ledger untouched.
    ///
    /// # Returns
    ///
    /// The number of active buckets refreshed
    pub fn refresh(
        &mut self,
        now: Timestamp,
        rates: &dyn RateSource,
        utilization: Decimal,
    ) -> Result<usize, CreditError> {
        let mut updates = Vec::with_capacity(self.used.len());
        for score in self.used.iter() {
            let index = self.current_index(score, now)?;
            let rate = rates.composite_rate(self.pool, score, utilization)?;
            updates.push((score, index, rate));
        }

        for (score, index, rate) in &updates {
            if let Some(bucket) = self.buckets.get_mut(score) {
                bucket.cumulative_interest_per_share = *index;
                bucket.last_update_time = bucket.last_update_time.max(now);
                bucket.rate = *rate;
            }
        }

        Ok(updates.len())
    }

    /// Bucket index at `now` as a refresh would compute it, without writing
    ///
    /// Inactive scores read as zero.
    pub fn current_index(&self, score: Score, now: Timestamp) -> Result<Decimal, CreditError> {
        let Some(bucket) = self.buckets.get(&score) else {
            return Ok(Decimal::ZERO);
        };
        let elapsed = now.saturating_sub(bucket.last_update_time);
        let growth = index_growth(bucket.rate, elapsed)?;
        bucket
            .cumulative_interest_per_share
            .checked_add(growth)
            .ok_or_else(|| CreditError::arithmetic_overflow("current_index"))
    }

    /// Interest owed by `position` at `now`
    pub fn accrued_interest(
        &self,
        position: &Position,
        now: Timestamp,
    ) -> Result<Decimal, CreditError> {
        let index = self.current_index(position.bucket_score, now)?;
        let delta = (index - position.interest_index_snapshot).max(Decimal::ZERO);
        position
            .principal
            .checked_mul(delta)
            .map(|i| i.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToZero))
            .and_then(|i| i.checked_add(position.interest_carried))
            .ok_or_else(|| CreditError::arithmetic_overflow("accrued_interest"))
    }

    /// Principal plus accrued interest of `position` at `now`
    pub fn debt(&self, position: &Position, now: Timestamp) -> Result<Decimal, CreditError> {
        position
            .principal
            .checked_add(self.accrued_interest(position, now)?)
            .ok_or_else(|| CreditError::arithmetic_overflow("debt"))
    }

    /// Fold accrued interest into the carry and snapshot the current index
    ///
    /// # Returns
    ///
    /// The position's accrued interest, unchanged by the settlement
    pub fn settle(&self, position: &mut Position, now: Timestamp) -> Result<Decimal, CreditError> {
        let accrued = self.accrued_interest(position, now)?;
        position.interest_carried = accrued;
        position.interest_index_snapshot = self.current_index(position.bucket_score, now)?;
        Ok(accrued)
    }

    /// Add principal to a position and to its bucket
    ///
    /// A position going from zero to nonzero principal joins its bucket,
    /// opening the bucket if no other member exists.
    pub fn add_principal(
        &mut self,
        position: &mut Position,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<(), CreditError> {
        let joining = position.principal.is_zero();
        if !joining {
            self.settle(position, now)?;
        }

        let new_principal = position
            .principal
            .checked_add(amount)
            .ok_or_else(|| CreditError::arithmetic_overflow("add_principal"))?;
        let new_total = self
            .total_borrowed
            .checked_add(amount)
            .ok_or_else(|| CreditError::arithmetic_overflow("add_principal"))?;

        let bucket = self
            .buckets
            .entry(position.bucket_score)
            .or_insert_with(|| Bucket::new(now));
        bucket.total_borrowed += amount;
        if joining {
            bucket.borrowers_count += 1;
        }
        self.used.insert(position.bucket_score);

        if joining {
            position.interest_index_snapshot = self.current_index(position.bucket_score, now)?;
        }
        position.principal = new_principal;
        self.total_borrowed = new_total;
        Ok(())
    }

    /// Remove principal from a position and from its bucket
    ///
    /// A position reaching zero principal leaves its bucket; the bucket is
    /// dropped once its last member leaves.
    pub fn remove_principal(
        &mut self,
        position: &mut Position,
        amount: Decimal,
        now: Timestamp,
    ) -> Result<(), CreditError> {
        if amount > position.principal {
            return Err(CreditError::arithmetic_overflow("remove_principal"));
        }
        self.settle(position, now)?;

        let score = position.bucket_score;
        let leaving = amount == position.principal;
        if let Some(bucket) = self.buckets.get_mut(&score) {
            bucket.total_borrowed = (bucket.total_borrowed - amount).max(Decimal::ZERO);
            if leaving {
                bucket.borrowers_count = bucket.borrowers_count.saturating_sub(1);
            }
            if bucket.borrowers_count == 0 {
                self.buckets.remove(&score);
                self.used.remove(score);
            }
        }

        position.principal -= amount;
        self.total_borrowed = (self.total_borrowed - amount).max(Decimal::ZERO);
        Ok(())
    }

    /// Move a position to the bucket for `new_score`
    ///
    /// The position is settled against its old bucket first and snapshotted
    /// at the new bucket's current index, so accrued interest is identical
    /// immediately before and after the move.
    pub fn move_bucket(
        &mut self,
        position: &mut Position,
        new_score: Score,
        now: Timestamp,
    ) -> Result<(), CreditError> {
        if position.bucket_score == new_score {
            return Ok(());
        }
        let principal = position.principal;
        if principal.is_zero() {
            position.bucket_score = new_score;
            return Ok(());
        }

        let carried = self.settle(position, now)?;
        self.remove_principal(position, principal, now)?;
        position.bucket_score = new_score;
        self.add_principal(position, principal, now)?;
        position.interest_carried = carried;
        Ok(())
    }

    /// Count interest paid into the pool
    pub fn record_interest_paid(&mut self, amount: Decimal) -> Result<(), CreditError> {
        self.total_paid_interest = self
            .total_paid_interest
            .checked_add(amount)
            .ok_or_else(|| CreditError::arithmetic_overflow("record_interest_paid"))?;
        Ok(())
    }
}

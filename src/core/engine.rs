//! Credit-line engine
//!
//! This module provides the CreditLineEngine that orchestrates credit-line
//! operations by coordinating the BucketLedger, PositionStore, limit and
//! default logic with the injected collaborators.
//!
//! The engine enforces business rules such as:
//! - Borrow preconditions (allow list, eligibility, minimum score, overdue
//!   interest, exclusivity lock, borrow limit)
//! - Interest-first repayment and repayment deadlines
//! - Over-limit timer tracking and forced default
//!
//! # Atomicity
//!
//! Every operation validates with pure reads, then stages its changes on
//! copies of the touched ledgers and positions, then performs external
//! transfers, and only then commits the staged copies. A failing operation
//! leaves the engine untouched.

use crate::config::EngineConfig;
use crate::core::access::{AccessControl, Capability};
use crate::core::bucket_ledger::BucketLedger;
use crate::core::default_detector::DefaultDetector;
use crate::core::limit::{BorrowCapacity, LimitCalculator, LimitInputs};
use crate::core::position_store::PositionStore;
use crate::core::traits::{
    Clock, CreditSource, DefaultIssuer, ExclusivityLock, PoolAdapter, RateSource,
};
use crate::types::{
    BasisPoints, BorrowerId, Bucket, CreditError, CreditEvent, CreditReport, DebtClaim,
    Operation, OperatorId, PoolId, Position, PositionSummary, ProductId, Score, Timestamp,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Handles to every external collaborator
#[derive(Clone)]
pub struct Collaborators {
    pub rates: Arc<dyn RateSource>,
    pub credit: Arc<dyn CreditSource>,
    pub pools: Arc<dyn PoolAdapter>,
    pub lock: Arc<dyn ExclusivityLock>,
    pub issuer: Arc<dyn DefaultIssuer>,
    pub clock: Arc<dyn Clock>,
}

/// Changes prepared by an operation, applied all at once on commit
#[derive(Default)]
struct Staged {
    ledgers: Vec<BucketLedger>,
    positions: Vec<Position>,
    events: Vec<CreditEvent>,
}

/// Credit-line accounting engine
///
/// Single-writer state machine: callers serialize operations externally and
/// each operation runs to completion or fails without effect.
pub struct CreditLineEngine {
    collaborators: Collaborators,
    config: EngineConfig,
    access: AccessControl,
    ledgers: HashMap<PoolId, BucketLedger>,
    positions: PositionStore,
    allowed: HashSet<BorrowerId>,
    events: Vec<CreditEvent>,
    /// Clock reading of the last committed operation
    last_mutation: Timestamp,
}

impl CreditLineEngine {
    /// Create a new CreditLineEngine
    ///
    /// # Arguments
    ///
    /// * `config` - Engine parameters, validated here
    /// * `owner` - Operator holding every admin capability
    /// * `collaborators` - External collaborators
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(
        config: EngineConfig,
        owner: OperatorId,
        collaborators: Collaborators,
    ) -> Result<Self, CreditError> {
        config.validate()?;
        Ok(CreditLineEngine {
            collaborators,
            config,
            access: AccessControl::new(owner),
            ledgers: HashMap::new(),
            positions: PositionStore::new(),
            allowed: HashSet::new(),
            events: Vec::new(),
            last_mutation: 0,
        })
    }

    /// Apply a single transaction-log operation
    ///
    /// Routes the operation to the matching handler.
    ///
    /// # Errors
    ///
    /// Returns whatever the handler returns; see each operation.
    pub fn apply(&mut self, op: Operation) -> Result<(), CreditError> {
        match op {
            Operation::Borrow {
                pool,
                borrower,
                amount,
            } => self.borrow(pool, borrower, amount),
            Operation::Repay {
                pool,
                borrower,
                amount,
            } => self.repay(pool, borrower, amount),
            Operation::RepayInFull { pool, borrower } => self.repay_in_full(pool, borrower),
            Operation::PayInterest { pool, borrower } => self.pay_interest(pool, borrower),
            Operation::Poke { pool } => self.poke(pool),
            Operation::PokeAll => self.poke_all(),
            Operation::PokeTimer { pool, borrower } => {
                self.poke_borrow_limit_timer(pool, borrower)
            }
            Operation::UpdateScore { pool, borrower } => self.update_credit_score(pool, borrower),
            Operation::UpdateAllScores { borrower } => self.update_all_credit_scores(borrower),
            Operation::Default { operator, borrower } => self.enter_default(operator, borrower),
        }
    }

    /// Borrow `amount` from `pool`
    ///
    /// On success the pool is refreshed, the position is rebucketed to the
    /// borrower's current score if needed, principal is added, the
    /// exclusivity lock is taken and funds leave the pool.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - `InvalidAmount` if `amount` is not positive
    /// - `NotAllowed` if the borrower is not on the allow list
    /// - `PoolNotSupported` if the pool adapter does not support `pool`
    /// - `ScoreNotSet` if the oracle has no report for the borrower
    /// - `IneligibleBorrower` if the oracle reports the borrower ineligible
    /// - `BelowMinimumScore` if the score is under the configured minimum
    /// - `InterestOverdue` if this pool's interest deadline has passed
    /// - `LockHeldByOther` if another product (or the ban) holds the lock
    /// - `ExceedsBorrowLimit` if `amount` is above the additional limit
    /// - `InsufficientLiquidity` if the pool cannot fund `amount` right now
    pub fn borrow(
        &mut self,
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    ) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(pool, borrower, %amount, now, "borrow");

        if amount <= Decimal::ZERO {
            return Err(CreditError::invalid_amount(amount));
        }
        if !self.allowed.contains(&borrower) {
            return Err(CreditError::not_allowed(borrower));
        }
        if !self.collaborators.pools.is_supported(pool) {
            return Err(CreditError::pool_not_supported(pool));
        }
        let report = self
            .collaborators
            .credit
            .credit_report(borrower)?
            .ok_or_else(|| CreditError::score_not_set(borrower))?;
        if !report.eligible {
            return Err(CreditError::ineligible(borrower));
        }
        if report.score < self.config.min_score {
            return Err(CreditError::below_minimum_score(
                borrower,
                report.score,
                self.config.min_score,
            ));
        }
        let existing = self.positions.get(pool, borrower).cloned();
        if let Some(position) = &existing {
            if position.is_interest_overdue(now) {
                return Err(CreditError::interest_overdue(
                    pool,
                    borrower,
                    position.next_interest_deadline,
                ));
            }
        }
        let product = self.config.product_id;
        let holder = self.collaborators.lock.holder_of(borrower)?;
        if let Some(holder) = holder {
            if !holder.is_product(product) {
                return Err(CreditError::lock_held_by_other(borrower, holder));
            }
        }
        let capacity = self.capacity_at(pool, borrower, Some(&report), now)?;
        if amount > capacity.additional() {
            return Err(CreditError::exceeds_borrow_limit(
                pool,
                borrower,
                capacity.additional(),
                amount,
            ));
        }
        let available = self.collaborators.pools.liquidity(pool)?;
        if amount > available {
            return Err(CreditError::insufficient_liquidity(
                pool, borrower, available, amount,
            ));
        }

        let mut staged = Staged::default();
        let mut ledger = self.staged_ledger(pool);
        self.refresh_ledger(&mut ledger, now)?;

        let mut position = match existing {
            Some(position) => position,
            None => {
                let mut position = Position::new(pool, borrower, report.score, Decimal::ZERO);
                position.next_interest_deadline = self.deadline_after(now)?;
                position
            }
        };
        if position.bucket_score != report.score {
            let from = position.bucket_score;
            ledger.move_bucket(&mut position, report.score, now)?;
            staged.events.push(CreditEvent::Rebucketed {
                pool,
                borrower,
                from,
                to: report.score,
            });
        }
        ledger.add_principal(&mut position, amount, now)?;
        self.refresh_ledger(&mut ledger, now)?;

        staged
            .events
            .extend(over_limit_transition(&mut position, false, now));
        staged.events.push(CreditEvent::BorrowRecorded {
            pool,
            borrower,
            amount,
        });
        staged.ledgers.push(ledger);
        staged.positions.push(position);

        self.collaborators.lock.try_acquire(borrower, product)?;
        if let Err(error) = self.collaborators.pools.transfer_out(pool, borrower, amount) {
            if holder.is_none() {
                self.collaborators.lock.release(borrower, product)?;
            }
            return Err(error.into());
        }

        self.commit(now, staged);
        Ok(())
    }

    /// Repay `amount` to `pool`, interest first
    ///
    /// Clearing all accrued interest moves the interest deadline to one
    /// repayment period from now; a partial interest payment leaves both the
    /// deadline and the principal untouched. The exclusivity lock is released
    /// once the borrower owes nothing in any pool.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `NoOpenPosition` if the borrower owes nothing in `pool`
    /// - `ExceedsDebt` if `amount` is above principal plus interest
    pub fn repay(
        &mut self,
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    ) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(pool, borrower, %amount, now, "repay");
        self.repay_at(now, pool, borrower, amount)
    }

    /// Repay the exact outstanding debt in `pool`, closing the position
    ///
    /// # Errors
    ///
    /// Returns `NoOpenPosition` if the borrower owes nothing in `pool`.
    pub fn repay_in_full(&mut self, pool: PoolId, borrower: BorrowerId) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(pool, borrower, now, "repay in full");
        if !self.positions.contains(pool, borrower) {
            return Err(CreditError::no_open_position(Some(pool), borrower));
        }
        let debt = self.debt_at(pool, borrower, now)?;
        self.repay_at(now, pool, borrower, debt)
    }

    fn repay_at(
        &mut self,
        now: Timestamp,
        pool: PoolId,
        borrower: BorrowerId,
        amount: Decimal,
    ) -> Result<(), CreditError> {
        if amount <= Decimal::ZERO {
            return Err(CreditError::invalid_amount(amount));
        }
        let mut position = self
            .positions
            .get(pool, borrower)
            .cloned()
            .ok_or_else(|| CreditError::no_open_position(Some(pool), borrower))?;
        let report = self.collaborators.credit.credit_report(borrower)?;
        let capacity = self.capacity_at(pool, borrower, report.as_ref(), now)?;

        let mut ledger = self.staged_ledger(pool);
        self.refresh_ledger(&mut ledger, now)?;
        let interest = ledger.settle(&mut position, now)?;
        let debt = position
            .principal
            .checked_add(interest)
            .ok_or_else(|| CreditError::arithmetic_overflow("repay"))?;
        if amount > debt {
            return Err(CreditError::exceeds_debt(pool, borrower, debt, amount));
        }

        let interest_paid = amount.min(interest);
        let principal_paid = amount - interest_paid;

        position.interest_carried = interest - interest_paid;
        position.total_interest_paid = position
            .total_interest_paid
            .checked_add(interest_paid)
            .ok_or_else(|| CreditError::arithmetic_overflow("repay"))?;
        ledger.record_interest_paid(interest_paid)?;
        if interest_paid == interest {
            position.next_interest_deadline = self.deadline_after(now)?;
        }
        if principal_paid > Decimal::ZERO {
            ledger.remove_principal(&mut position, principal_paid, now)?;
        }
        self.refresh_ledger(&mut ledger, now)?;

        let mut staged = Staged::default();
        if position.principal.is_zero() {
            position.next_interest_deadline = 0;
            position.over_limit_since = 0;
        } else {
            let remaining = BorrowCapacity {
                ceiling: capacity.ceiling,
                debt: position.principal + position.interest_carried,
            };
            staged.events.extend(over_limit_transition(
                &mut position,
                remaining.is_exceeded(),
                now,
            ));
        }
        staged.events.push(CreditEvent::Repaid {
            pool,
            borrower,
            principal: principal_paid,
            interest: interest_paid,
        });
        let release = self.lock_to_release(pool, borrower, &position)?;
        staged.ledgers.push(ledger);
        staged.positions.push(position);

        if let Some(product) = release {
            self.collaborators.lock.release(borrower, product)?;
        }
        if let Err(error) = self.collaborators.pools.transfer_in(pool, borrower, amount) {
            if let Some(product) = release {
                self.collaborators.lock.try_acquire(borrower, product)?;
            }
            return Err(error.into());
        }
        self.commit(now, staged);
        Ok(())
    }

    /// Pay exactly the interest accrued in `pool`
    ///
    /// Resets the interest deadline. Calling it again immediately pays zero.
    ///
    /// # Errors
    ///
    /// Returns `NoOpenPosition` if the borrower owes nothing in `pool`.
    pub fn pay_interest(&mut self, pool: PoolId, borrower: BorrowerId) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(pool, borrower, now, "pay interest");

        let mut position = self
            .positions
            .get(pool, borrower)
            .cloned()
            .ok_or_else(|| CreditError::no_open_position(Some(pool), borrower))?;
        let report = self.collaborators.credit.credit_report(borrower)?;
        let capacity = self.capacity_at(pool, borrower, report.as_ref(), now)?;

        let mut ledger = self.staged_ledger(pool);
        self.refresh_ledger(&mut ledger, now)?;
        let interest = ledger.settle(&mut position, now)?;

        position.interest_carried = Decimal::ZERO;
        position.total_interest_paid = position
            .total_interest_paid
            .checked_add(interest)
            .ok_or_else(|| CreditError::arithmetic_overflow("pay_interest"))?;
        ledger.record_interest_paid(interest)?;
        position.next_interest_deadline = self.deadline_after(now)?;

        let mut staged = Staged::default();
        let remaining = BorrowCapacity {
            ceiling: capacity.ceiling,
            debt: position.principal,
        };
        staged.events.extend(over_limit_transition(
            &mut position,
            remaining.is_exceeded(),
            now,
        ));
        staged.events.push(CreditEvent::InterestPaid {
            pool,
            borrower,
            amount: interest,
        });
        staged.ledgers.push(ledger);
        staged.positions.push(position);

        if interest > Decimal::ZERO {
            self.collaborators.pools.transfer_in(pool, borrower, interest)?;
        }
        self.commit(now, staged);
        Ok(())
    }

    /// Refresh every active bucket of `pool`
    ///
    /// # Errors
    ///
    /// Returns `PoolNotSupported` if the pool adapter does not support `pool`.
    pub fn poke(&mut self, pool: PoolId) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(pool, now, "poke");
        if !self.collaborators.pools.is_supported(pool) {
            return Err(CreditError::pool_not_supported(pool));
        }
        let mut staged = Staged::default();
        self.stage_refresh(&mut staged, pool, now)?;
        self.commit(now, staged);
        Ok(())
    }

    /// Refresh every supported pool
    pub fn poke_all(&mut self) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(now, "poke all");
        let mut staged = Staged::default();
        for pool in self.collaborators.pools.supported_pools() {
            self.stage_refresh(&mut staged, pool, now)?;
        }
        self.commit(now, staged);
        Ok(())
    }

    /// Start or stop the over-limit timer of a position
    ///
    /// Sets `over_limit_since` to now when the position is over its limit and
    /// the timer is not running; clears it when the position is back within
    /// its limit. A running timer is never moved forward. No-op without a
    /// position.
    pub fn poke_borrow_limit_timer(
        &mut self,
        pool: PoolId,
        borrower: BorrowerId,
    ) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(pool, borrower, now, "poke borrow limit timer");

        let Some(mut position) = self.positions.get(pool, borrower).cloned() else {
            return Ok(());
        };
        let report = self.collaborators.credit.credit_report(borrower)?;
        let capacity = self.capacity_at(pool, borrower, report.as_ref(), now)?;

        let mut staged = Staged::default();
        staged.events.extend(over_limit_transition(
            &mut position,
            capacity.is_exceeded(),
            now,
        ));
        staged.positions.push(position);
        self.commit(now, staged);
        Ok(())
    }

    /// Rebucket a position if the oracle score changed
    ///
    /// No-op if the borrower has no position in `pool`.
    ///
    /// # Errors
    ///
    /// Returns `ScoreNotSet` if the oracle has no report for the borrower.
    pub fn update_credit_score(
        &mut self,
        pool: PoolId,
        borrower: BorrowerId,
    ) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(pool, borrower, now, "update credit score");

        let report = self
            .collaborators
            .credit
            .credit_report(borrower)?
            .ok_or_else(|| CreditError::score_not_set(borrower))?;
        let Some(position) = self.positions.get(pool, borrower) else {
            return Ok(());
        };
        if position.bucket_score == report.score {
            return Ok(());
        }

        let mut staged = Staged::default();
        self.stage_rebucket(&mut staged, position, report.score, now)?;
        self.commit(now, staged);
        Ok(())
    }

    /// Rebucket every open position of a borrower
    ///
    /// # Errors
    ///
    /// Returns `ScoreNotSet` if the oracle has no report for the borrower.
    pub fn update_all_credit_scores(&mut self, borrower: BorrowerId) -> Result<(), CreditError> {
        let now = self.begin()?;
        debug!(borrower, now, "update all credit scores");

        let report = self
            .collaborators
            .credit
            .credit_report(borrower)?
            .ok_or_else(|| CreditError::score_not_set(borrower))?;

        let mut staged = Staged::default();
        for pool in self.positions.pools_of(borrower) {
            let Some(position) = self.positions.get(pool, borrower) else {
                continue;
            };
            if position.bucket_score != report.score {
                self.stage_rebucket(&mut staged, position, report.score, now)?;
            }
        }
        self.commit(now, staged);
        Ok(())
    }

    /// Force a borrower into default
    ///
    /// Closes every open position, issues one debt claim per pool for the
    /// full debt, and bans the borrower's exclusivity lock. Claims are issued
    /// as one batch before anything is committed, and withdrawn again if the
    /// ban fails.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if `operator` lacks `EnforceDefault`
    /// - `NoOpenPosition` if the borrower owes nothing anywhere
    /// - `NoDefaultReason` if no default condition holds
    pub fn enter_default(
        &mut self,
        operator: OperatorId,
        borrower: BorrowerId,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::EnforceDefault)?;
        let now = self.begin()?;
        debug!(operator, borrower, now, "enter default");

        let pools = self.positions.pools_of(borrower);
        if pools.is_empty() {
            return Err(CreditError::no_open_position(None, borrower));
        }
        let report = self.collaborators.credit.credit_report(borrower)?;
        let open: Vec<&Position> = pools
            .iter()
            .filter_map(|pool| self.positions.get(*pool, borrower))
            .collect();
        let reason = DefaultDetector::new(&self.config)
            .reason(
                self.allowed.contains(&borrower),
                report.as_ref(),
                &open,
                now,
            )
            .ok_or_else(|| CreditError::no_default_reason(borrower))?;

        let mut staged = Staged::default();
        let mut claims = Vec::with_capacity(open.len());
        for position in open {
            let mut position = position.clone();
            let mut ledger = self.staged_ledger(position.pool);
            self.refresh_ledger(&mut ledger, now)?;
            let debt = ledger.debt(&position, now)?;
            let principal = position.principal;
            ledger.remove_principal(&mut position, principal, now)?;
            position.interest_carried = Decimal::ZERO;
            self.refresh_ledger(&mut ledger, now)?;

            claims.push(DebtClaim {
                pool: position.pool,
                borrower,
                amount: debt,
            });
            staged.ledgers.push(ledger);
            staged.positions.push(position);
        }

        self.collaborators.issuer.issue_claims(&claims)?;
        if let Err(error) = self.collaborators.lock.ban(borrower) {
            self.collaborators.issuer.withdraw_claims(&claims)?;
            return Err(error.into());
        }

        staged.events.push(CreditEvent::EnteredDefault {
            borrower,
            reason,
            claims,
        });
        self.commit(now, staged);
        Ok(())
    }

    /// Replace the rate source
    pub fn set_rate_source(
        &mut self,
        operator: OperatorId,
        rates: Arc<dyn RateSource>,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageCollaborators)?;
        self.collaborators.rates = rates;
        info!(operator, "rate source replaced");
        Ok(())
    }

    /// Replace the credit oracle
    pub fn set_credit_source(
        &mut self,
        operator: OperatorId,
        credit: Arc<dyn CreditSource>,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageCollaborators)?;
        self.collaborators.credit = credit;
        info!(operator, "credit source replaced");
        Ok(())
    }

    /// Replace the pool adapter
    pub fn set_pool_adapter(
        &mut self,
        operator: OperatorId,
        pools: Arc<dyn PoolAdapter>,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageCollaborators)?;
        self.collaborators.pools = pools;
        info!(operator, "pool adapter replaced");
        Ok(())
    }

    /// Replace the exclusivity lock
    pub fn set_exclusivity_lock(
        &mut self,
        operator: OperatorId,
        lock: Arc<dyn ExclusivityLock>,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageCollaborators)?;
        self.collaborators.lock = lock;
        info!(operator, "exclusivity lock replaced");
        Ok(())
    }

    /// Replace the default claim issuer
    pub fn set_default_issuer(
        &mut self,
        operator: OperatorId,
        issuer: Arc<dyn DefaultIssuer>,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageCollaborators)?;
        self.collaborators.issuer = issuer;
        info!(operator, "default issuer replaced");
        Ok(())
    }

    /// Add a borrower to, or remove it from, the allow list
    pub fn set_allowed(
        &mut self,
        operator: OperatorId,
        borrower: BorrowerId,
        allowed: bool,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageBorrowers)?;
        if allowed {
            self.allowed.insert(borrower);
        } else {
            self.allowed.remove(&borrower);
        }
        info!(operator, borrower, allowed, "allow list updated");
        Ok(())
    }

    /// Replace the engine configuration
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` without `ManageConfig`, or `InvalidConfig`.
    pub fn set_config(
        &mut self,
        operator: OperatorId,
        config: EngineConfig,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageConfig)?;
        config.validate()?;
        self.config = config;
        info!(operator, "configuration replaced");
        Ok(())
    }

    /// Give `grantee` a capability
    pub fn grant(
        &mut self,
        operator: OperatorId,
        grantee: OperatorId,
        capability: Capability,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageAccess)?;
        self.access.grant(grantee, capability);
        info!(operator, grantee, %capability, "capability granted");
        Ok(())
    }

    /// Take a capability away from `grantee`; the owner keeps everything
    pub fn revoke(
        &mut self,
        operator: OperatorId,
        grantee: OperatorId,
        capability: Capability,
    ) -> Result<(), CreditError> {
        self.access.require(operator, Capability::ManageAccess)?;
        self.access.revoke(grantee, capability);
        info!(operator, grantee, %capability, "capability revoked");
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn is_allowed(&self, borrower: BorrowerId) -> bool {
        self.allowed.contains(&borrower)
    }

    pub fn position(&self, pool: PoolId, borrower: BorrowerId) -> Option<&Position> {
        self.positions.get(pool, borrower)
    }

    /// All open positions, sorted by pool then borrower
    pub fn positions(&self) -> Vec<&Position> {
        self.positions.all_sorted()
    }

    pub fn ledger(&self, pool: PoolId) -> Option<&BucketLedger> {
        self.ledgers.get(&pool)
    }

    pub fn bucket(&self, pool: PoolId, score: Score) -> Option<&Bucket> {
        self.ledgers.get(&pool).and_then(|ledger| ledger.bucket(score))
    }

    /// Interest accrued by a position now (zero without a position)
    pub fn interest(&self, pool: PoolId, borrower: BorrowerId) -> Result<Decimal, CreditError> {
        let now = self.collaborators.clock.now();
        match (self.ledgers.get(&pool), self.positions.get(pool, borrower)) {
            (Some(ledger), Some(position)) => ledger.accrued_interest(position, now),
            _ => Ok(Decimal::ZERO),
        }
    }

    /// Principal plus interest owed in one pool now
    pub fn debt(&self, pool: PoolId, borrower: BorrowerId) -> Result<Decimal, CreditError> {
        self.debt_at(pool, borrower, self.collaborators.clock.now())
    }

    /// Principal plus interest owed across every pool now
    pub fn total_borrowed(&self, borrower: BorrowerId) -> Result<Decimal, CreditError> {
        let now = self.collaborators.clock.now();
        let mut total = Decimal::ZERO;
        for pool in self.positions.pools_of(borrower) {
            total = total
                .checked_add(self.debt_at(pool, borrower, now)?)
                .ok_or_else(|| CreditError::arithmetic_overflow("total_borrowed"))?;
        }
        Ok(total)
    }

    /// Principal drawn from `pool` by all borrowers
    pub fn pool_total_borrowed(&self, pool: PoolId) -> Decimal {
        self.ledgers
            .get(&pool)
            .map(BucketLedger::total_borrowed)
            .unwrap_or_default()
    }

    /// Additional amount the borrower may take from `pool` now
    pub fn borrow_limit(&self, pool: PoolId, borrower: BorrowerId) -> Result<Decimal, CreditError> {
        Ok(self.borrow_capacity(pool, borrower)?.additional())
    }

    /// Ceiling and current debt for (pool, borrower) now
    pub fn borrow_capacity(
        &self,
        pool: PoolId,
        borrower: BorrowerId,
    ) -> Result<BorrowCapacity, CreditError> {
        let now = self.collaborators.clock.now();
        let report = self.collaborators.credit.credit_report(borrower)?;
        self.capacity_at(pool, borrower, report.as_ref(), now)
    }

    /// Credit limit scaled by the adjustment curve
    pub fn single_credit_value(&self, borrower: BorrowerId) -> Result<Decimal, CreditError> {
        let report = self.collaborators.credit.credit_report(borrower)?;
        LimitCalculator::new(&self.config).single_credit_value(report.as_ref())
    }

    /// Single-borrower cap of one pool
    pub fn pool_credit_value(&self, pool: PoolId) -> Result<Decimal, CreditError> {
        LimitCalculator::new(&self.config).pool_credit_value(self.pool_value(pool)?)
    }

    /// Aggregate room left across every supported pool
    pub fn aggregate_credit_value(&self) -> Result<Decimal, CreditError> {
        let (value, principal) = self.supported_totals()?;
        LimitCalculator::new(&self.config).aggregate_credit_value(value, principal)
    }

    /// Rate the borrower's position in `pool` would be priced at now
    ///
    /// Uses the position's bucket score, or the oracle score without a
    /// position.
    ///
    /// # Errors
    ///
    /// Returns `ScoreNotSet` without a position or a report.
    pub fn current_rate(
        &self,
        pool: PoolId,
        borrower: BorrowerId,
    ) -> Result<BasisPoints, CreditError> {
        let score = match self.positions.get(pool, borrower) {
            Some(position) => position.bucket_score,
            None => {
                self.collaborators
                    .credit
                    .credit_report(borrower)?
                    .ok_or_else(|| CreditError::score_not_set(borrower))?
                    .score
            }
        };
        let utilization = self.utilization(pool)?;
        Ok(self
            .collaborators
            .rates
            .composite_rate(pool, score, utilization)?)
    }

    /// Pool principal over pool value, within [0, 1]
    pub fn utilization(&self, pool: PoolId) -> Result<Decimal, CreditError> {
        self.utilization_of(pool, self.pool_total_borrowed(pool))
    }

    /// Every open position with interest evaluated now
    pub fn position_summaries(&self) -> Result<Vec<PositionSummary>, CreditError> {
        let now = self.collaborators.clock.now();
        self.positions
            .all_sorted()
            .into_iter()
            .map(|position| -> Result<PositionSummary, CreditError> {
                let interest = match self.ledgers.get(&position.pool) {
                    Some(ledger) => ledger.accrued_interest(position, now)?,
                    None => Decimal::ZERO,
                };
                Ok(PositionSummary {
                    pool: position.pool,
                    borrower: position.borrower,
                    principal: position.principal,
                    interest,
                    score: position.bucket_score,
                    next_interest_deadline: position.next_interest_deadline,
                    over_limit_since: position.over_limit_since,
                })
            })
            .collect()
    }

    /// Events journaled since the last `take_events`
    pub fn events(&self) -> &[CreditEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<CreditEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read the clock for a mutating operation
    fn begin(&self) -> Result<Timestamp, CreditError> {
        let now = self.collaborators.clock.now();
        if now < self.last_mutation {
            return Err(CreditError::ClockRegression {
                last: self.last_mutation,
                now,
            });
        }
        Ok(now)
    }

    fn commit(&mut self, now: Timestamp, staged: Staged) {
        for ledger in staged.ledgers {
            self.ledgers.insert(ledger.pool(), ledger);
        }
        for position in staged.positions {
            self.positions.put(position);
        }
        for event in staged.events {
            info!(?event, "credit event");
            self.events.push(event);
        }
        self.last_mutation = now;
    }

    fn staged_ledger(&self, pool: PoolId) -> BucketLedger {
        self.ledgers
            .get(&pool)
            .cloned()
            .unwrap_or_else(|| BucketLedger::new(pool))
    }

    fn refresh_ledger(&self, ledger: &mut BucketLedger, now: Timestamp) -> Result<usize, CreditError> {
        let utilization = self.utilization_of(ledger.pool(), ledger.total_borrowed())?;
        ledger.refresh(now, self.collaborators.rates.as_ref(), utilization)
    }

    fn stage_refresh(
        &self,
        staged: &mut Staged,
        pool: PoolId,
        now: Timestamp,
    ) -> Result<(), CreditError> {
        let mut ledger = self.staged_ledger(pool);
        let active_buckets = self.refresh_ledger(&mut ledger, now)?;
        staged.ledgers.push(ledger);
        staged.events.push(CreditEvent::PoolRefreshed {
            pool,
            active_buckets,
        });
        Ok(())
    }

    fn stage_rebucket(
        &self,
        staged: &mut Staged,
        position: &Position,
        score: Score,
        now: Timestamp,
    ) -> Result<(), CreditError> {
        let mut position = position.clone();
        let mut ledger = self.staged_ledger(position.pool);
        self.refresh_ledger(&mut ledger, now)?;

        let from = position.bucket_score;
        ledger.move_bucket(&mut position, score, now)?;
        self.refresh_ledger(&mut ledger, now)?;

        staged.events.push(CreditEvent::Rebucketed {
            pool: position.pool,
            borrower: position.borrower,
            from,
            to: score,
        });
        staged.ledgers.push(ledger);
        staged.positions.push(position);
        Ok(())
    }

    fn deadline_after(&self, now: Timestamp) -> Result<Timestamp, CreditError> {
        now.checked_add(self.config.interest_repayment_period)
            .ok_or_else(|| CreditError::arithmetic_overflow("interest_deadline"))
    }

    fn pool_value(&self, pool: PoolId) -> Result<Decimal, CreditError> {
        if !self.collaborators.pools.is_supported(pool) {
            return Ok(Decimal::ZERO);
        }
        Ok(self.collaborators.pools.value(pool)?)
    }

    fn utilization_of(&self, pool: PoolId, principal: Decimal) -> Result<Decimal, CreditError> {
        let value = self.pool_value(pool)?;
        if value <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        principal
            .checked_div(value)
            .map(|u| u.min(Decimal::ONE))
            .ok_or_else(|| CreditError::arithmetic_overflow("utilization"))
    }

    fn supported_totals(&self) -> Result<(Decimal, Decimal), CreditError> {
        let overflow = || CreditError::arithmetic_overflow("supported_totals");
        let mut value = Decimal::ZERO;
        let mut principal = Decimal::ZERO;
        for pool in self.collaborators.pools.supported_pools() {
            value = value
                .checked_add(self.collaborators.pools.value(pool)?)
                .ok_or_else(overflow)?;
            principal = principal
                .checked_add(self.pool_total_borrowed(pool))
                .ok_or_else(overflow)?;
        }
        Ok((value, principal))
    }

    fn debt_at(
        &self,
        pool: PoolId,
        borrower: BorrowerId,
        now: Timestamp,
    ) -> Result<Decimal, CreditError> {
        match (self.ledgers.get(&pool), self.positions.get(pool, borrower)) {
            (Some(ledger), Some(position)) => ledger.debt(position, now),
            _ => Ok(Decimal::ZERO),
        }
    }

    fn capacity_at(
        &self,
        pool: PoolId,
        borrower: BorrowerId,
        report: Option<&CreditReport>,
        now: Timestamp,
    ) -> Result<BorrowCapacity, CreditError> {
        let overflow = || CreditError::arithmetic_overflow("borrow_capacity");

        let debt_here = self.debt_at(pool, borrower, now)?;
        let principal_here = self
            .positions
            .get(pool, borrower)
            .map(|position| position.principal)
            .unwrap_or_default();
        let mut debt_elsewhere = Decimal::ZERO;
        for other in self.positions.pools_of(borrower) {
            if other != pool {
                debt_elsewhere = debt_elsewhere
                    .checked_add(self.debt_at(other, borrower, now)?)
                    .ok_or_else(overflow)?;
            }
        }
        let (supported_value, supported_principal) = self.supported_totals()?;

        LimitCalculator::new(&self.config).capacity(&LimitInputs {
            report: report.copied(),
            debt_here,
            principal_here,
            debt_elsewhere,
            pool_value: self.pool_value(pool)?,
            supported_value,
            supported_principal,
        })
    }

    /// Product whose lock to release once `position` is committed
    ///
    /// `Some` only when the staged position clears the borrower's last debt
    /// and this engine holds the lock.
    fn lock_to_release(
        &self,
        pool: PoolId,
        borrower: BorrowerId,
        position: &Position,
    ) -> Result<Option<ProductId>, CreditError> {
        let owes_elsewhere = self
            .positions
            .pools_of(borrower)
            .into_iter()
            .any(|other| other != pool);
        if !position.principal.is_zero() || owes_elsewhere {
            return Ok(None);
        }
        let product = self.config.product_id;
        let held = self
            .collaborators
            .lock
            .holder_of(borrower)?
            .is_some_and(|holder| holder.is_product(product));
        Ok(held.then_some(product))
    }
}

/// Start or stop a position's over-limit timer
///
/// A running timer keeps its original start.
fn over_limit_transition(
    position: &mut Position,
    exceeded: bool,
    now: Timestamp,
) -> Option<CreditEvent> {
    match (exceeded, position.over_limit_since) {
        (true, 0) => {
            // 0 means "within limit"
            let since = now.max(1);
            position.over_limit_since = since;
            Some(CreditEvent::OverLimitTimerSet {
                pool: position.pool,
                borrower: position.borrower,
                since,
            })
        }
        (false, since) if since != 0 => {
            position.over_limit_since = 0;
            Some(CreditEvent::OverLimitTimerCleared {
                pool: position.pool,
                borrower: position.borrower,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::{InMemoryWorld, LockRegistry};
    use crate::types::{CollaboratorError, DefaultReason, LockHolder, SECONDS_PER_YEAR};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    const ADMIN: OperatorId = 1;
    const YEAR: Timestamp = SECONDS_PER_YEAR;
    const DAY: Timestamp = 86_400;
    const PERIOD: Timestamp = 30 * DAY;

    fn report(score: Score, credit_limit: Decimal) -> CreditReport {
        CreditReport {
            score,
            eligible: true,
            credit_limit,
        }
    }

    /// Two pools of 100000 at 1000 bps; borrowers 7 and 8 at score 255 with
    /// a 10000 credit limit, both allowed
    fn setup() -> (InMemoryWorld, CreditLineEngine) {
        let world = InMemoryWorld::new();
        for pool in [1, 2] {
            world.pools.add_pool(pool, dec!(100000), dec!(100000));
            world.rates.set_base_rate(pool, 1000);
        }
        for borrower in [7, 8] {
            world.oracle.set_report(borrower, report(255, dec!(10000)));
        }
        let mut engine = world
            .build_engine(EngineConfig::default(), ADMIN)
            .unwrap();
        engine.set_allowed(ADMIN, 7, true).unwrap();
        engine.set_allowed(ADMIN, 8, true).unwrap();
        (world, engine)
    }

    /// Lock registry whose releases and bans can be made to fail
    #[derive(Clone, Default)]
    struct FlakyLock {
        inner: LockRegistry,
        fail_release: Arc<AtomicBool>,
        fail_ban: Arc<AtomicBool>,
    }

    impl FlakyLock {
        fn install(world: &InMemoryWorld, engine: &mut CreditLineEngine) -> Self {
            let lock = FlakyLock {
                inner: world.lock.clone(),
                ..FlakyLock::default()
            };
            engine
                .set_exclusivity_lock(ADMIN, Arc::new(lock.clone()))
                .unwrap();
            lock
        }

        fn refused(action: &str) -> CollaboratorError {
            CollaboratorError::new("exclusivity lock", format!("{} refused", action))
        }
    }

    impl ExclusivityLock for FlakyLock {
        fn holder_of(&self, borrower: BorrowerId) -> Result<Option<LockHolder>, CollaboratorError> {
            self.inner.holder_of(borrower)
        }

        fn try_acquire(
            &self,
            borrower: BorrowerId,
            product: ProductId,
        ) -> Result<(), CollaboratorError> {
            self.inner.try_acquire(borrower, product)
        }

        fn release(&self, borrower: BorrowerId, product: ProductId) -> Result<(), CollaboratorError> {
            if self.fail_release.load(Ordering::SeqCst) {
                return Err(Self::refused("release"));
            }
            self.inner.release(borrower, product)
        }

        fn ban(&self, borrower: BorrowerId) -> Result<(), CollaboratorError> {
            if self.fail_ban.load(Ordering::SeqCst) {
                return Err(Self::refused("ban"));
            }
            self.inner.ban(borrower)
        }
    }

    fn assert_untouched(world: &InMemoryWorld, engine: &CreditLineEngine, borrower: BorrowerId) {
        assert!(engine.positions().is_empty());
        assert!(engine.events().is_empty());
        assert_eq!(world.lock.holder(borrower), None);
        assert_eq!(engine.pool_total_borrowed(1), Decimal::ZERO);
    }

    #[test]
    fn test_borrow_opens_position() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();

        let position = engine.position(1, 7).unwrap();
        assert_eq!(position.principal, dec!(1000));
        assert_eq!(position.bucket_score, 255);
        assert_eq!(position.next_interest_deadline, PERIOD);
        assert_eq!(position.over_limit_since, 0);

        let bucket = engine.bucket(1, 255).unwrap();
        assert_eq!(bucket.borrowers_count, 1);
        assert_eq!(bucket.total_borrowed, dec!(1000));
        assert_eq!(bucket.rate, 1000);

        assert_eq!(world.lock.holder(7), Some(LockHolder::Product(1)));
        assert_eq!(world.pools.state(1).unwrap().cash, dec!(99000));
        assert_eq!(
            engine.events(),
            &[CreditEvent::BorrowRecorded {
                pool: 1,
                borrower: 7,
                amount: dec!(1000)
            }]
        );
    }

    #[rstest]
    #[case::zero_amount(1, 7, dec!(0), CreditError::invalid_amount(dec!(0)))]
    #[case::negative_amount(1, 7, dec!(-5), CreditError::invalid_amount(dec!(-5)))]
    #[case::not_allowed(1, 9, dec!(10), CreditError::not_allowed(9))]
    #[case::unsupported_pool(5, 7, dec!(10), CreditError::pool_not_supported(5))]
    #[case::over_limit(
        1,
        7,
        dec!(10000.01),
        CreditError::exceeds_borrow_limit(1, 7, dec!(10000), dec!(10000.01))
    )]
    fn test_borrow_rejections(
        #[case] pool: PoolId,
        #[case] borrower: BorrowerId,
        #[case] amount: Decimal,
        #[case] expected: CreditError,
    ) {
        let (world, mut engine) = setup();
        assert_eq!(engine.borrow(pool, borrower, amount), Err(expected));
        assert_untouched(&world, &engine, borrower);
    }

    #[test]
    fn test_borrow_without_report_fails() {
        let (world, mut engine) = setup();
        engine.set_allowed(ADMIN, 9, true).unwrap();
        assert_eq!(
            engine.borrow(1, 9, dec!(10)),
            Err(CreditError::score_not_set(9))
        );
        assert_untouched(&world, &engine, 9);
    }

    #[test]
    fn test_borrow_ineligible_fails() {
        let (world, mut engine) = setup();
        world.oracle.set_eligible(7, false);
        assert_eq!(
            engine.borrow(1, 7, dec!(10)),
            Err(CreditError::ineligible(7))
        );
        assert_untouched(&world, &engine, 7);
    }

    #[test]
    fn test_borrow_below_minimum_score_fails() {
        let (world, mut engine) = setup();
        world.oracle.set_score(7, 0);
        assert_eq!(
            engine.borrow(1, 7, dec!(10)),
            Err(CreditError::below_minimum_score(7, 0, 1))
        );
        assert_untouched(&world, &engine, 7);
    }

    #[test]
    fn test_borrow_lock_held_by_other_product_fails() {
        let (world, mut engine) = setup();
        world.lock.try_acquire(7, 99).unwrap();
        assert_eq!(
            engine.borrow(1, 7, dec!(10)),
            Err(CreditError::lock_held_by_other(7, LockHolder::Product(99)))
        );
        assert!(engine.positions().is_empty());
    }

    #[test]
    fn test_borrow_blocked_only_in_overdue_pool() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(100)).unwrap();
        world.clock.set(PERIOD + 1);

        assert_eq!(
            engine.borrow(1, 7, dec!(100)),
            Err(CreditError::interest_overdue(1, 7, PERIOD))
        );
        engine.borrow(2, 7, dec!(100)).unwrap();
    }

    #[test]
    fn test_borrow_without_liquidity_is_rejected() {
        let (world, mut engine) = setup();
        world.pools.add_pool(3, dec!(100000), dec!(10));
        world.rates.set_base_rate(3, 1000);

        let result = engine.borrow(3, 7, dec!(100));
        assert_eq!(
            result,
            Err(CreditError::insufficient_liquidity(3, 7, dec!(10), dec!(100)))
        );
        assert!(!result.unwrap_err().is_fault());
        assert!(engine.position(3, 7).is_none());
        assert_eq!(engine.pool_total_borrowed(3), Decimal::ZERO);
        assert_eq!(world.lock.holder(7), None);
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_one_year_at_1000_bps_accrues_ten_percent() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR);

        assert_eq!(engine.interest(1, 7).unwrap(), dec!(100));
        assert_eq!(engine.debt(1, 7).unwrap(), dec!(1100));
        assert_eq!(engine.total_borrowed(7).unwrap(), dec!(1100));
    }

    #[test]
    fn test_repay_interest_first_then_principal() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR);
        engine.take_events();

        engine.repay(1, 7, dec!(600)).unwrap();

        let position = engine.position(1, 7).unwrap();
        assert_eq!(position.principal, dec!(500));
        assert_eq!(position.next_interest_deadline, YEAR + PERIOD);
        assert_eq!(position.total_interest_paid, dec!(100));
        assert_eq!(engine.interest(1, 7).unwrap(), Decimal::ZERO);
        assert_eq!(engine.ledger(1).unwrap().total_paid_interest(), dec!(100));
        assert_eq!(world.pools.state(1).unwrap().cash, dec!(99600));
        assert_eq!(
            engine.take_events(),
            vec![CreditEvent::Repaid {
                pool: 1,
                borrower: 7,
                principal: dec!(500),
                interest: dec!(100)
            }]
        );
    }

    #[test]
    fn test_partial_interest_payment_keeps_principal_and_deadline() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR);

        engine.repay(1, 7, dec!(40)).unwrap();
        let position = engine.position(1, 7).unwrap();
        assert_eq!(position.principal, dec!(1000));
        assert_eq!(position.next_interest_deadline, PERIOD);
        assert_eq!(engine.interest(1, 7).unwrap(), dec!(60));

        engine.repay(1, 7, dec!(60)).unwrap();
        let position = engine.position(1, 7).unwrap();
        assert_eq!(position.principal, dec!(1000));
        assert_eq!(position.next_interest_deadline, YEAR + PERIOD);
        assert_eq!(engine.interest(1, 7).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_repay_more_than_debt_fails() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR);

        assert_eq!(
            engine.repay(1, 7, dec!(1100.01)),
            Err(CreditError::exceeds_debt(1, 7, dec!(1100), dec!(1100.01)))
        );
        assert_eq!(engine.position(1, 7).unwrap().principal, dec!(1000));
    }

    #[test]
    fn test_repay_without_position_fails() {
        let (_world, mut engine) = setup();
        assert_eq!(
            engine.repay(1, 7, dec!(1)),
            Err(CreditError::no_open_position(Some(1), 7))
        );
        assert_eq!(
            engine.repay_in_full(1, 7),
            Err(CreditError::no_open_position(Some(1), 7))
        );
        assert_eq!(
            engine.pay_interest(1, 7),
            Err(CreditError::no_open_position(Some(1), 7))
        );
    }

    #[test]
    fn test_repay_in_full_closes_position_and_releases_lock() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR);

        engine.repay_in_full(1, 7).unwrap();

        assert!(engine.position(1, 7).is_none());
        assert!(engine.bucket(1, 255).is_none());
        assert_eq!(engine.pool_total_borrowed(1), Decimal::ZERO);
        assert_eq!(engine.interest(1, 7).unwrap(), Decimal::ZERO);
        assert_eq!(world.lock.holder(7), None);
        assert_eq!(world.pools.state(1).unwrap().cash, dec!(100100));
    }

    #[test]
    fn test_lock_kept_while_other_pool_owed() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(100)).unwrap();
        engine.borrow(2, 7, dec!(100)).unwrap();
        world.clock.set(DAY);

        engine.repay_in_full(1, 7).unwrap();
        assert_eq!(world.lock.holder(7), Some(LockHolder::Product(1)));

        engine.repay_in_full(2, 7).unwrap();
        assert_eq!(world.lock.holder(7), None);
    }

    #[test]
    fn test_pay_interest_is_idempotent() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR);

        engine.pay_interest(1, 7).unwrap();
        let position = engine.position(1, 7).unwrap();
        assert_eq!(position.principal, dec!(1000));
        assert_eq!(position.next_interest_deadline, YEAR + PERIOD);
        assert_eq!(position.total_interest_paid, dec!(100));
        assert_eq!(world.pools.state(1).unwrap().cash, dec!(99100));

        engine.take_events();
        engine.pay_interest(1, 7).unwrap();
        assert_eq!(world.pools.state(1).unwrap().cash, dec!(99100));
        assert_eq!(
            engine.take_events(),
            vec![CreditEvent::InterestPaid {
                pool: 1,
                borrower: 7,
                amount: Decimal::ZERO
            }]
        );
    }

    #[test]
    fn test_same_bucket_borrowers_share_index() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        engine.borrow(1, 8, dec!(3000)).unwrap();
        world.clock.set(YEAR);

        let bucket = engine.bucket(1, 255).unwrap();
        assert_eq!(bucket.borrowers_count, 2);
        assert_eq!(bucket.total_borrowed, dec!(4000));
        assert_eq!(engine.current_rate(1, 7).unwrap(), engine.current_rate(1, 8).unwrap());
        assert_eq!(engine.interest(1, 7).unwrap(), dec!(100));
        assert_eq!(engine.interest(1, 8).unwrap(), dec!(300));
    }

    #[test]
    fn test_update_credit_score_is_interest_neutral() {
        let (world, mut engine) = setup();
        world.rates.set_score_rate(1, 100, 2000);
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR / 2);
        world.oracle.set_score(7, 100);

        let before = engine.interest(1, 7).unwrap();
        engine.update_credit_score(1, 7).unwrap();
        let after = engine.interest(1, 7).unwrap();

        assert_eq!(before, dec!(50));
        assert_eq!(before, after);
        assert_eq!(engine.position(1, 7).unwrap().bucket_score, 100);
        assert!(engine.bucket(1, 255).is_none());
        assert_eq!(engine.bucket(1, 100).unwrap().rate, 2000);
        assert_eq!(
            engine.events().last(),
            Some(&CreditEvent::Rebucketed {
                pool: 1,
                borrower: 7,
                from: 255,
                to: 100
            })
        );

        // half a year at 2000 bps on top of the carried 50
        world.clock.set(YEAR);
        assert_eq!(engine.interest(1, 7).unwrap(), dec!(150));
    }

    #[test]
    fn test_update_credit_score_edge_cases() {
        let (_world, mut engine) = setup();
        assert_eq!(
            engine.update_credit_score(1, 9),
            Err(CreditError::score_not_set(9))
        );
        engine.update_credit_score(1, 7).unwrap();
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_update_all_credit_scores_covers_owed_pools() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(100)).unwrap();
        engine.borrow(2, 7, dec!(100)).unwrap();
        world.oracle.set_score(7, 128);
        engine.take_events();

        engine.update_all_credit_scores(7).unwrap();

        assert_eq!(engine.position(1, 7).unwrap().bucket_score, 128);
        assert_eq!(engine.position(2, 7).unwrap().bucket_score, 128);
        assert_eq!(engine.take_events().len(), 2);
    }

    #[test]
    fn test_borrow_rebuckets_stale_position() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(100)).unwrap();
        world.oracle.set_score(7, 200);
        world.clock.set(DAY);

        engine.borrow(1, 7, dec!(100)).unwrap();
        let position = engine.position(1, 7).unwrap();
        assert_eq!(position.bucket_score, 200);
        assert_eq!(position.principal, dec!(200));
        assert_eq!(position.next_interest_deadline, PERIOD);
        assert!(engine.bucket(1, 255).is_none());
    }

    #[test]
    fn test_over_limit_timer_keeps_earliest_violation() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(5000)).unwrap();
        world.oracle.set_report(7, report(255, dec!(1000)));

        world.clock.set(100);
        engine.poke_borrow_limit_timer(1, 7).unwrap();
        assert_eq!(engine.position(1, 7).unwrap().over_limit_since, 100);

        world.clock.set(200);
        engine.take_events();
        engine.poke_borrow_limit_timer(1, 7).unwrap();
        assert_eq!(engine.position(1, 7).unwrap().over_limit_since, 100);
        assert!(engine.take_events().is_empty());

        world.oracle.set_report(7, report(255, dec!(10000)));
        world.clock.set(300);
        engine.poke_borrow_limit_timer(1, 7).unwrap();
        assert_eq!(engine.position(1, 7).unwrap().over_limit_since, 0);
        assert_eq!(
            engine.take_events(),
            vec![CreditEvent::OverLimitTimerCleared {
                pool: 1,
                borrower: 7
            }]
        );
    }

    #[test]
    fn test_over_limit_timer_without_position_is_noop() {
        let (_world, mut engine) = setup();
        engine.poke_borrow_limit_timer(1, 7).unwrap();
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_default_after_limit_grace() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(5000)).unwrap();
        world.oracle.set_report(7, report(255, dec!(1000)));
        world.clock.set(100);
        engine.poke_borrow_limit_timer(1, 7).unwrap();

        world.clock.set(100 + 3 * DAY);
        assert_eq!(
            engine.enter_default(ADMIN, 7),
            Err(CreditError::no_default_reason(7))
        );

        world.clock.set(100 + 3 * DAY + 1);
        engine.enter_default(ADMIN, 7).unwrap();
        assert!(matches!(
            engine.events().last(),
            Some(CreditEvent::EnteredDefault {
                reason: DefaultReason::BorrowLimitExceeded,
                ..
            })
        ));
    }

    #[test]
    fn test_default_closes_every_pool_and_bans() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        engine.borrow(2, 7, dec!(2000)).unwrap();
        engine.borrow(1, 8, dec!(500)).unwrap();

        world.clock.set(PERIOD + 5 * DAY + 1);
        let debt_1 = engine.debt(1, 7).unwrap();
        let debt_2 = engine.debt(2, 7).unwrap();

        engine.enter_default(ADMIN, 7).unwrap();

        for pool in [1, 2] {
            assert!(engine.position(pool, 7).is_none());
            assert_eq!(engine.interest(pool, 7).unwrap(), Decimal::ZERO);
        }
        assert_eq!(engine.pool_total_borrowed(1), dec!(500));
        assert_eq!(engine.pool_total_borrowed(2), Decimal::ZERO);
        assert_eq!(world.lock.holder(7), Some(LockHolder::Banned));

        let claims = world.issuer.claims();
        assert_eq!(
            claims,
            vec![
                DebtClaim {
                    pool: 1,
                    borrower: 7,
                    amount: debt_1
                },
                DebtClaim {
                    pool: 2,
                    borrower: 7,
                    amount: debt_2
                },
            ]
        );
        assert_eq!(
            engine.events().last(),
            Some(&CreditEvent::EnteredDefault {
                borrower: 7,
                reason: DefaultReason::InterestOverdue,
                claims,
            })
        );

        assert_eq!(
            engine.borrow(1, 7, dec!(1)),
            Err(CreditError::lock_held_by_other(7, LockHolder::Banned))
        );
    }

    #[test]
    fn test_default_reports_not_allowed_first() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(100)).unwrap();
        engine.set_allowed(ADMIN, 7, false).unwrap();
        world.oracle.set_eligible(7, false);

        engine.enter_default(ADMIN, 7).unwrap();
        assert!(matches!(
            engine.events().last(),
            Some(CreditEvent::EnteredDefault {
                reason: DefaultReason::NotAllowed,
                ..
            })
        ));
    }

    #[test]
    fn test_default_preconditions() {
        let (_world, mut engine) = setup();
        assert_eq!(
            engine.enter_default(ADMIN, 7),
            Err(CreditError::no_open_position(None, 7))
        );
        engine.borrow(1, 7, dec!(100)).unwrap();
        assert_eq!(
            engine.enter_default(ADMIN, 7),
            Err(CreditError::no_default_reason(7))
        );
        assert_eq!(
            engine.enter_default(2, 7),
            Err(CreditError::unauthorized(2, "enforce_default"))
        );

        engine.grant(ADMIN, 2, Capability::EnforceDefault).unwrap();
        assert_eq!(
            engine.enter_default(2, 7),
            Err(CreditError::no_default_reason(7))
        );
    }

    #[test]
    fn test_default_claim_failure_changes_nothing() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(100)).unwrap();
        world.clock.set(PERIOD + 5 * DAY + 1);
        world.issuer.set_refusing(true);
        engine.take_events();

        let result = engine.enter_default(ADMIN, 7);
        assert!(matches!(result, Err(CreditError::CollaboratorFault(_))));
        assert!(result.unwrap_err().is_fault());
        assert_eq!(engine.position(1, 7).unwrap().principal, dec!(100));
        assert_eq!(world.lock.holder(7), Some(LockHolder::Product(1)));
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_default_with_one_refused_claim_issues_none() {
        let (world, mut engine) = setup();
        engine.borrow(1, 7, dec!(100)).unwrap();
        engine.borrow(2, 7, dec!(200)).unwrap();
        world.clock.set(PERIOD + 5 * DAY + 1);
        world.issuer.set_refusing_pool(2, true);
        engine.take_events();

        let result = engine.enter_default(ADMIN, 7);
        assert!(result.unwrap_err().is_fault());
        assert!(world.issuer.claims().is_empty());
        assert_eq!(engine.position(1, 7).unwrap().principal, dec!(100));
        assert_eq!(engine.position(2, 7).unwrap().principal, dec!(200));
        assert_eq!(world.lock.holder(7), Some(LockHolder::Product(1)));
        assert!(engine.events().is_empty());

        world.issuer.set_refusing_pool(2, false);
        engine.enter_default(ADMIN, 7).unwrap();
        let pools: Vec<PoolId> = world.issuer.claims().iter().map(|c| c.pool).collect();
        assert_eq!(pools, vec![1, 2]);
        assert!(engine.positions().is_empty());
        assert_eq!(world.lock.holder(7), Some(LockHolder::Banned));
    }

    #[test]
    fn test_default_ban_failure_withdraws_claims() {
        let (world, mut engine) = setup();
        let lock = FlakyLock::install(&world, &mut engine);
        engine.borrow(1, 7, dec!(100)).unwrap();
        world.clock.set(PERIOD + 5 * DAY + 1);
        lock.fail_ban.store(true, Ordering::SeqCst);

        let result = engine.enter_default(ADMIN, 7);
        assert!(result.unwrap_err().is_fault());
        assert!(world.issuer.claims().is_empty());
        assert_eq!(engine.position(1, 7).unwrap().principal, dec!(100));
        assert_eq!(world.lock.holder(7), Some(LockHolder::Product(1)));

        lock.fail_ban.store(false, Ordering::SeqCst);
        engine.enter_default(ADMIN, 7).unwrap();
        assert_eq!(world.issuer.claims().len(), 1);
        assert_eq!(world.lock.holder(7), Some(LockHolder::Banned));
    }

    #[test]
    fn test_repay_lock_release_failure_changes_nothing() {
        let (world, mut engine) = setup();
        let lock = FlakyLock::install(&world, &mut engine);
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR);
        lock.fail_release.store(true, Ordering::SeqCst);
        engine.take_events();

        let result = engine.repay_in_full(1, 7);
        assert!(result.unwrap_err().is_fault());
        assert_eq!(engine.position(1, 7).unwrap().principal, dec!(1000));
        assert_eq!(engine.debt(1, 7).unwrap(), dec!(1100));
        assert_eq!(world.pools.state(1).unwrap().cash, dec!(99000));
        assert_eq!(world.lock.holder(7), Some(LockHolder::Product(1)));
        assert!(engine.events().is_empty());

        // partial repayments never touch the lock
        engine.repay(1, 7, dec!(100)).unwrap();
        assert_eq!(world.lock.holder(7), Some(LockHolder::Product(1)));

        lock.fail_release.store(false, Ordering::SeqCst);
        engine.repay_in_full(1, 7).unwrap();
        assert!(engine.position(1, 7).is_none());
        assert_eq!(world.lock.holder(7), None);
        assert_eq!(world.pools.state(1).unwrap().cash, dec!(100100));
    }

    #[test]
    fn test_clock_regression_is_a_fault() {
        let (world, mut engine) = setup();
        world.clock.set(100);
        engine.poke(1).unwrap();
        world.clock.set(50);

        let result = engine.poke(1);
        assert_eq!(result, Err(CreditError::ClockRegression { last: 100, now: 50 }));
        assert!(engine.interest(1, 7).is_ok());
    }

    #[test]
    fn test_poke_reports_active_buckets() {
        let (_world, mut engine) = setup();
        assert_eq!(engine.poke(5), Err(CreditError::pool_not_supported(5)));

        engine.borrow(1, 7, dec!(100)).unwrap();
        engine.take_events();
        engine.poke_all().unwrap();
        assert_eq!(
            engine.take_events(),
            vec![
                CreditEvent::PoolRefreshed {
                    pool: 1,
                    active_buckets: 1
                },
                CreditEvent::PoolRefreshed {
                    pool: 2,
                    active_buckets: 0
                },
            ]
        );
    }

    #[test]
    fn test_limit_queries() {
        let (_world, mut engine) = setup();
        engine.borrow(1, 7, dec!(4000)).unwrap();
        engine.borrow(2, 8, dec!(1000)).unwrap();

        assert_eq!(engine.single_credit_value(7).unwrap(), dec!(10000));
        assert_eq!(engine.pool_credit_value(1).unwrap(), dec!(10000));
        assert_eq!(engine.aggregate_credit_value().unwrap(), dec!(95000));
        assert_eq!(engine.borrow_limit(1, 7).unwrap(), dec!(6000));
        // credit cap minus debt in pool 1
        assert_eq!(engine.borrow_limit(2, 7).unwrap(), dec!(6000));
        assert_eq!(engine.utilization(1).unwrap(), dec!(0.04));
    }

    #[test]
    fn test_apply_dispatches_operations() {
        let (world, mut engine) = setup();
        engine
            .apply(Operation::Borrow {
                pool: 1,
                borrower: 7,
                amount: dec!(1000),
            })
            .unwrap();
        world.clock.set(YEAR);
        engine
            .apply(Operation::PayInterest {
                pool: 1,
                borrower: 7,
            })
            .unwrap();
        engine
            .apply(Operation::RepayInFull {
                pool: 1,
                borrower: 7,
            })
            .unwrap();

        assert!(engine.positions().is_empty());
        assert_eq!(world.pools.state(1).unwrap().cash, dec!(100100));
    }

    #[test]
    fn test_admin_operations_require_capabilities() {
        let (world, mut engine) = setup();
        assert_eq!(
            engine.set_allowed(2, 9, true),
            Err(CreditError::unauthorized(2, "manage_borrowers"))
        );
        assert_eq!(
            engine.set_rate_source(2, Arc::new(world.rates.clone())),
            Err(CreditError::unauthorized(2, "manage_collaborators"))
        );

        let invalid = EngineConfig {
            interest_repayment_period: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            engine.set_config(ADMIN, invalid),
            Err(CreditError::InvalidConfig { .. })
        ));

        engine.grant(ADMIN, 2, Capability::ManageBorrowers).unwrap();
        engine.set_allowed(2, 9, true).unwrap();
        assert!(engine.is_allowed(9));
    }

    #[test]
    fn test_position_summaries_evaluate_interest_now() {
        let (world, mut engine) = setup();
        engine.borrow(2, 8, dec!(1000)).unwrap();
        engine.borrow(1, 7, dec!(1000)).unwrap();
        world.clock.set(YEAR);

        let summaries = engine.position_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!((summaries[0].pool, summaries[0].borrower), (1, 7));
        assert_eq!(summaries[0].interest, dec!(100));
        assert_eq!(summaries[1].score, 255);
    }
}

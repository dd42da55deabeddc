//! Exclusivity lock registry
//!
//! One entry per borrower holding the current lock holder. Products acquire
//! and release; a ban replaces any holder with the `Banned` sentinel, which
//! no product can acquire or release.

use crate::core::traits::ExclusivityLock;
use crate::types::{BorrowerId, CollaboratorError, LockHolder, ProductId};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    holders: Arc<DashMap<BorrowerId, LockHolder>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder without going through the trait
    pub fn holder(&self, borrower: BorrowerId) -> Option<LockHolder> {
        self.holders.get(&borrower).map(|entry| *entry)
    }
}

impl ExclusivityLock for LockRegistry {
    fn holder_of(&self, borrower: BorrowerId) -> Result<Option<LockHolder>, CollaboratorError> {
        Ok(self.holder(borrower))
    }

    fn try_acquire(
        &self,
        borrower: BorrowerId,
        product: ProductId,
    ) -> Result<(), CollaboratorError> {
        let holder = *self
            .holders
            .entry(borrower)
            .or_insert(LockHolder::Product(product));
        if holder.is_product(product) {
            return Ok(());
        }
        Err(CollaboratorError::new(
            "exclusivity lock",
            format!("borrower {} is held by {}", borrower, holder),
        ))
    }

    fn release(&self, borrower: BorrowerId, product: ProductId) -> Result<(), CollaboratorError> {
        self.holders
            .remove_if(&borrower, |_, holder| holder.is_product(product));
        Ok(())
    }

    fn ban(&self, borrower: BorrowerId) -> Result<(), CollaboratorError> {
        self.holders.insert(borrower, LockHolder::Banned);
        Ok(())
    }
}

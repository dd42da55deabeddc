//! Default claim recorder

use crate::core::traits::DefaultIssuer;
use crate::types::{CollaboratorError, DebtClaim, PoolId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Keeps every issued debt claim in issue order
///
/// Can be told to refuse all claims, or only claims against given pools,
/// which lets callers exercise the engine's fault path on default. A batch
/// containing any refused claim records nothing.
#[derive(Debug, Clone, Default)]
pub struct RecordingIssuer {
    claims: Arc<Mutex<Vec<DebtClaim>>>,
    refusing: Arc<Mutex<bool>>,
    refused_pools: Arc<Mutex<HashSet<PoolId>>>,
}

fn poisoned() -> CollaboratorError {
    CollaboratorError::new("default issuer", "state poisoned")
}

impl RecordingIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims issued so far
    pub fn claims(&self) -> Vec<DebtClaim> {
        self.claims
            .lock()
            .map(|claims| claims.clone())
            .unwrap_or_default()
    }

    /// Make subsequent batches fail (or succeed again)
    pub fn set_refusing(&self, refusing: bool) {
        if let Ok(mut flag) = self.refusing.lock() {
            *flag = refusing;
        }
    }

    /// Refuse (or accept again) claims against one pool
    pub fn set_refusing_pool(&self, pool: PoolId, refusing: bool) {
        if let Ok(mut pools) = self.refused_pools.lock() {
            if refusing {
                pools.insert(pool);
            } else {
                pools.remove(&pool);
            }
        }
    }
}

impl DefaultIssuer for RecordingIssuer {
    fn issue_claims(&self, batch: &[DebtClaim]) -> Result<(), CollaboratorError> {
        let refusing = *self.refusing.lock().map_err(|_| poisoned())?;
        let refused_pools = self.refused_pools.lock().map_err(|_| poisoned())?;
        if let Some(claim) = batch
            .iter()
            .find(|claim| refusing || refused_pools.contains(&claim.pool))
        {
            return Err(CollaboratorError::new(
                "default issuer",
                format!(
                    "claim for borrower {} in pool {} refused",
                    claim.borrower, claim.pool
                ),
            ));
        }
        self.claims
            .lock()
            .map_err(|_| poisoned())?
            .extend_from_slice(batch);
        Ok(())
    }

    fn withdraw_claims(&self, batch: &[DebtClaim]) -> Result<(), CollaboratorError> {
        let mut claims = self.claims.lock().map_err(|_| poisoned())?;
        for claim in batch {
            if let Some(index) = claims.iter().rposition(|issued| issued == claim) {
                claims.remove(index);
            }
        }
        Ok(())
    }
}

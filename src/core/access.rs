//! Operator capabilities for admin operations

use crate::types::{CreditError, OperatorId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Named permission required by an admin operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Swap rate source, credit source, pool adapter, lock or default issuer
    ManageCollaborators,
    /// Allow or disallow borrowers
    ManageBorrowers,
    /// Replace the engine configuration
    ManageConfig,
    /// Force a borrower into default
    EnforceDefault,
    /// Grant and revoke capabilities
    ManageAccess,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::ManageCollaborators,
        Capability::ManageBorrowers,
        Capability::ManageConfig,
        Capability::EnforceDefault,
        Capability::ManageAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageCollaborators => "manage_collaborators",
            Capability::ManageBorrowers => "manage_borrowers",
            Capability::ManageConfig => "manage_config",
            Capability::EnforceDefault => "enforce_default",
            Capability::ManageAccess => "manage_access",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator → capability grants; the owner implicitly holds every capability
#[derive(Debug, Clone)]
pub struct AccessControl {
    owner: OperatorId,
    grants: HashMap<OperatorId, HashSet<Capability>>,
}

impl AccessControl {
    pub fn new(owner: OperatorId) -> Self {
        AccessControl {
            owner,
            grants: HashMap::new(),
        }
    }

    pub fn owner(&self) -> OperatorId {
        self.owner
    }

    pub fn has(&self, operator: OperatorId, capability: Capability) -> bool {
        operator == self.owner
            || self
                .grants
                .get(&operator)
                .is_some_and(|caps| caps.contains(&capability))
    }

    /// Fail with `Unauthorized` unless `operator` holds `capability`
    pub fn require(&self, operator: OperatorId, capability: Capability) -> Result<(), CreditError> {
        if self.has(operator, capability) {
            Ok(())
        } else {
            Err(CreditError::unauthorized(operator, capability.as_str()))
        }
    }

    pub fn grant(&mut self, operator: OperatorId, capability: Capability) {
        self.grants.entry(operator).or_default().insert(capability);
    }

    /// Remove a grant; the owner's implicit capabilities cannot be revoked
    pub fn revoke(&mut self, operator: OperatorId, capability: Capability) {
        if let Some(caps) = self.grants.get_mut(&operator) {
            caps.remove(&capability);
            if caps.is_empty() {
                self.grants.remove(&operator);
            }
        }
    }
}

//! Commit rules: cross-entity invariants checked before a transaction is
//! applied.
//!
//! Rules run in order at two checkpoints:
//!
//! 1. `before_insert` for every rule, then
//! 2. `before_flush` for every rule.
//!
//! A rule either returns `Ok(())` (possibly after adjusting pending entities or
//! scheduling supplementary updates) or a [`DomainError`] that rejects the
//! whole transaction.

pub mod bootstrap;
pub mod default_email;
pub mod email_uniqueness;
pub mod role_consistency;

use std::collections::BTreeSet;

use accounts_auth::{Role, RoleName};
use accounts_core::{DomainError, DomainResult, Entity, RoleId};

use crate::config::AccountsConfig;
use crate::store::AccountsQuery;
use crate::unit_of_work::PendingChanges;

pub use bootstrap::BootstrapRule;
pub use default_email::DefaultEmailRule;
pub use email_uniqueness::EmailUniquenessRule;
pub use role_consistency::RoleConsistencyRule;

/// What a rule sees while a transaction is being committed.
pub struct FlushContext<'a> {
    query: &'a dyn AccountsQuery,
    config: &'a AccountsConfig,
    pending: &'a mut PendingChanges,
}

impl<'a> FlushContext<'a> {
    pub fn new(
        query: &'a dyn AccountsQuery,
        config: &'a AccountsConfig,
        pending: &'a mut PendingChanges,
    ) -> Self {
        Self {
            query,
            config,
            pending,
        }
    }

    /// Committed state. Does not include anything pending in this transaction.
    pub fn query(&self) -> &'a dyn AccountsQuery {
        self.query
    }

    pub fn config(&self) -> &'a AccountsConfig {
        self.config
    }

    pub fn pending(&self) -> &PendingChanges {
        &*self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingChanges {
        &mut *self.pending
    }

    /// A role as it will look after this transaction (pending copy first).
    pub fn resolve_role(&self, id: &RoleId) -> Option<&Role> {
        if self.pending.removed_roles().contains(id) {
            return None;
        }
        self.pending
            .roles()
            .iter()
            .map(|s| s.entity())
            .find(|r| r.id() == id)
            .or_else(|| self.query.find_role(id))
    }

    /// Resolve role names against committed roles.
    ///
    /// A name that does not exist (or is removed in this transaction) is a
    /// configuration error.
    pub fn resolve_role_names(&self, names: &[RoleName]) -> DomainResult<BTreeSet<RoleId>> {
        names
            .iter()
            .map(|name| {
                self.query
                    .find_role_by_name(name)
                    .map(|r| *r.id())
                    .filter(|id| !self.pending.removed_roles().contains(id))
                    .ok_or_else(|| {
                        tracing::error!(role = %name, "configured role is missing");
                        DomainError::configuration(format!("role {name} is not created"))
                    })
            })
            .collect()
    }

    pub fn default_roles(&self) -> DomainResult<BTreeSet<RoleId>> {
        self.resolve_role_names(&self.config.default_roles)
    }
}

/// One cross-entity invariant.
pub trait CommitRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn before_insert(&self, _ctx: &mut FlushContext<'_>) -> DomainResult<()> {
        Ok(())
    }

    fn before_flush(&self, _ctx: &mut FlushContext<'_>) -> DomainResult<()> {
        Ok(())
    }
}

/// The accounts module's rules, in evaluation order.
pub fn default_rules() -> Vec<Box<dyn CommitRule>> {
    vec![
        Box::new(BootstrapRule),
        Box::new(EmailUniquenessRule),
        Box::new(RoleConsistencyRule),
        Box::new(DefaultEmailRule),
    ]
}

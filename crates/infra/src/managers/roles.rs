use std::sync::Arc;

use chrono::Utc;

use accounts_auth::{Role, RoleName};
use accounts_core::{DomainError, Entity, RoleId};
use accounts_events::{EntityMessage, EventBus};

use crate::executor::{CommitError, TransactionExecutor};
use crate::store::AccountsStore;
use crate::unit_of_work::Transaction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRole {
    pub name: RoleName,
    pub description: String,
    pub parent: Option<RoleId>,
}

impl CreateRole {
    pub fn new(name: impl Into<RoleName>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parent: None,
        }
    }

    pub fn under(mut self, parent: RoleId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRole {
    pub name: Option<RoleName>,
    pub description: Option<String>,
    /// `Some(None)` makes the role a root.
    pub parent: Option<Option<RoleId>>,
}

pub struct RolesManager<S, B> {
    executor: Arc<TransactionExecutor<S, B>>,
}

impl<S, B> RolesManager<S, B>
where
    S: AccountsStore,
    B: EventBus<EntityMessage>,
{
    pub fn new(executor: Arc<TransactionExecutor<S, B>>) -> Self {
        Self { executor }
    }

    pub fn create(&self, input: CreateRole) -> Result<Role, CommitError> {
        let mut tx = Transaction::new();
        let role = self.stage_create(&mut tx, input)?;
        self.executor.commit(tx)?;
        Ok(role)
    }

    pub fn stage_create(&self, tx: &mut Transaction, input: CreateRole) -> Result<Role, CommitError> {
        let role = Role::new(RoleId::new(), input.name, input.description, Utc::now())?
            .with_parent(input.parent);
        tx.persist_role(role.clone());
        Ok(role)
    }

    pub fn update(&self, id: RoleId, input: UpdateRole) -> Result<Role, CommitError> {
        let mut tx = Transaction::new();
        let role = self.stage_update(&mut tx, id, input)?;
        self.executor.commit(tx)?;
        Ok(role)
    }

    pub fn stage_update(
        &self,
        tx: &mut Transaction,
        id: RoleId,
        input: UpdateRole,
    ) -> Result<Role, CommitError> {
        let mut role = self.current(tx, &id)?;
        if let Some(name) = input.name {
            role.set_name(name)?;
        }
        if let Some(description) = input.description {
            role.set_description(description);
        }
        if let Some(parent) = input.parent {
            role.set_parent(parent);
        }
        tx.persist_role(role.clone());
        Ok(role)
    }

    /// Delete a role. Its children become roots; accounts lose the role.
    pub fn delete(&self, id: RoleId) -> Result<(), CommitError> {
        let mut tx = Transaction::new();
        self.stage_delete(&mut tx, id)?;
        self.executor.commit(tx)?;
        Ok(())
    }

    pub fn stage_delete(&self, tx: &mut Transaction, id: RoleId) -> Result<(), CommitError> {
        self.current(tx, &id)?;
        tx.remove_role(id);
        Ok(())
    }

    fn current(&self, tx: &Transaction, id: &RoleId) -> Result<Role, CommitError> {
        if let Some(role) = tx.role(id) {
            return Ok(role.clone());
        }
        self.executor
            .read(|q| q.find_role(id).cloned())?
            .ok_or_else(|| DomainError::not_found(Role::KIND, id).into())
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};

use accounts_auth::{Account, AccountState, Details};
use accounts_core::{AccountId, DomainError, Entity, RoleId};
use accounts_events::{EntityMessage, EventBus};

use crate::executor::{CommitError, TransactionExecutor};
use crate::store::AccountsStore;
use crate::unit_of_work::Transaction;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateAccount {
    pub details: Details,
    pub language: Option<String>,
    pub state: AccountState,
    /// Empty means "the configured default roles".
    pub roles: Vec<RoleId>,
    pub params: Map<String, JsonValue>,
}

impl CreateAccount {
    pub fn new(details: Details) -> Self {
        Self {
            details,
            language: None,
            state: AccountState::default(),
            roles: Vec::new(),
            params: Map::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateAccount {
    pub details: Option<Details>,
    pub language: Option<String>,
    pub state: Option<AccountState>,
    /// Merged into the existing params; a `null` value removes the key.
    pub params: Option<Map<String, JsonValue>>,
    pub last_visit: Option<DateTime<Utc>>,
}

pub struct AccountsManager<S, B> {
    executor: Arc<TransactionExecutor<S, B>>,
}

impl<S, B> AccountsManager<S, B>
where
    S: AccountsStore,
    B: EventBus<EntityMessage>,
{
    pub fn new(executor: Arc<TransactionExecutor<S, B>>) -> Self {
        Self { executor }
    }

    pub fn create(&self, input: CreateAccount) -> Result<Account, CommitError> {
        let mut tx = Transaction::new();
        let id = self.stage_create(&mut tx, input)?;
        self.commit_and_reload(tx, id)
    }

    /// Stage a new account. Default roles are resolved at commit time.
    pub fn stage_create(&self, tx: &mut Transaction, input: CreateAccount) -> Result<AccountId, CommitError> {
        let mut account = Account::new(AccountId::new(), input.details, Utc::now())
            .with_roles(input.roles);
        if let Some(language) = input.language {
            account.set_language(&language)?;
        }
        account.set_state(input.state);
        for (key, value) in input.params {
            account.set_param(key, value);
        }

        let id = *account.id();
        tx.persist_account(account);
        Ok(id)
    }

    /// Create a service account carrying the configured module roles.
    pub fn create_module_account(&self, details: Details) -> Result<Account, CommitError> {
        let names = &self.executor.config().module_default_roles;
        let roles = self
            .executor
            .read(|q| {
                names
                    .iter()
                    .map(|name| {
                        q.find_role_by_name(name).map(|r| *r.id()).ok_or_else(|| {
                            tracing::error!(role = %name, "module default role is missing");
                            DomainError::configuration(format!("role {name} is not created"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })??;

        self.create(CreateAccount::new(details).with_roles(roles))
    }

    pub fn update(&self, id: AccountId, input: UpdateAccount) -> Result<Account, CommitError> {
        let mut tx = Transaction::new();
        self.stage_update(&mut tx, id, input)?;
        self.commit_and_reload(tx, id)
    }

    pub fn stage_update(
        &self,
        tx: &mut Transaction,
        id: AccountId,
        input: UpdateAccount,
    ) -> Result<AccountId, CommitError> {
        let mut account = self.current(tx, &id)?;
        if let Some(details) = input.details {
            account.set_details(details);
        }
        if let Some(language) = input.language {
            account.set_language(&language)?;
        }
        if let Some(state) = input.state {
            account.set_state(state);
        }
        for (key, value) in input.params.unwrap_or_default() {
            if value.is_null() {
                account.remove_param(&key);
            } else {
                account.set_param(key, value);
            }
        }
        if let Some(at) = input.last_visit {
            account.record_visit(at);
        }
        tx.persist_account(account);
        Ok(id)
    }

    /// Replace the role set. An empty set falls back to the default roles.
    pub fn set_roles(
        &self,
        id: AccountId,
        roles: impl IntoIterator<Item = RoleId>,
    ) -> Result<Account, CommitError> {
        let mut tx = Transaction::new();
        self.stage_set_roles(&mut tx, id, roles)?;
        self.commit_and_reload(tx, id)
    }

    pub fn stage_set_roles(
        &self,
        tx: &mut Transaction,
        id: AccountId,
        roles: impl IntoIterator<Item = RoleId>,
    ) -> Result<AccountId, CommitError> {
        let mut account = self.current(tx, &id)?;
        account.set_roles(roles);
        tx.persist_account(account);
        Ok(id)
    }

    /// Delete an account and its emails.
    pub fn delete(&self, id: AccountId) -> Result<(), CommitError> {
        let mut tx = Transaction::new();
        self.stage_delete(&mut tx, id)?;
        self.executor.commit(tx)?;
        Ok(())
    }

    pub fn stage_delete(&self, tx: &mut Transaction, id: AccountId) -> Result<(), CommitError> {
        self.current(tx, &id)?;
        tx.remove_account(id);
        Ok(())
    }

    fn current(&self, tx: &Transaction, id: &AccountId) -> Result<Account, CommitError> {
        if let Some(account) = tx.account(id) {
            return Ok(account.clone());
        }
        self.executor
            .read(|q| q.find_account(id).cloned())?
            .ok_or_else(|| DomainError::not_found(Account::KIND, id).into())
    }

    /// Commit and return the committed copy (with default roles applied).
    fn commit_and_reload(&self, tx: Transaction, id: AccountId) -> Result<Account, CommitError> {
        self.executor.commit(tx)?;
        self.executor
            .read(|q| q.find_account(&id).cloned())?
            .ok_or_else(|| DomainError::not_found(Account::KIND, id).into())
    }
}

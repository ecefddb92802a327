//! Account entity and personal details.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use accounts_core::{AccountId, DomainError, DomainResult, Entity, RoleId, ValueObject};

const NAME_MAX_LENGTH: usize = 100;

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AccountState {
    #[default]
    Active,
    Blocked,
    Deleted,
    NotActivated,
    ApprovalWaiting,
}

impl core::fmt::Display for AccountState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AccountState::Active => "active",
            AccountState::Blocked => "blocked",
            AccountState::Deleted => "deleted",
            AccountState::NotActivated => "notActivated",
            AccountState::ApprovalWaiting => "approvalWaiting",
        };
        f.write_str(s)
    }
}

/// Personal name of the account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Details {
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
}

impl ValueObject for Details {}

impl Details {
    pub fn new(first_name: &str, last_name: &str) -> DomainResult<Self> {
        Ok(Self {
            first_name: validate_name("first name", first_name)?,
            last_name: validate_name("last name", last_name)?,
            middle_name: None,
        })
    }

    pub fn with_middle_name(mut self, middle_name: &str) -> DomainResult<Self> {
        self.middle_name = Some(validate_name("middle name", middle_name)?);
        Ok(self)
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn middle_name(&self) -> Option<&str> {
        self.middle_name.as_deref()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn validate_name(field: &str, value: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > NAME_MAX_LENGTH {
        return Err(DomainError::validation(format!(
            "{field} cannot be longer than {NAME_MAX_LENGTH} characters"
        )));
    }
    Ok(value.to_string())
}

/// A user (or module) account.
///
/// Holds references to roles (no ownership). Emails are owned by the account
/// but stored separately and linked back through [`Email::account_id`](crate::Email::account_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    details: Details,
    language: String,
    params: Map<String, Value>,
    state: AccountState,
    roles: BTreeSet<RoleId>,
    last_visit: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Account {
    pub const DEFAULT_LANGUAGE: &'static str = "en";

    pub fn new(id: AccountId, details: Details, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            details,
            language: Self::DEFAULT_LANGUAGE.to_string(),
            params: Map::new(),
            state: AccountState::default(),
            roles: BTreeSet::new(),
            last_visit: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.set_roles(roles);
        self
    }

    pub fn name(&self) -> String {
        self.details.full_name()
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn set_details(&mut self, details: Details) {
        self.details = details;
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: &str) -> DomainResult<()> {
        let language = language.trim();
        if language.is_empty() {
            return Err(DomainError::validation("language cannot be empty"));
        }
        self.language = language.to_lowercase();
        Ok(())
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: Value) {
        self.params.insert(key.into(), value);
    }

    pub fn remove_param(&mut self, key: &str) -> Option<Value> {
        self.params.remove(key)
    }

    pub fn state(&self) -> AccountState {
        self.state
    }

    pub fn set_state(&mut self, state: AccountState) {
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state == AccountState::Active
    }

    pub fn roles(&self) -> &BTreeSet<RoleId> {
        &self.roles
    }

    pub fn set_roles(&mut self, roles: impl IntoIterator<Item = RoleId>) {
        self.roles = roles.into_iter().collect();
    }

    /// Returns `false` when the role was already assigned.
    pub fn add_role(&mut self, role: RoleId) -> bool {
        self.roles.insert(role)
    }

    pub fn remove_role(&mut self, role: &RoleId) -> bool {
        self.roles.remove(role)
    }

    pub fn has_role(&self, role: &RoleId) -> bool {
        self.roles.contains(role)
    }

    pub fn last_visit(&self) -> Option<DateTime<Utc>> {
        self.last_visit
    }

    pub fn record_visit(&mut self, at: DateTime<Utc>) {
        self.last_visit = Some(at);
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Entity for Account {
    type Id = AccountId;
    const KIND: &'static str = "account";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

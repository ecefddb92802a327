//! Unit of work: staged writes, field-level change sets and the pending
//! change set handed to commit rules.
//!
//! ```text
//! Transaction (caller stages persist/remove)
//!   ↓ prepare (diff against committed state, cascade role removal and renames)
//! PendingChanges
//!   ↓ commit rules (before_insert, before_flush)
//!   ↓ apply to a copy of the committed state
//! CommitReport + EntityMessages
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use accounts_auth::{Account, Email, Role};
use accounts_core::{AccountId, DomainError, DomainResult, EmailId, Entity, RoleId};
use accounts_events::{EntityAction, EntityMessage};

use crate::executor::CommitReport;
use crate::store::{AccountsQuery, StoreState};

// ─── Field-level changes ─────────────────────────────────────────────────────

/// Old and new value of one serialized field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub old: JsonValue,
    pub new: JsonValue,
}

impl FieldChange {
    pub fn new(old: impl Into<JsonValue>, new: impl Into<JsonValue>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }

    pub fn is_transition(&self, from: &JsonValue, to: &JsonValue) -> bool {
        &self.old == from && &self.new == to
    }
}

/// Field name → change, for one entity in one transaction.
///
/// Inserted entities report every non-null field with `old = null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff the serialized form of `after` against `before`.
    pub fn between<T: Serialize>(before: Option<&T>, after: &T) -> DomainResult<Self> {
        let old = match before {
            Some(before) => to_object(before)?,
            None => Map::new(),
        };
        let new = to_object(after)?;

        let mut changes = BTreeMap::new();
        for (field, new_value) in new {
            let old_value = old.get(&field).cloned().unwrap_or(JsonValue::Null);
            if old_value != new_value {
                changes.insert(field, FieldChange::new(old_value, new_value));
            }
        }
        Ok(Self(changes))
    }

    pub fn with(mut self, field: impl Into<String>, change: FieldChange) -> Self {
        self.insert(field, change);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, change: FieldChange) {
        self.0.insert(field.into(), change);
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Write the new values onto `entity` through its serialized form.
    pub fn apply_to<T: Serialize + DeserializeOwned>(&self, entity: &T) -> DomainResult<T> {
        let mut object = to_object(entity)?;
        for (field, change) in &self.0 {
            object.insert(field.clone(), change.new.clone());
        }
        serde_json::from_value(JsonValue::Object(object)).map_err(tracking_error)
    }
}

fn to_object<T: Serialize>(value: &T) -> DomainResult<Map<String, JsonValue>> {
    match serde_json::to_value(value).map_err(tracking_error)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(DomainError::invariant(format!(
            "change tracking expects an object, got {other}"
        ))),
    }
}

fn tracking_error(err: serde_json::Error) -> DomainError {
    DomainError::invariant(format!("change tracking failed: {err}"))
}

// ─── Scheduled entities ──────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
}

/// An entity pending in the current transaction together with its committed
/// form (if any) and its change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled<T> {
    before: Option<T>,
    entity: T,
    changes: ChangeSet,
}

impl<T: Serialize> Scheduled<T> {
    pub fn new(before: Option<T>, entity: T) -> DomainResult<Self> {
        let changes = ChangeSet::between(before.as_ref(), &entity)?;
        Ok(Self {
            before,
            entity,
            changes,
        })
    }

    pub fn operation(&self) -> Operation {
        match self.before {
            Some(_) => Operation::Update,
            None => Operation::Insert,
        }
    }

    pub fn is_insert(&self) -> bool {
        self.before.is_none()
    }

    pub fn before(&self) -> Option<&T> {
        self.before.as_ref()
    }

    pub fn entity(&self) -> &T {
        &self.entity
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Mutate the pending entity; the change set is recomputed.
    pub fn modify(&mut self, f: impl FnOnce(&mut T)) -> DomainResult<()> {
        f(&mut self.entity);
        self.changes = ChangeSet::between(self.before.as_ref(), &self.entity)?;
        Ok(())
    }

    fn is_noop(&self) -> bool {
        !self.is_insert() && self.changes.is_empty()
    }

    fn into_entity(self) -> T {
        self.entity
    }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// Writes staged by the caller, committed all-or-nothing by
/// [`TransactionExecutor::commit`](crate::executor::TransactionExecutor::commit).
///
/// Persisting an entity twice keeps the latest copy. Persisting and removing
/// the same entity keeps whichever happened last.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    roles: Vec<Role>,
    accounts: Vec<Account>,
    emails: Vec<Email>,
    removed_roles: Vec<RoleId>,
    removed_accounts: Vec<AccountId>,
    removed_emails: Vec<EmailId>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persist_role(&mut self, role: Role) -> &mut Self {
        self.removed_roles.retain(|id| id != role.id());
        stage(&mut self.roles, role);
        self
    }

    pub fn remove_role(&mut self, id: RoleId) -> &mut Self {
        self.roles.retain(|r| r.id() != &id);
        push_unique(&mut self.removed_roles, id);
        self
    }

    pub fn persist_account(&mut self, account: Account) -> &mut Self {
        self.removed_accounts.retain(|id| id != account.id());
        stage(&mut self.accounts, account);
        self
    }

    pub fn remove_account(&mut self, id: AccountId) -> &mut Self {
        self.accounts.retain(|a| a.id() != &id);
        push_unique(&mut self.removed_accounts, id);
        self
    }

    pub fn persist_email(&mut self, email: Email) -> &mut Self {
        self.removed_emails.retain(|id| id != email.id());
        stage(&mut self.emails, email);
        self
    }

    pub fn remove_email(&mut self, id: EmailId) -> &mut Self {
        self.emails.retain(|e| e.id() != &id);
        push_unique(&mut self.removed_emails, id);
        self
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| r.id() == id)
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id() == id)
    }

    pub fn email(&self, id: &EmailId) -> Option<&Email> {
        self.emails.iter().find(|e| e.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
            && self.accounts.is_empty()
            && self.emails.is_empty()
            && self.removed_roles.is_empty()
            && self.removed_accounts.is_empty()
            && self.removed_emails.is_empty()
    }
}

fn stage<T: Entity>(staged: &mut Vec<T>, entity: T) {
    match staged.iter().position(|e| e.id() == entity.id()) {
        Some(idx) => staged[idx] = entity,
        None => staged.push(entity),
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

// ─── Pending change set ──────────────────────────────────────────────────────

/// The transaction as seen by commit rules: scheduled insertions/updates with
/// change sets, removals, and supplementary field updates.
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    pub(crate) roles: Vec<Scheduled<Role>>,
    pub(crate) accounts: Vec<Scheduled<Account>>,
    pub(crate) emails: Vec<Scheduled<Email>>,
    pub(crate) removed_roles: BTreeSet<RoleId>,
    pub(crate) removed_accounts: Vec<AccountId>,
    pub(crate) removed_emails: Vec<EmailId>,
    pub(crate) supplementary: Vec<(EmailId, ChangeSet)>,
}

impl PendingChanges {
    /// Diff staged writes against `committed` and expand role removal into
    /// account updates. Holders of a renamed role are scheduled unchanged so
    /// commit rules see them; unchanged accounts are not written.
    pub fn prepare(tx: Transaction, committed: &StoreState) -> DomainResult<Self> {
        let removed_roles: BTreeSet<RoleId> = tx.removed_roles.iter().copied().collect();
        let mut pending = Self {
            removed_roles,
            removed_accounts: tx.removed_accounts,
            removed_emails: tx.removed_emails,
            ..Self::default()
        };

        for role in tx.roles {
            let before = committed.find_role(role.id()).cloned();
            schedule(&mut pending.roles, before, role)?;
        }

        for mut account in tx.accounts {
            for role in &pending.removed_roles {
                account.remove_role(role);
            }
            let before = committed.find_account(account.id()).cloned();
            schedule(&mut pending.accounts, before, account)?;
        }

        // Accounts that only lose a removed role become updates, so default
        // roles are re-assigned to those left empty.
        for role in &pending.removed_roles {
            for holder in committed.accounts_in_role(role) {
                let id = *holder.id();
                if pending.removed_accounts.contains(&id)
                    || pending.accounts.iter().any(|s| s.entity().id() == &id)
                {
                    continue;
                }
                let mut account = holder.clone();
                for removed in &pending.removed_roles {
                    account.remove_role(removed);
                }
                schedule(&mut pending.accounts, Some(holder.clone()), account)?;
            }
        }

        // Holders of a renamed role are checked again against the new name.
        let renamed: Vec<RoleId> = pending
            .roles
            .iter()
            .filter(|s| !s.is_insert() && s.changes().contains("name"))
            .map(|s| *s.entity().id())
            .collect();
        for role in &renamed {
            for holder in committed.accounts_in_role(role) {
                let id = *holder.id();
                if pending.removed_accounts.contains(&id)
                    || pending.accounts.iter().any(|s| s.entity().id() == &id)
                {
                    continue;
                }
                pending
                    .accounts
                    .push(Scheduled::new(Some(holder.clone()), holder.clone())?);
            }
        }

        for email in tx.emails {
            let before = committed.find_email(email.id()).cloned();
            schedule(&mut pending.emails, before, email)?;
        }

        Ok(pending)
    }

    pub fn roles(&self) -> &[Scheduled<Role>] {
        &self.roles
    }

    pub fn accounts(&self) -> &[Scheduled<Account>] {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut [Scheduled<Account>] {
        &mut self.accounts
    }

    pub fn emails(&self) -> &[Scheduled<Email>] {
        &self.emails
    }

    pub fn emails_mut(&mut self) -> &mut [Scheduled<Email>] {
        &mut self.emails
    }

    pub fn removed_roles(&self) -> &BTreeSet<RoleId> {
        &self.removed_roles
    }

    pub fn is_account_removed(&self, id: &AccountId) -> bool {
        self.removed_accounts.contains(id)
    }

    pub fn removed_emails(&self) -> &[EmailId] {
        &self.removed_emails
    }

    pub fn is_email_removed(&self, id: &EmailId) -> bool {
        self.removed_emails.contains(id)
    }

    pub fn supplementary(&self) -> &[(EmailId, ChangeSet)] {
        &self.supplementary
    }

    pub fn change_set_of_email(&self, id: &EmailId) -> Option<&ChangeSet> {
        self.emails
            .iter()
            .find(|s| s.entity().id() == id)
            .map(Scheduled::changes)
    }

    /// Fold an extra field update on a committed email into this transaction.
    ///
    /// Applied after every scheduled write, without running commit rules again.
    pub fn schedule_supplementary_update(&mut self, email: EmailId, changes: ChangeSet) {
        match self.supplementary.iter_mut().find(|(id, _)| *id == email) {
            Some((_, existing)) => existing.0.extend(changes.0),
            None => self.supplementary.push((email, changes)),
        }
    }

    /// Write everything into `state`.
    ///
    /// `state` is a scratch copy: on error the caller discards it.
    pub(crate) fn apply(self, state: &mut StoreState, at: DateTime<Utc>) -> DomainResult<CommitReport> {
        let mut report = CommitReport::default();

        for scheduled in self.roles {
            let action = action_of(&scheduled);
            let mut role = scheduled.into_entity();
            if action == EntityAction::Updated {
                role.touch(at);
            }
            state.put_role(role.clone())?;
            report.record(message(&role, action, at)?);
        }

        for id in &self.removed_roles {
            let role = state.delete_role(id)?;
            report.record(message(&role, EntityAction::Deleted, at)?);
        }

        for id in &self.removed_emails {
            let email = state.delete_email(id)?;
            report.record(message(&email, EntityAction::Deleted, at)?);
        }

        for id in &self.removed_accounts {
            let (account, emails) = state.delete_account(id)?;
            for email in &emails {
                report.record(message(email, EntityAction::Deleted, at)?);
            }
            report.record(message(&account, EntityAction::Deleted, at)?);
        }

        for scheduled in self.accounts {
            if scheduled.is_noop() {
                continue;
            }
            let action = action_of(&scheduled);
            let mut account = scheduled.into_entity();
            if action == EntityAction::Updated {
                account.touch(at);
            }
            state.put_account(account.clone())?;
            report.record(message(&account, action, at)?);
        }

        for scheduled in self.emails {
            let action = action_of(&scheduled);
            let mut email = scheduled.into_entity();
            if action == EntityAction::Updated {
                email.touch(at);
            }
            state.put_email(email.clone())?;
            report.record(message(&email, action, at)?);
        }

        for (id, changes) in &self.supplementary {
            let current = state
                .find_email(id)
                .ok_or_else(|| DomainError::not_found(Email::KIND, id))?;
            let mut email = changes.apply_to(current)?;
            email.touch(at);
            state.put_email(email.clone())?;
            report.supplementary += 1;
            report.record(message(&email, EntityAction::Updated, at)?);
        }

        Ok(report)
    }
}

fn schedule<T: Serialize>(list: &mut Vec<Scheduled<T>>, before: Option<T>, entity: T) -> DomainResult<()> {
    let scheduled = Scheduled::new(before, entity)?;
    if !scheduled.is_noop() {
        list.push(scheduled);
    }
    Ok(())
}

fn action_of<T: Serialize>(scheduled: &Scheduled<T>) -> EntityAction {
    match scheduled.operation() {
        Operation::Insert => EntityAction::Created,
        Operation::Update => EntityAction::Updated,
    }
}

fn message<T>(entity: &T, action: EntityAction, at: DateTime<Utc>) -> DomainResult<EntityMessage>
where
    T: Entity + Serialize,
    T::Id: Copy + Into<Uuid>,
{
    let payload = serde_json::to_value(entity).map_err(tracking_error)?;
    Ok(EntityMessage::new(T::KIND, (*entity.id()).into(), action, at, payload))
}

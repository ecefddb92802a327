use std::collections::HashMap;

use accounts_auth::{Account, AccountState, Email, EmailAddress, Role, RoleName, RoleTree};
use accounts_core::{AccountId, DomainError, DomainResult, EmailId, Entity, RoleId};

use super::query::AccountsQuery;

/// Snapshot of all committed roles, accounts and emails.
///
/// Mutators enforce what a relational schema would: unique email addresses,
/// unique `(parent, name)` roles, and that referenced roles and accounts
/// exist. Cross-entity business rules live in [`crate::rules`].
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    roles: RoleTree,
    accounts: HashMap<AccountId, Account>,
    account_order: Vec<AccountId>,
    emails: HashMap<EmailId, Email>,
    addresses: HashMap<EmailAddress, EmailId>,
    first_administrator: Option<AccountId>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn email_count(&self) -> usize {
        self.emails.len()
    }

    /// Accounts in insertion order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.account_order.iter().filter_map(|id| self.accounts.get(id))
    }

    pub fn emails(&self) -> impl Iterator<Item = &Email> {
        self.emails.values()
    }

    // ─── Mutators (used on a scratch copy during commit) ─────────────────

    pub(crate) fn put_role(&mut self, role: Role) -> DomainResult<()> {
        self.roles.upsert(role)
    }

    pub(crate) fn delete_role(&mut self, id: &RoleId) -> DomainResult<Role> {
        let role = self
            .roles
            .remove(id)
            .ok_or_else(|| DomainError::not_found(Role::KIND, id))?;
        for account in self.accounts.values_mut() {
            account.remove_role(id);
        }
        self.refresh_first_administrator();
        Ok(role)
    }

    pub(crate) fn put_account(&mut self, account: Account) -> DomainResult<()> {
        if let Some(missing) = account.roles().iter().find(|r| !self.roles.contains(r)) {
            return Err(DomainError::not_found(Role::KIND, missing));
        }

        let id = *account.id();
        if self.accounts.insert(id, account).is_none() {
            self.account_order.push(id);
        }
        self.refresh_first_administrator();
        Ok(())
    }

    /// Delete an account together with its emails.
    pub(crate) fn delete_account(&mut self, id: &AccountId) -> DomainResult<(Account, Vec<Email>)> {
        let account = self
            .accounts
            .remove(id)
            .ok_or_else(|| DomainError::not_found(Account::KIND, id))?;
        self.account_order.retain(|a| a != id);

        let owned: Vec<EmailId> = self
            .emails
            .values()
            .filter(|e| e.account_id() == *id)
            .map(|e| *e.id())
            .collect();
        let mut emails = Vec::with_capacity(owned.len());
        for email_id in owned {
            emails.push(self.delete_email(&email_id)?);
        }
        emails.sort_by_key(|e| *e.id());

        self.refresh_first_administrator();
        Ok((account, emails))
    }

    pub(crate) fn put_email(&mut self, email: Email) -> DomainResult<()> {
        let account = email.account_id();
        if !self.accounts.contains_key(&account) {
            return Err(DomainError::not_found(Account::KIND, account));
        }

        let id = *email.id();
        if let Some(owner) = self.addresses.get(email.address()) {
            if *owner != id {
                return Err(DomainError::EmailTaken {
                    address: email.address().to_string(),
                });
            }
        }

        if let Some(previous) = self.emails.get(&id) {
            if previous.address() != email.address() {
                self.addresses.remove(previous.address());
            }
        }
        self.addresses.insert(email.address().clone(), id);
        self.emails.insert(id, email);
        Ok(())
    }

    pub(crate) fn delete_email(&mut self, id: &EmailId) -> DomainResult<Email> {
        let email = self
            .emails
            .remove(id)
            .ok_or_else(|| DomainError::not_found(Email::KIND, id))?;
        self.addresses.remove(email.address());
        Ok(email)
    }

    /// Keep the marker while it still points at an administrator; otherwise
    /// move it to the earliest remaining one.
    fn refresh_first_administrator(&mut self) {
        let Some(admin) = self.roles.find_by_name(&RoleName::Administrator).map(|r| *r.id()) else {
            self.first_administrator = None;
            return;
        };

        let still_valid = self
            .first_administrator
            .and_then(|id| self.accounts.get(&id))
            .is_some_and(|a| a.has_role(&admin));
        if !still_valid {
            self.first_administrator = self.find_account_in_role(&admin).map(|a| *a.id());
        }
    }
}

impl AccountsQuery for StoreState {
    fn roles(&self) -> &RoleTree {
        &self.roles
    }

    fn find_account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    fn find_account_in_role(&self, role: &RoleId) -> Option<&Account> {
        self.accounts().find(|a| a.has_role(role))
    }

    fn accounts_in_role(&self, role: &RoleId) -> Vec<&Account> {
        self.accounts().filter(|a| a.has_role(role)).collect()
    }

    fn accounts_in_state(&self, state: AccountState) -> Vec<&Account> {
        self.accounts().filter(|a| a.state() == state).collect()
    }

    fn find_email(&self, id: &EmailId) -> Option<&Email> {
        self.emails.get(id)
    }

    fn find_email_by_address(&self, address: &EmailAddress) -> Option<&Email> {
        self.addresses.get(address).and_then(|id| self.emails.get(id))
    }

    fn account_emails(&self, account: &AccountId) -> Vec<&Email> {
        let mut emails: Vec<&Email> = self
            .emails
            .values()
            .filter(|e| e.account_id() == *account)
            .collect();
        emails.sort_by_key(|e| *e.id());
        emails
    }

    fn first_administrator(&self) -> Option<&Account> {
        self.first_administrator.and_then(|id| self.accounts.get(&id))
    }
}

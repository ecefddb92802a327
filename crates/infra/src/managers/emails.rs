use std::sync::Arc;

use chrono::Utc;

use accounts_auth::{Account, Email, EmailAddress, Visibility};
use accounts_core::{AccountId, DomainError, EmailId, Entity};
use accounts_events::{EntityMessage, EventBus};

use crate::executor::{CommitError, TransactionExecutor};
use crate::store::AccountsStore;
use crate::unit_of_work::Transaction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEmail {
    pub account: AccountId,
    pub address: String,
    pub default: bool,
    pub visibility: Visibility,
}

impl CreateEmail {
    pub fn new(account: AccountId, address: impl Into<String>) -> Self {
        Self {
            account,
            address: address.into(),
            default: false,
            visibility: Visibility::default(),
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateEmail {
    pub default: Option<bool>,
    pub verified: Option<bool>,
    pub visibility: Option<Visibility>,
}

pub struct EmailsManager<S, B> {
    executor: Arc<TransactionExecutor<S, B>>,
}

impl<S, B> EmailsManager<S, B>
where
    S: AccountsStore,
    B: EventBus<EntityMessage>,
{
    pub fn new(executor: Arc<TransactionExecutor<S, B>>) -> Self {
        Self { executor }
    }

    pub fn create(&self, input: CreateEmail) -> Result<Email, CommitError> {
        let mut tx = Transaction::new();
        let id = self.stage_create(&mut tx, input)?;
        self.commit_and_reload(tx, id)
    }

    pub fn stage_create(&self, tx: &mut Transaction, input: CreateEmail) -> Result<EmailId, CommitError> {
        let address = EmailAddress::parse(&input.address)?;
        let account_known = tx.account(&input.account).is_some()
            || self.executor.read(|q| q.find_account(&input.account).is_some())?;
        if !account_known {
            return Err(DomainError::not_found(Account::KIND, input.account).into());
        }

        let mut email = Email::new(EmailId::new(), input.account, address, Utc::now());
        email.set_default(input.default);
        email.set_visibility(input.visibility);

        let id = *email.id();
        tx.persist_email(email);
        Ok(id)
    }

    pub fn update(&self, id: EmailId, input: UpdateEmail) -> Result<Email, CommitError> {
        let mut tx = Transaction::new();
        self.stage_update(&mut tx, id, input)?;
        self.commit_and_reload(tx, id)
    }

    pub fn stage_update(&self, tx: &mut Transaction, id: EmailId, input: UpdateEmail) -> Result<(), CommitError> {
        let mut email = self.current(tx, &id)?;
        if let Some(default) = input.default {
            email.set_default(default);
        }
        if let Some(verified) = input.verified {
            email.set_verified(verified);
        }
        if let Some(visibility) = input.visibility {
            email.set_visibility(visibility);
        }
        tx.persist_email(email);
        Ok(())
    }

    /// Change the default flag. Making an email default clears it on the
    /// account's other emails; clearing it directly is rejected at commit.
    pub fn set_default(&self, id: EmailId, default: bool) -> Result<Email, CommitError> {
        self.update(
            id,
            UpdateEmail {
                default: Some(default),
                ..UpdateEmail::default()
            },
        )
    }

    pub fn stage_set_default(&self, tx: &mut Transaction, id: EmailId, default: bool) -> Result<(), CommitError> {
        self.stage_update(
            tx,
            id,
            UpdateEmail {
                default: Some(default),
                ..UpdateEmail::default()
            },
        )
    }

    /// Begin verification with a caller-generated hash.
    pub fn start_verification(&self, id: EmailId, hash: &str) -> Result<Email, CommitError> {
        let mut tx = Transaction::new();
        let mut email = self.current(&tx, &id)?;
        email.start_verification(hash, Utc::now());
        tx.persist_email(email);
        self.commit_and_reload(tx, id)
    }

    pub fn complete_verification(&self, id: EmailId, hash: &str) -> Result<Email, CommitError> {
        let mut tx = Transaction::new();
        let mut email = self.current(&tx, &id)?;
        email.complete_verification(hash, Utc::now())?;
        tx.persist_email(email);
        self.commit_and_reload(tx, id)
    }

    pub fn delete(&self, id: EmailId) -> Result<(), CommitError> {
        let mut tx = Transaction::new();
        self.stage_delete(&mut tx, id)?;
        self.executor.commit(tx)?;
        Ok(())
    }

    pub fn stage_delete(&self, tx: &mut Transaction, id: EmailId) -> Result<(), CommitError> {
        self.current(tx, &id)?;
        tx.remove_email(id);
        Ok(())
    }

    fn current(&self, tx: &Transaction, id: &EmailId) -> Result<Email, CommitError> {
        if let Some(email) = tx.email(id) {
            return Ok(email.clone());
        }
        self.executor
            .read(|q| q.find_email(id).cloned())?
            .ok_or_else(|| DomainError::not_found(Email::KIND, id).into())
    }

    fn commit_and_reload(&self, tx: Transaction, id: EmailId) -> Result<Email, CommitError> {
        self.executor.commit(tx)?;
        self.executor
            .read(|q| q.find_email(&id).cloned())?
            .ok_or_else(|| DomainError::not_found(Email::KIND, id).into())
    }
}

#[cfg(test)]
mod tests {
    use accounts_core::ErrorKind;

    use super::*;
    use crate::testing::Fixture;

    #[test]
    fn create_normalizes_address() {
        let fixture = Fixture::bootstrapped();
        let emails = EmailsManager::new(fixture.executor.clone());

        let email = emails
            .create(CreateEmail::new(fixture.admin(), "  Second@Example.COM "))
            .unwrap();
        assert_eq!(email.address().as_str(), "second@example.com");
        assert!(!email.is_default());
    }

    #[test]
    fn create_for_unknown_account_is_not_found() {
        let fixture = Fixture::bootstrapped();
        let emails = EmailsManager::new(fixture.executor.clone());

        let err = emails
            .create(CreateEmail::new(AccountId::new(), "nobody@example.com"))
            .unwrap_err();
        assert_eq!(err.domain().map(DomainError::kind), Some(ErrorKind::NotFound));
    }

    #[test]
    fn malformed_address_is_a_validation_error() {
        let fixture = Fixture::bootstrapped();
        let emails = EmailsManager::new(fixture.executor.clone());

        let err = emails.create(CreateEmail::new(fixture.admin(), "not-an-email")).unwrap_err();
        assert_eq!(err.domain().map(DomainError::kind), Some(ErrorKind::Validation));
    }

    #[test]
    fn verification_round_trip() {
        let fixture = Fixture::bootstrapped();
        let emails = EmailsManager::new(fixture.executor.clone());
        let email = emails
            .create(CreateEmail::new(fixture.admin(), "verify@example.com"))
            .unwrap();

        emails.start_verification(*email.id(), "h4sh").unwrap();
        assert!(emails.complete_verification(*email.id(), "wrong").is_err());

        let verified = emails.complete_verification(*email.id(), "h4sh").unwrap();
        assert!(verified.is_verified());
        assert!(verified.verification_completed().is_some());
    }

    #[test]
    fn private_visibility_is_kept() {
        let fixture = Fixture::bootstrapped();
        let emails = EmailsManager::new(fixture.executor.clone());
        let email = emails
            .create(CreateEmail {
                visibility: Visibility::Private,
                ..CreateEmail::new(fixture.admin(), "hidden@example.com")
            })
            .unwrap();
        assert!(email.is_private());
    }
}

//! Email address entity owned by an account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use accounts_core::{AccountId, DomainError, DomainResult, EmailId, Entity, ValueObject};

/// Syntactically valid, lowercased email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl ValueObject for EmailAddress {}

impl EmailAddress {
    /// Storage column width.
    pub const MAX_LENGTH: usize = 150;

    pub fn parse(raw: &str) -> DomainResult<Self> {
        let candidate = raw.trim();
        if candidate.is_empty() {
            return Err(invalid("address cannot be empty"));
        }
        if candidate.chars().count() > Self::MAX_LENGTH {
            return Err(invalid("address is too long"));
        }

        let mut parts = candidate.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("address must contain exactly one '@'"));
        };
        validate_local_part(local)?;
        validate_domain(domain)?;

        Ok(Self(candidate.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }

    pub fn domain(&self) -> &str {
        self.0.rsplit('@').next().unwrap_or_default()
    }
}

fn invalid(reason: &str) -> DomainError {
    DomainError::validation(format!("invalid email address: {reason}"))
}

fn validate_local_part(local: &str) -> DomainResult<()> {
    const SPECIALS: &str = "!#$%&'*+/=?^_`{|}~.-";

    if local.is_empty() || local.len() > 64 {
        return Err(invalid("local part must be 1-64 characters"));
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err(invalid("misplaced '.' in local part"));
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SPECIALS.contains(c))
    {
        return Err(invalid("unsupported character in local part"));
    }
    Ok(())
}

fn validate_domain(domain: &str) -> DomainResult<()> {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid("domain must contain a '.'"));
    }
    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return Err(invalid("domain label must be 1-63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("domain label cannot start or end with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("unsupported character in domain"));
        }
    }
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid("top level domain must be alphabetic"));
    }
    Ok(())
}

impl TryFrom<String> for EmailAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl core::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who may see the address on the account profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// An email address record.
///
/// # Invariants (enforced at commit, not here)
/// - the address is unique across all email records
/// - at most one email per account is default
/// - the default email can only be replaced, never directly un-defaulted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    id: EmailId,
    account: AccountId,
    address: EmailAddress,
    default: bool,
    verified: bool,
    verification_hash: Option<String>,
    verification_created: Option<DateTime<Utc>>,
    verification_completed: Option<DateTime<Utc>>,
    visibility: Visibility,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Email {
    pub fn new(
        id: EmailId,
        account: AccountId,
        address: EmailAddress,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account,
            address,
            default: false,
            verified: false,
            verification_hash: None,
            verification_created: None,
            verification_completed: None,
            visibility: Visibility::default(),
            created_at,
            updated_at: created_at,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account
    }

    pub fn address(&self) -> &EmailAddress {
        &self.address
    }

    pub fn set_address(&mut self, address: EmailAddress) {
        self.address = address;
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn set_default(&mut self, default: bool) {
        self.default = default;
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn set_verified(&mut self, verified: bool) {
        self.verified = verified;
    }

    pub fn verification_hash(&self) -> Option<&str> {
        self.verification_hash.as_deref()
    }

    pub fn verification_created(&self) -> Option<DateTime<Utc>> {
        self.verification_created
    }

    pub fn verification_completed(&self) -> Option<DateTime<Utc>> {
        self.verification_completed
    }

    /// Begin (or restart) verification with a caller-generated hash.
    pub fn start_verification(&mut self, hash: impl Into<String>, at: DateTime<Utc>) {
        self.verification_hash = Some(hash.into());
        self.verification_created = Some(at);
        self.verification_completed = None;
        self.verified = false;
    }

    pub fn complete_verification(&mut self, hash: &str, at: DateTime<Utc>) -> DomainResult<()> {
        match self.verification_hash.as_deref() {
            Some(expected) if expected == hash => {
                self.verified = true;
                self.verification_completed = Some(at);
                Ok(())
            }
            Some(_) => Err(DomainError::validation("verification hash does not match")),
            None => Err(DomainError::invariant("verification was not started")),
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
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

impl Entity for Email {
    type Id = EmailId;
    const KIND: &'static str = "email";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

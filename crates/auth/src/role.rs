//! Role entity and role name classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use accounts_core::{DomainError, DomainResult, Entity, RoleId};

/// Maximum length of a role name.
pub const ROLE_NAME_MAX_LENGTH: usize = 100;

/// Role name, resolved once at the boundary.
///
/// Reserved names always map to their system variant; every other name is
/// `Custom`. Construct through [`RoleName::parse`] (or `From<&str>`) so that a
/// reserved name can never end up inside `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoleName {
    Administrator,
    User,
    Manager,
    Visitor,
    Anonymous,
    Custom(String),
}

impl RoleName {
    pub const ADMINISTRATOR: &'static str = "administrator";
    pub const USER: &'static str = "user";
    pub const MANAGER: &'static str = "manager";
    pub const VISITOR: &'static str = "visitor";
    pub const ANONYMOUS: &'static str = "anonymous";

    pub fn parse(name: &str) -> Self {
        match name {
            Self::ADMINISTRATOR => RoleName::Administrator,
            Self::USER => RoleName::User,
            Self::MANAGER => RoleName::Manager,
            Self::VISITOR => RoleName::Visitor,
            Self::ANONYMOUS => RoleName::Anonymous,
            other => RoleName::Custom(other.to_string()),
        }
    }

    /// Re-resolve a possibly hand-built `Custom` carrying a reserved name.
    pub fn normalized(self) -> Self {
        match self {
            RoleName::Custom(name) => Self::parse(&name),
            system => system,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoleName::Administrator => Self::ADMINISTRATOR,
            RoleName::User => Self::USER,
            RoleName::Manager => Self::MANAGER,
            RoleName::Visitor => Self::VISITOR,
            RoleName::Anonymous => Self::ANONYMOUS,
            RoleName::Custom(name) => name,
        }
    }

    /// Singleton roles can not be combined with any other role on one account.
    pub fn is_singleton(&self) -> bool {
        matches!(self, RoleName::Administrator | RoleName::User)
    }

    /// Visitor and anonymous describe unauthenticated callers and are never
    /// stored on an account.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, RoleName::Visitor | RoleName::Anonymous)
    }

    pub fn is_system(&self) -> bool {
        !matches!(self, RoleName::Custom(_))
    }

    pub fn is_administrator(&self) -> bool {
        matches!(self, RoleName::Administrator)
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, RoleName::Anonymous)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, RoleName::Manager | RoleName::User | RoleName::Visitor)
    }
}

impl From<&str> for RoleName {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for RoleName {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        match value {
            RoleName::Custom(name) => name,
            system => system.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the role hierarchy.
///
/// The parent is stored as a key only; children are derived by
/// [`RoleTree`](crate::RoleTree), which also validates placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: RoleName,
    description: String,
    parent: Option<RoleId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(
        id: RoleId,
        name: impl Into<RoleName>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = validate_name(name.into())?;
        Ok(Self {
            id,
            name,
            description: description.into(),
            parent: None,
            created_at,
            updated_at: created_at,
        })
    }

    pub fn with_parent(mut self, parent: Option<RoleId>) -> Self {
        self.parent = parent;
        self
    }

    pub fn name(&self) -> &RoleName {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<RoleName>) -> DomainResult<()> {
        self.name = validate_name(name.into())?;
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn parent(&self) -> Option<RoleId> {
        self.parent
    }

    /// Point this role at a new parent key.
    ///
    /// Placement (parent existence, cycles, sibling name clashes) is checked when
    /// the role is written into a [`RoleTree`](crate::RoleTree).
    pub fn set_parent(&mut self, parent: Option<RoleId>) {
        self.parent = parent;
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

    pub fn is_administrator(&self) -> bool {
        self.name.is_administrator()
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_anonymous()
    }

    pub fn is_authenticated(&self) -> bool {
        self.name.is_authenticated()
    }
}

impl Entity for Role {
    type Id = RoleId;
    const KIND: &'static str = "role";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.name, f)
    }
}

fn validate_name(name: RoleName) -> DomainResult<RoleName> {
    let name = name.normalized();
    let raw = name.as_str();
    if raw.trim().is_empty() {
        return Err(DomainError::validation("role name cannot be empty"));
    }
    if raw.chars().count() > ROLE_NAME_MAX_LENGTH {
        return Err(DomainError::validation(format!(
            "role name cannot be longer than {ROLE_NAME_MAX_LENGTH} characters"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_resolve_to_system_variants() {
        assert_eq!(RoleName::parse("administrator"), RoleName::Administrator);
        assert_eq!(RoleName::parse("user"), RoleName::User);
        assert_eq!(RoleName::parse("manager"), RoleName::Manager);
        assert_eq!(RoleName::parse("visitor"), RoleName::Visitor);
        assert_eq!(RoleName::parse("anonymous"), RoleName::Anonymous);
        assert_eq!(
            RoleName::parse("accountant"),
            RoleName::Custom("accountant".to_string())
        );
    }

    #[test]
    fn hand_built_custom_is_normalized_by_role() {
        let role = Role::new(
            RoleId::new(),
            RoleName::Custom("user".to_string()),
            "Registered user",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(role.name(), &RoleName::User);
    }

    #[test]
    fn classification_predicates() {
        assert!(RoleName::Administrator.is_singleton());
        assert!(RoleName::User.is_singleton());
        assert!(!RoleName::Manager.is_singleton());

        assert!(!RoleName::Visitor.is_assignable());
        assert!(!RoleName::Anonymous.is_assignable());
        assert!(RoleName::Manager.is_assignable());

        assert!(RoleName::Manager.is_authenticated());
        assert!(RoleName::User.is_authenticated());
        assert!(RoleName::Visitor.is_authenticated());
        assert!(!RoleName::Administrator.is_authenticated());
        assert!(!RoleName::Anonymous.is_authenticated());

        assert!(RoleName::Anonymous.is_anonymous());
        assert!(RoleName::Administrator.is_administrator());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&RoleName::Manager).unwrap();
        assert_eq!(json, "\"manager\"");

        let parsed: RoleName = serde_json::from_str("\"visitor\"").unwrap();
        assert_eq!(parsed, RoleName::Visitor);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Role::new(RoleId::new(), "  ", "blank", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = "x".repeat(ROLE_NAME_MAX_LENGTH + 1);
        assert!(Role::new(RoleId::new(), name.as_str(), "", Utc::now()).is_err());
    }
}

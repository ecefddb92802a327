//! Accounts module configuration.

use accounts_auth::{RoleName, RoleTree};
use accounts_core::{DomainError, DomainResult};

/// Runtime configuration of the accounts module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsConfig {
    /// Roles assigned to an account that is committed without any role.
    pub default_roles: Vec<RoleName>,
    /// Roles assigned to service (module) accounts.
    pub module_default_roles: Vec<RoleName>,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            default_roles: vec![RoleName::User],
            module_default_roles: vec![RoleName::User],
        }
    }
}

impl AccountsConfig {
    pub const DEFAULT_ROLES_ENV: &'static str = "ACCOUNTS_DEFAULT_ROLES";
    pub const MODULE_DEFAULT_ROLES_ENV: &'static str = "ACCOUNTS_MODULE_DEFAULT_ROLES";

    /// Load from process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, test fixtures, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            default_roles: read_role_list(&lookup, Self::DEFAULT_ROLES_ENV)
                .unwrap_or(defaults.default_roles),
            module_default_roles: read_role_list(&lookup, Self::MODULE_DEFAULT_ROLES_ENV)
                .unwrap_or(defaults.module_default_roles),
        }
    }

    pub fn with_default_roles(mut self, roles: impl IntoIterator<Item = RoleName>) -> Self {
        self.default_roles = roles.into_iter().collect();
        self
    }

    pub fn with_module_default_roles(mut self, roles: impl IntoIterator<Item = RoleName>) -> Self {
        self.module_default_roles = roles.into_iter().collect();
        self
    }

    /// Check that every configured role (and `administrator`) exists.
    pub fn validate(&self, roles: &RoleTree) -> DomainResult<()> {
        let administrator = RoleName::Administrator;
        let required = std::iter::once(&administrator)
            .chain(&self.default_roles)
            .chain(&self.module_default_roles);

        for name in required {
            if roles.find_by_name(name).is_none() {
                tracing::error!(role = %name, "configured role does not exist");
                return Err(DomainError::configuration(format!("role {name} is not created")));
            }
        }
        Ok(())
    }
}

fn read_role_list(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Vec<RoleName>> {
    let raw = lookup(key)?;
    match parse_role_list(&raw) {
        Some(roles) => Some(roles),
        None => {
            tracing::warn!(key, value = %raw, "ignoring malformed role list; using defaults");
            None
        }
    }
}

/// Comma separated, non-empty, and every entry assignable to an account.
fn parse_role_list(raw: &str) -> Option<Vec<RoleName>> {
    let mut roles: Vec<RoleName> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let name = RoleName::parse(part);
        if !name.is_assignable() {
            return None;
        }
        if !roles.contains(&name) {
            roles.push(name);
        }
    }
    (!roles.is_empty()).then_some(roles)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use accounts_auth::Role;
    use accounts_core::{ErrorKind, RoleId};
    use chrono::Utc;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_user_role() {
        let config = AccountsConfig::from_lookup(|_| None);
        assert_eq!(config, AccountsConfig::default());
        assert_eq!(config.default_roles, vec![RoleName::User]);
    }

    #[test]
    fn reads_comma_separated_lists() {
        let config = AccountsConfig::from_lookup(lookup(&[
            ("ACCOUNTS_DEFAULT_ROLES", " manager , editors,manager "),
            ("ACCOUNTS_MODULE_DEFAULT_ROLES", "administrator"),
        ]));
        assert_eq!(
            config.default_roles,
            vec![RoleName::Manager, RoleName::Custom("editors".to_string())]
        );
        assert_eq!(config.module_default_roles, vec![RoleName::Administrator]);
    }

    #[test]
    fn malformed_lists_fall_back() {
        let config = AccountsConfig::from_lookup(lookup(&[
            ("ACCOUNTS_DEFAULT_ROLES", " , ,"),
            ("ACCOUNTS_MODULE_DEFAULT_ROLES", "manager,visitor"),
        ]));
        assert_eq!(config, AccountsConfig::default());
    }

    #[test]
    fn validate_requires_administrator_and_defaults() {
        let now = Utc::now();
        let mut tree = RoleTree::new();
        tree.insert(Role::new(RoleId::new(), "user", "", now).unwrap())
            .unwrap();

        let err = AccountsConfig::default().validate(&tree).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        tree.insert(Role::new(RoleId::new(), "administrator", "", now).unwrap())
            .unwrap();
        AccountsConfig::default().validate(&tree).unwrap();

        let err = AccountsConfig::default()
            .with_default_roles([RoleName::Manager])
            .validate(&tree)
            .unwrap_err();
        assert_eq!(err, DomainError::configuration("role manager is not created"));
    }
}

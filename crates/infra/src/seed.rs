//! Installation of the built-in role hierarchy.

use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;

use accounts_auth::{Role, RoleName};
use accounts_core::{Entity, RoleId};
use accounts_events::{EntityMessage, EventBus};

use crate::executor::TransactionExecutor;
use crate::store::AccountsStore;
use crate::unit_of_work::Transaction;

/// Ids of the built-in roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemRoles {
    pub administrator: RoleId,
    pub user: RoleId,
    pub manager: RoleId,
    pub visitor: RoleId,
    pub anonymous: RoleId,
}

/// `(name, parent, description)` in creation order.
fn system_roles() -> [(RoleName, Option<RoleName>, &'static str); 5] {
    [
        (RoleName::Anonymous, None, "Unauthenticated caller"),
        (RoleName::Visitor, None, "Authenticated caller without an account role"),
        (RoleName::User, None, "Regular account"),
        (RoleName::Manager, Some(RoleName::User), "Account managing other accounts"),
        (RoleName::Administrator, None, "Full access"),
    ]
}

/// Create whichever built-in roles are missing, in one transaction, then check
/// the executor's [`AccountsConfig`](crate::AccountsConfig) against the
/// installed roles.
///
/// Existing roles are left as they are, so calling this repeatedly is safe.
/// A configured role that still does not exist fails with
/// [`DomainError::Configuration`](accounts_core::DomainError::Configuration).
pub fn ensure_system_roles<S, B>(executor: &TransactionExecutor<S, B>) -> anyhow::Result<SystemRoles>
where
    S: AccountsStore,
    B: EventBus<EntityMessage>,
{
    let now = Utc::now();
    let mut ids: HashMap<RoleName, RoleId> = HashMap::new();
    let mut tx = Transaction::new();

    for (name, parent, description) in system_roles() {
        let existing = executor
            .read(|q| q.find_role_by_name(&name).map(|r| *r.id()))
            .context("failed to read existing roles")?;
        if let Some(id) = existing {
            ids.insert(name, id);
            continue;
        }

        let parent = parent
            .map(|p| lookup(&ids, &p))
            .transpose()?;
        let role = Role::new(RoleId::new(), name.clone(), description, now)?.with_parent(parent);
        ids.insert(name, *role.id());
        tx.persist_role(role);
    }

    let report = executor
        .commit(tx)
        .context("failed to install system roles")?;
    tracing::info!(created = report.inserted, "system roles ready");

    executor
        .read(|q| executor.config().validate(q.roles()))
        .context("failed to read installed roles")?
        .context("accounts configuration does not match installed roles")?;

    Ok(SystemRoles {
        administrator: lookup(&ids, &RoleName::Administrator)?,
        user: lookup(&ids, &RoleName::User)?,
        manager: lookup(&ids, &RoleName::Manager)?,
        visitor: lookup(&ids, &RoleName::Visitor)?,
        anonymous: lookup(&ids, &RoleName::Anonymous)?,
    })
}

fn lookup(ids: &HashMap<RoleName, RoleId>, name: &RoleName) -> anyhow::Result<RoleId> {
    ids.get(name)
        .copied()
        .with_context(|| format!("system role {name} was not resolved"))
}

#[cfg(test)]
mod tests {
    use accounts_core::DomainError;

    use crate::config::AccountsConfig;
    use crate::testing;

    use super::*;

    #[test]
    fn installs_hierarchy_once() {
        let (executor, _bus) = testing::executor(AccountsConfig::default());
        let first = ensure_system_roles(&executor).unwrap();
        let second = ensure_system_roles(&executor).unwrap();
        assert_eq!(first, second);

        executor
            .read(|q| {
                assert_eq!(q.roles().len(), 5);
                assert_eq!(q.roles().parent(&first.manager).map(|r| *r.id()), Some(first.user));
                assert!(q.find_role(&first.administrator).unwrap().parent().is_none());
            })
            .unwrap();

        let config = executor.config();
        executor.read(|q| config.validate(q.roles())).unwrap().unwrap();
    }

    #[test]
    fn rejects_configured_roles_that_do_not_exist() {
        let config = AccountsConfig::default().with_default_roles([RoleName::parse("editors")]);
        let (executor, _bus) = testing::executor(config);

        let err = ensure_system_roles(&executor).unwrap_err();
        let domain = err.downcast_ref::<DomainError>().unwrap();
        assert_eq!(domain, &DomainError::configuration("role editors is not created"));
    }
}

use accounts_auth::RoleName;
use accounts_core::{DomainError, DomainResult, Entity};

use super::{CommitRule, FlushContext};

/// The first account ever committed must be an administrator.
///
/// Evaluated per inserted account against committed state only: two accounts
/// inserted in one transaction do not satisfy each other. An account without
/// roles is judged by the default roles it will receive.
#[derive(Debug, Default, Clone, Copy)]
pub struct BootstrapRule;

impl CommitRule for BootstrapRule {
    fn name(&self) -> &'static str {
        "bootstrap"
    }

    fn before_insert(&self, ctx: &mut FlushContext<'_>) -> DomainResult<()> {
        let inserted: Vec<_> = ctx
            .pending()
            .accounts()
            .iter()
            .filter(|s| s.is_insert())
            .map(|s| (*s.entity().id(), s.entity().roles().clone()))
            .collect();
        if inserted.is_empty() {
            return Ok(());
        }

        let query = ctx.query();
        let Some(administrator) = query.find_role_by_name(&RoleName::Administrator) else {
            tracing::error!("administrator role is missing");
            return Err(DomainError::configuration(format!(
                "role {} is not created",
                RoleName::Administrator
            )));
        };
        let administrator = *administrator.id();

        if query.find_account_in_role(&administrator).is_some() {
            return Ok(());
        }

        for (account, roles) in inserted {
            let effective = if roles.is_empty() { ctx.default_roles()? } else { roles };
            if !effective.contains(&administrator) {
                tracing::debug!(%account, "no administrator exists yet");
                return Err(DomainError::BootstrapViolation);
            }
        }
        Ok(())
    }
}

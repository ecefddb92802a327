use accounts_auth::Role;
use accounts_core::{DomainError, DomainResult, Entity};

use super::{CommitRule, FlushContext};

/// Role assignment invariants for every inserted or updated account:
///
/// - an account without roles receives the configured default roles
/// - a singleton role (administrator, user) is the only role on its account
/// - visitor and anonymous are never assigned
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleConsistencyRule;

impl CommitRule for RoleConsistencyRule {
    fn name(&self) -> &'static str {
        "role_consistency"
    }

    fn before_flush(&self, ctx: &mut FlushContext<'_>) -> DomainResult<()> {
        for idx in 0..ctx.pending().accounts().len() {
            if ctx.pending().accounts()[idx].entity().roles().is_empty() {
                let defaults = ctx.default_roles()?;
                let scheduled = &mut ctx.pending_mut().accounts_mut()[idx];
                tracing::debug!(account = %scheduled.entity().id(), "assigning default roles");
                scheduled.modify(|account| account.set_roles(defaults))?;
            }

            let roles = ctx.pending().accounts()[idx].entity().roles();
            for id in roles {
                let role = ctx
                    .resolve_role(id)
                    .ok_or_else(|| DomainError::not_found(Role::KIND, id))?;
                let name = role.name();

                if name.is_singleton() && roles.len() > 1 {
                    return Err(DomainError::RoleConflict {
                        role: name.to_string(),
                    });
                }
                if !name.is_assignable() {
                    return Err(DomainError::RoleNotAssignable {
                        role: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

use serde_json::Value as JsonValue;

use accounts_auth::Email;
use accounts_core::{DomainError, DomainResult, EmailId, Entity};

use super::{CommitRule, FlushContext};
use crate::unit_of_work::{ChangeSet, FieldChange};

const DEFAULT_FIELD: &str = "default";

/// At most one default email per account, and a default email is only ever
/// replaced, never switched off on its own.
///
/// Making an email default clears the flag on its siblings: pending siblings
/// are modified in place, committed ones get a supplementary update. When two
/// emails of one account are made default together, the first one staged wins.
///
/// Switching a default email off, or deleting it, is accepted only when the
/// same transaction makes another email of that account default. Deleting the
/// account itself takes its emails along.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEmailRule;

impl DefaultEmailRule {
    fn reject_downgrades(ctx: &FlushContext<'_>) -> DomainResult<()> {
        let emails = ctx.pending().emails();
        for scheduled in emails {
            let downgraded = scheduled
                .changes()
                .get(DEFAULT_FIELD)
                .is_some_and(|c| c.is_transition(&JsonValue::Bool(true), &JsonValue::Bool(false)));
            if !downgraded {
                continue;
            }

            let email = scheduled.entity();
            if !Self::is_replaced(ctx, email) {
                return Err(DomainError::DefaultEmailDowngrade {
                    address: email.address().to_string(),
                });
            }
        }
        Ok(())
    }

    fn reject_deletions(ctx: &FlushContext<'_>) -> DomainResult<()> {
        let pending = ctx.pending();
        for id in pending.removed_emails() {
            let Some(email) = ctx.query().find_email(id) else {
                continue;
            };
            if !email.is_default() || pending.is_account_removed(&email.account_id()) {
                continue;
            }
            if !Self::is_replaced(ctx, email) {
                return Err(DomainError::DefaultEmailNotDeletable {
                    address: email.address().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Another email of the same account is made default in this transaction.
    fn is_replaced(ctx: &FlushContext<'_>, email: &Email) -> bool {
        ctx.pending().emails().iter().any(|other| {
            other.entity().id() != email.id()
                && other.entity().account_id() == email.account_id()
                && other.entity().is_default()
                && other.changes().contains(DEFAULT_FIELD)
        })
    }

    fn clear_siblings(ctx: &mut FlushContext<'_>, idx: usize) -> DomainResult<()> {
        let (id, account) = {
            let email = ctx.pending().emails()[idx].entity();
            (*email.id(), email.account_id())
        };

        for (other, scheduled) in ctx.pending_mut().emails_mut().iter_mut().enumerate() {
            let sibling = scheduled.entity();
            if other != idx && sibling.account_id() == account && sibling.is_default() {
                tracing::debug!(email = %sibling.id(), "clearing default flag on pending sibling");
                scheduled.modify(|e| e.set_default(false))?;
            }
        }

        let pending = ctx.pending();
        let committed: Vec<EmailId> = ctx
            .query()
            .account_emails(&account)
            .into_iter()
            .filter(|e| e.is_default() && *e.id() != id)
            .map(|e| *e.id())
            .filter(|sid| {
                !pending.is_email_removed(sid)
                    && !pending.emails().iter().any(|s| s.entity().id() == sid)
            })
            .collect();

        for sibling in committed {
            tracing::debug!(email = %sibling, "scheduling default flag clear on committed sibling");
            ctx.pending_mut().schedule_supplementary_update(
                sibling,
                ChangeSet::new().with(DEFAULT_FIELD, FieldChange::new(true, false)),
            );
        }
        Ok(())
    }
}

impl CommitRule for DefaultEmailRule {
    fn name(&self) -> &'static str {
        "default_email"
    }

    fn before_flush(&self, ctx: &mut FlushContext<'_>) -> DomainResult<()> {
        Self::reject_downgrades(ctx)?;
        Self::reject_deletions(ctx)?;

        for idx in 0..ctx.pending().emails().len() {
            let scheduled = &ctx.pending().emails()[idx];
            let promoted =
                scheduled.entity().is_default() && scheduled.changes().contains(DEFAULT_FIELD);
            if promoted {
                Self::clear_siblings(ctx, idx)?;
            }
        }
        Ok(())
    }
}

use std::collections::HashSet;

use accounts_core::{DomainError, DomainResult, Entity};

use super::{CommitRule, FlushContext};

/// Inserted email addresses must not exist yet, in committed state or
/// elsewhere in the same transaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmailUniquenessRule;

impl CommitRule for EmailUniquenessRule {
    fn name(&self) -> &'static str {
        "email_uniqueness"
    }

    fn before_insert(&self, ctx: &mut FlushContext<'_>) -> DomainResult<()> {
        let query = ctx.query();
        let mut seen = HashSet::new();

        for scheduled in ctx.pending().emails().iter().filter(|s| s.is_insert()) {
            let email = scheduled.entity();
            let taken = query
                .find_email_by_address(email.address())
                .is_some_and(|existing| existing.id() != email.id());

            if taken || !seen.insert(email.address()) {
                return Err(DomainError::EmailTaken {
                    address: email.address().to_string(),
                });
            }
        }
        Ok(())
    }
}

//! Transaction execution pipeline.
//!
//! ```text
//! Transaction
//!   ↓
//! 1. Prepare pending changes against committed state (under the write lock)
//!   ↓
//! 2. Run `before_insert` of every rule, then `before_flush` of every rule
//!   ↓
//! 3. Apply to a copy of the committed state; swap it in
//!   ↓
//! 4. Publish entity messages to the bus
//! ```
//!
//! Any rule or integrity failure in steps 1-3 rejects the whole transaction
//! and leaves committed state untouched. A failure in step 4 is reported as
//! [`CommitError::Publish`]; the state is already committed by then.

use chrono::Utc;
use thiserror::Error;

use accounts_core::DomainError;
use accounts_events::{EntityAction, EntityMessage, EventBus};

use crate::config::AccountsConfig;
use crate::rules::{CommitRule, FlushContext, default_rules};
use crate::store::{AccountsQuery, AccountsStore, StoreError};
use crate::unit_of_work::{PendingChanges, Transaction};

#[derive(Debug, Error)]
pub enum CommitError {
    /// A rule or storage constraint rejected the transaction.
    #[error(transparent)]
    Rejected(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Publication failed after a successful commit (at-least-once; a retry may duplicate).
    #[error("committed, but publishing failed: {0}")]
    Publish(String),
}

impl CommitError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            CommitError::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Supplementary updates scheduled by rules (also counted in `updated`).
    pub supplementary: usize,
    pub messages: Vec<EntityMessage>,
}

impl CommitReport {
    pub(crate) fn record(&mut self, message: EntityMessage) {
        match message.action() {
            EntityAction::Created => self.inserted += 1,
            EntityAction::Updated => self.updated += 1,
            EntityAction::Deleted => self.deleted += 1,
        }
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Commits [`Transaction`]s through the commit rules into a store, then
/// publishes what changed.
///
/// - `S`: committed-state store
/// - `B`: bus receiving one [`EntityMessage`] per changed entity
pub struct TransactionExecutor<S, B> {
    store: S,
    bus: B,
    config: AccountsConfig,
    rules: Vec<Box<dyn CommitRule>>,
}

impl<S, B> TransactionExecutor<S, B> {
    pub fn new(store: S, bus: B, config: AccountsConfig) -> Self {
        Self::with_rules(store, bus, config, default_rules())
    }

    pub fn with_rules(
        store: S,
        bus: B,
        config: AccountsConfig,
        rules: Vec<Box<dyn CommitRule>>,
    ) -> Self {
        Self {
            store,
            bus,
            config,
            rules,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> TransactionExecutor<S, B>
where
    S: AccountsStore,
    B: EventBus<EntityMessage>,
{
    /// Read committed state.
    pub fn read<R>(&self, f: impl FnOnce(&dyn AccountsQuery) -> R) -> Result<R, CommitError> {
        Ok(self.store.read(|state| f(state))?)
    }

    /// Commit `tx` atomically.
    pub fn commit(&self, tx: Transaction) -> Result<CommitReport, CommitError> {
        if tx.is_empty() {
            return Ok(CommitReport::default());
        }

        let now = Utc::now();
        let report = self.store.write(|current| {
            let mut pending = PendingChanges::prepare(tx, current)?;
            self.run_rules(current, &mut pending)?;

            let mut next = current.clone();
            let report = pending
                .apply(&mut next, now)
                .inspect_err(|e| log_rejection("storage", e))?;
            Ok::<_, CommitError>((next, report))
        })?;

        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            supplementary = report.supplementary,
            "transaction committed"
        );

        for message in &report.messages {
            self.bus
                .publish(message.clone())
                .map_err(|e| CommitError::Publish(format!("{e:?}")))?;
        }
        Ok(report)
    }

    fn run_rules(&self, current: &dyn AccountsQuery, pending: &mut PendingChanges) -> Result<(), DomainError> {
        let mut ctx = FlushContext::new(current, &self.config, pending);

        for rule in &self.rules {
            tracing::debug!(rule = rule.name(), hook = "before_insert", "running commit rule");
            rule.before_insert(&mut ctx).inspect_err(|e| log_rejection(rule.name(), e))?;
        }
        for rule in &self.rules {
            tracing::debug!(rule = rule.name(), hook = "before_flush", "running commit rule");
            rule.before_flush(&mut ctx).inspect_err(|e| log_rejection(rule.name(), e))?;
        }
        Ok(())
    }
}

fn log_rejection(rule: &str, err: &DomainError) {
    if err.kind().is_user_error() {
        tracing::warn!(rule, error = %err, "transaction rejected");
    } else {
        tracing::error!(rule, error = %err, "transaction rejected by configuration error");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use accounts_core::DomainResult;
    use accounts_events::{Event, InMemoryEventBus, Subscription};

    use super::*;
    use crate::store::InMemoryAccountsStore;
    use crate::testing::{self, Fixture};

    #[test]
    fn empty_transaction_is_a_noop() {
        let fixture = Fixture::seeded();
        let subscription = fixture.bus.subscribe();

        let report = fixture.executor.commit(Transaction::new()).unwrap();
        assert!(report.is_empty());
        assert!(subscription.drain().is_empty());
    }

    #[test]
    fn commit_publishes_one_message_per_entity() {
        let fixture = Fixture::seeded();
        let subscription = fixture.bus.subscribe();

        let admin = testing::account(&[fixture.roles.administrator]);
        let mut tx = Transaction::new();
        tx.persist_account(admin.clone());
        tx.persist_email(testing::default_email(&admin, "admin@example.com"));

        let report = fixture.executor.commit(tx).unwrap();
        assert_eq!(report.inserted, 2);

        let keys: Vec<String> = subscription.drain().iter().map(|m| m.routing_key()).collect();
        assert_eq!(keys, vec!["accounts.account.created", "accounts.email.created"]);
    }

    struct Reject;

    impl CommitRule for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn before_flush(&self, _ctx: &mut FlushContext<'_>) -> DomainResult<()> {
            Err(DomainError::invariant("nope"))
        }
    }

    struct CountHooks(Arc<AtomicUsize>);

    impl CommitRule for CountHooks {
        fn name(&self) -> &'static str {
            "count"
        }

        fn before_insert(&self, _ctx: &mut FlushContext<'_>) -> DomainResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn before_flush(&self, _ctx: &mut FlushContext<'_>) -> DomainResult<()> {
            self.0.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn rejection_leaves_state_and_bus_untouched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = testing::seeded_state().0;
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription: Subscription<EntityMessage> = bus.subscribe();
        let executor = TransactionExecutor::with_rules(
            InMemoryAccountsStore::with_state(state),
            bus.clone(),
            AccountsConfig::default(),
            vec![Box::new(CountHooks(calls.clone())), Box::new(Reject)],
        );

        let mut tx = Transaction::new();
        tx.persist_role(testing::role("editor"));
        let err = executor.commit(tx).unwrap_err();

        assert!(matches!(err, CommitError::Rejected(DomainError::InvariantViolation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert!(subscription.drain().is_empty());
        assert!(
            executor
                .read(|q| q.find_role_by_name(&"editor".into()).is_none())
                .unwrap()
        );
    }
}

//! `accounts-infra` — committed-state storage, the unit of work, commit rules
//! and the management surface of the accounts module.
//!
//! Writes flow through [`executor::TransactionExecutor`]: staged changes are
//! diffed against committed state, checked by the [`rules`], applied
//! atomically and announced on the event bus.

pub mod config;
pub mod executor;
pub mod managers;
pub mod rules;
pub mod seed;
pub mod store;
pub mod unit_of_work;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AccountsConfig;
pub use executor::{CommitError, CommitReport, TransactionExecutor};
pub use store::{AccountsQuery, AccountsStore, InMemoryAccountsStore, StoreError, StoreState};
pub use unit_of_work::{ChangeSet, FieldChange, Operation, PendingChanges, Scheduled, Transaction};

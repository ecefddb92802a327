//! Committed-state storage.
//!
//! The store owns the committed [`StoreState`]. Writers receive the current
//! state and return a replacement; the swap happens only on success, so a
//! rejected transaction never leaves partial writes behind.

pub mod in_memory;
pub mod query;
pub mod state;

use std::sync::Arc;

use thiserror::Error;

pub use in_memory::InMemoryAccountsStore;
pub use query::AccountsQuery;
pub use state::StoreState;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,
}

/// Access to committed accounts state.
///
/// `write` must serialise writers for the whole closure: a commit reads the
/// state, runs its rules and produces the next state under one exclusive
/// section.
pub trait AccountsStore: Send + Sync {
    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> Result<R, StoreError>;

    fn write<R, E>(
        &self,
        f: impl FnOnce(&StoreState) -> Result<(StoreState, R), E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>;
}

impl<S> AccountsStore for Arc<S>
where
    S: AccountsStore,
{
    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> Result<R, StoreError> {
        (**self).read(f)
    }

    fn write<R, E>(
        &self,
        f: impl FnOnce(&StoreState) -> Result<(StoreState, R), E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        (**self).write(f)
    }
}

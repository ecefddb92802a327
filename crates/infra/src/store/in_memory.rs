use std::sync::RwLock;

use super::{AccountsStore, StoreError, StoreState};

/// In-memory accounts store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAccountsStore {
    state: RwLock<StoreState>,
}

impl InMemoryAccountsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

impl AccountsStore for InMemoryAccountsStore {
    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> Result<R, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&state))
    }

    fn write<R, E>(
        &self,
        f: impl FnOnce(&StoreState) -> Result<(StoreState, R), E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let (next, result) = f(&state)?;
        *state = next;
        Ok(result)
    }
}

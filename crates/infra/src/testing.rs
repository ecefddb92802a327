//! Shared fixtures for unit and integration tests.

use std::sync::Arc;

use chrono::Utc;

use accounts_auth::{Account, Details, Email, EmailAddress, Role};
use accounts_core::{AccountId, EmailId, Entity, RoleId};
use accounts_events::{EntityMessage, InMemoryEventBus};

use crate::config::AccountsConfig;
use crate::executor::TransactionExecutor;
use crate::seed::{SystemRoles, ensure_system_roles};
use crate::store::{InMemoryAccountsStore, StoreState};
use crate::unit_of_work::Transaction;

pub type TestBus = InMemoryEventBus<EntityMessage>;
pub type TestExecutor = TransactionExecutor<Arc<InMemoryAccountsStore>, Arc<TestBus>>;

pub fn executor(config: AccountsConfig) -> (Arc<TestExecutor>, Arc<TestBus>) {
    accounts_observability::init_for_tests();
    let bus = Arc::new(TestBus::new());
    let store = Arc::new(InMemoryAccountsStore::new());
    (Arc::new(TransactionExecutor::new(store, bus.clone(), config)), bus)
}

pub fn details() -> Details {
    Details::new("Jane", "Doe").unwrap()
}

pub fn role(name: &str) -> Role {
    Role::new(RoleId::new(), name, "", Utc::now()).unwrap()
}

pub fn account(roles: &[RoleId]) -> Account {
    Account::new(AccountId::new(), details(), Utc::now()).with_roles(roles.iter().copied())
}

pub fn email(owner: &Account, address: &str) -> Email {
    Email::new(
        EmailId::new(),
        *owner.id(),
        EmailAddress::parse(address).unwrap(),
        Utc::now(),
    )
}

pub fn default_email(owner: &Account, address: &str) -> Email {
    let mut email = email(owner, address);
    email.set_default(true);
    email
}

/// Committed state holding only the system roles (manager under user).
pub fn seeded_state() -> (StoreState, SystemRoles) {
    let mut state = StoreState::new();
    let user = role("user");
    let manager = role("manager").with_parent(Some(*user.id()));
    let roles = SystemRoles {
        administrator: RoleId::new(),
        user: *user.id(),
        manager: *manager.id(),
        visitor: RoleId::new(),
        anonymous: RoleId::new(),
    };
    let now = Utc::now();
    state.put_role(user).unwrap();
    state.put_role(manager).unwrap();
    for (id, name) in [
        (roles.administrator, "administrator"),
        (roles.visitor, "visitor"),
        (roles.anonymous, "anonymous"),
    ] {
        state.put_role(Role::new(id, name, "", now).unwrap()).unwrap();
    }
    (state, roles)
}

pub struct Fixture {
    pub executor: Arc<TestExecutor>,
    pub bus: Arc<TestBus>,
    pub roles: SystemRoles,
    admin: Option<AccountId>,
}

impl Fixture {
    /// System roles installed, no accounts.
    pub fn seeded() -> Self {
        Self::seeded_with(AccountsConfig::default())
    }

    pub fn seeded_with(config: AccountsConfig) -> Self {
        let (executor, bus) = executor(config);
        let roles = ensure_system_roles(&executor).unwrap();
        Self {
            executor,
            bus,
            roles,
            admin: None,
        }
    }

    /// Seeded plus an administrator account owning `root@example.com` (default).
    pub fn bootstrapped() -> Self {
        Self::bootstrapped_with(AccountsConfig::default())
    }

    pub fn bootstrapped_with(config: AccountsConfig) -> Self {
        let mut fixture = Self::seeded_with(config);
        let admin = account(&[fixture.roles.administrator]);
        let mut tx = Transaction::new();
        tx.persist_account(admin.clone());
        tx.persist_email(default_email(&admin, "root@example.com"));
        fixture.executor.commit(tx).unwrap();
        fixture.admin = Some(*admin.id());
        fixture
    }

    pub fn admin(&self) -> AccountId {
        self.admin.expect("fixture is not bootstrapped")
    }
}

//! `accounts-auth` — roles, accounts and email addresses.
//!
//! This crate is intentionally decoupled from HTTP and storage. Entities here
//! only guard their own field-level rules; cross-entity invariants (bootstrap
//! administrator, role combinations, single default email) are enforced by
//! the commit rules in `accounts-infra`.

pub mod account;
pub mod email;
pub mod role;
pub mod role_tree;

pub use account::{Account, AccountState, Details};
pub use email::{Email, EmailAddress, Visibility};
pub use role::{Role, RoleName};
pub use role_tree::RoleTree;

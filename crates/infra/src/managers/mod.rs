//! Management operations over roles, accounts and emails.
//!
//! Every operation comes in two forms: `op` commits its own transaction,
//! `stage_op` adds the same change to a caller-owned [`Transaction`] so
//! several writes can be committed together.
//!
//! [`Transaction`]: crate::unit_of_work::Transaction

pub mod accounts;
pub mod emails;
pub mod roles;

pub use accounts::{AccountsManager, CreateAccount, UpdateAccount};
pub use emails::{CreateEmail, EmailsManager, UpdateEmail};
pub use roles::{CreateRole, RolesManager, UpdateRole};

//! `accounts-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the accounts module
//! (identifiers, entity/value-object markers, the error taxonomy).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{AccountId, EmailId, RoleId};
pub use value_object::ValueObject;

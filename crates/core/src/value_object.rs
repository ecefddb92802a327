//! Value object trait: equality by value, not identity.
//!
//! Value objects have **no identity**. An account's personal details or a
//! normalized email address are defined entirely by their attribute values.

/// Marker trait for value objects.
///
/// ## Value Object vs Entity
///
/// - **Value Object**: no identity (`Details { first_name: "Jane", .. }` equals any
///   other details with the same names)
/// - **Entity**: has identity (two `Account`s with the same `AccountId` are the same
///   account)
///
/// Value objects are replaced, not mutated: to change an account's name, build new
/// `Details` and assign them.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Details {
///     first_name: String,
///     last_name: String,
/// }
///
/// impl ValueObject for Details {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

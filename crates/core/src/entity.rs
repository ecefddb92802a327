//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Roles, accounts and emails are entities: two instances with the same id are
/// the same record, even when their attributes differ (e.g. a pending update vs
/// the committed row).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Stable entity name used in messages and errors (e.g. "account").
    const KIND: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

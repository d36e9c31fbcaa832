//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Products, orders and users are entities: two records with the same id are
/// the same record even if their fields differ (e.g. before and after a
/// catalog update).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

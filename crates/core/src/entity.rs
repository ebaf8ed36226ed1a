//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// A transaction is an entity: two records with the same amount and kind are
/// still different transactions when their ids differ.
pub trait Entity {
    /// Identifier type.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

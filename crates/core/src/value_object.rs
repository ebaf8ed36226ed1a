//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; to
/// "change" one, build a new one. In the ledger, a transaction kind is a
/// value object while a transaction (which carries an id) is an [`Entity`].
///
/// [`Entity`]: crate::Entity
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

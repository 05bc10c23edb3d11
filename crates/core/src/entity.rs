//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Products, carts, orders and stock alerts are all entities: two copies with
/// the same identifier describe the same thing, even when their state differs.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

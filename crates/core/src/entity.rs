//! Entity trait: identity + continuity across state changes.

/// Marker + minimal interface for stored domain entities.
///
/// Everything persisted here (principals, organisations, templates,
/// appeals, responses) is an entity: identified by a strongly-typed id,
/// equal to itself across mutations.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

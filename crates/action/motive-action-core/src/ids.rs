//! Identifiers for arena-allocated actions and scheduling domains.

use serde::{Deserialize, Serialize};

/// Generational handle to an action stored in a [`Stage`](crate::stage::Stage).
///
/// An id outlives the action it names: once the action is destroyed the id
/// simply stops resolving. Holders (registry entries, cross-thread handles)
/// must treat a non-resolving id as "action gone", not as an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ActionId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a{}v{}", self.index, self.generation)
    }
}

/// Identifies one scheduling domain (one scheduling thread + its action trees).
///
/// Targets report the domain they belong to; attaching a target from a
/// different domain is refused.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub u32);

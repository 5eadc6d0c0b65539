//! Link validation.
//!
//! # Responsibility
//! - Decide whether a proposed parent -> child link may be created.
//!
//! # Invariants
//! - Validation never mutates the index or the store.
//! - The in-memory index is consulted first; the durable parent is checked
//!   only when the index has none, to catch divergence.

use crate::graph::link_index::LinkIndex;
use crate::model::identity::Identity;
use crate::repo::gateway::{PersistenceGateway, StoreError};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reasons a proposed link is refused.
#[derive(Debug)]
pub enum GuardError {
    /// Parent and child are the same item.
    SelfLink(Identity),
    /// Child already has a parent, in memory or durably.
    DuplicateParent { child: Identity, parent: Identity },
    /// Child is already an ancestor of the parent.
    Cycle { parent: Identity, child: Identity },
    /// Durable parent lookup failed.
    Store(StoreError),
}

impl Display for GuardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfLink(id) => write!(f, "item cannot be linked to itself: {id}"),
            Self::DuplicateParent { child, parent } => {
                write!(f, "item {child} already has parent {parent}")
            }
            Self::Cycle { parent, child } => {
                write!(f, "link {parent} -> {child} would create a cycle")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GuardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for GuardError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Stateless link validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyGuard {
    reject_cycles: bool,
}

impl ConsistencyGuard {
    pub fn new(reject_cycles: bool) -> Self {
        Self { reject_cycles }
    }

    pub fn rejects_cycles(&self) -> bool {
        self.reject_cycles
    }

    /// Checks a proposed `parent -> child` link.
    ///
    /// Identity equality compares both id and kind, so `R1 -> S1` is not a
    /// self link.
    pub fn validate<G: PersistenceGateway + ?Sized>(
        &self,
        index: &LinkIndex,
        gateway: &G,
        parent: Identity,
        child: Identity,
    ) -> Result<(), GuardError> {
        if parent == child {
            return Err(GuardError::SelfLink(child));
        }

        if let Some(existing) = index.parent_link_of(child) {
            return Err(GuardError::DuplicateParent {
                child,
                parent: existing.parent,
            });
        }
        if let Some(durable) = gateway.parent_of(child)? {
            return Err(GuardError::DuplicateParent {
                child,
                parent: durable,
            });
        }

        if self.reject_cycles && is_ancestor(index, child, parent) {
            return Err(GuardError::Cycle { parent, child });
        }
        Ok(())
    }
}

/// Whether `candidate` appears on the parent chain starting at `start`.
fn is_ancestor(index: &LinkIndex, candidate: Identity, start: Identity) -> bool {
    let mut visited = HashSet::new();
    let mut cursor = Some(start);
    while let Some(current) = cursor {
        if current == candidate {
            return true;
        }
        if !visited.insert(current) {
            return false;
        }
        cursor = index.parent_link_of(current).map(|link| link.parent);
    }
    false
}

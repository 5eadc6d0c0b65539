//! Directed parent -> child association between two items.

use crate::model::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One edge of the link graph.
///
/// Visual geometry is owned by the presentation layer and is not part of the
/// link; see `graph::geometry` for the computed endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub parent: Identity,
    pub child: Identity,
}

impl Link {
    pub fn new(parent: Identity, child: Identity) -> Self {
        Self { parent, child }
    }

    /// Returns whether `id` is either endpoint.
    pub fn touches(&self, id: Identity) -> bool {
        self.parent == id || self.child == id
    }

    /// Returns the endpoint opposite to `id`, or `None` if `id` is not an
    /// endpoint.
    pub fn other_end(&self, id: Identity) -> Option<Identity> {
        if self.parent == id {
            Some(self.child)
        } else if self.child == id {
            Some(self.parent)
        } else {
            None
        }
    }

    pub fn is_self_link(&self) -> bool {
        self.parent == self.child
    }
}

impl Display for Link {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.parent, self.child)
    }
}

//! In-memory registry of live items.
//!
//! # Invariants
//! - At most one entry per `Identity`; registering again replaces in place.
//! - The registry never talks to storage; callers hand it fetched items.

use crate::model::identity::Identity;
use crate::model::item::Item;
use std::collections::HashMap;

/// Resolves identities to cached item attributes.
#[derive(Debug, Default, Clone)]
pub struct ItemRegistry {
    items: HashMap<Identity, Item>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached item for `id`.
    pub fn resolve(&self, id: Identity) -> Option<&Item> {
        self.items.get(&id)
    }

    pub(crate) fn resolve_mut(&mut self, id: Identity) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    /// Inserts or replaces the entry for `item.identity()`.
    ///
    /// Returns the previous entry when one was replaced.
    pub fn register(&mut self, item: Item) -> Option<Item> {
        self.items.insert(item.identity(), item)
    }

    /// Removes the entry for `id`.
    pub fn evict(&mut self, id: Identity) -> Option<Item> {
        self.items.remove(&id)
    }

    pub fn contains(&self, id: Identity) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every registered identity, each exactly once, in unspecified order.
    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.items.keys().copied()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.values()
    }

    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = &mut Item> + '_ {
        self.items.values_mut()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl FromIterator<Item> for ItemRegistry {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        let mut registry = Self::new();
        for item in iter {
            registry.register(item);
        }
        registry
    }
}

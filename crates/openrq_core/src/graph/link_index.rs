//! Bidirectional adjacency index over links.
//!
//! # Responsibility
//! - Answer "which links touch this item" from both the parent and the child
//!   side in O(1) lookups.
//!
//! # Invariants
//! - Symmetry: a link listed under one endpoint is listed under the other.
//! - No key maps to an empty list.
//! - List order carries no meaning; removal swaps with the last element.

use crate::model::identity::Identity;
use crate::model::link::Link;
use std::collections::HashMap;

/// Adjacency lists keyed by endpoint identity.
#[derive(Debug, Default, Clone)]
pub struct LinkIndex {
    adjacency: HashMap<Identity, Vec<Link>>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links where `id` is either endpoint.
    ///
    /// The view borrows the index, so it always reflects the current state.
    pub fn links_of(&self, id: Identity) -> impl Iterator<Item = &Link> + '_ {
        self.adjacency.get(&id).into_iter().flatten()
    }

    /// The link that has `child` as its child endpoint, if any.
    pub fn parent_link_of(&self, child: Identity) -> Option<&Link> {
        self.links_of(child).find(|link| link.child == child)
    }

    /// Children of `parent`, in adjacency order.
    pub fn children_of(&self, parent: Identity) -> impl Iterator<Item = Identity> + '_ {
        self.links_of(parent)
            .filter(move |link| link.parent == parent)
            .map(|link| link.child)
    }

    pub fn has_parent(&self, child: Identity) -> bool {
        self.parent_link_of(child).is_some()
    }

    pub fn contains(&self, link: &Link) -> bool {
        self.links_of(link.parent).any(|candidate| candidate == link)
    }

    /// Every link exactly once.
    pub fn iter(&self) -> impl Iterator<Item = &Link> + '_ {
        self.adjacency
            .iter()
            .flat_map(|(key, links)| links.iter().filter(move |link| link.parent == *key))
    }

    pub fn link_count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Appends `link` under both endpoints.
    ///
    /// Callers must have run the consistency guard first.
    pub(crate) fn insert(&mut self, link: Link) {
        self.adjacency.entry(link.parent).or_default().push(link);
        if !link.is_self_link() {
            self.adjacency.entry(link.child).or_default().push(link);
        }
    }

    /// Removes `link` from both endpoint lists.
    ///
    /// Returns `false` when the link was not present.
    pub fn remove(&mut self, link: &Link) -> bool {
        let removed = self.detach(link.parent, link);
        if removed && !link.is_self_link() {
            self.detach(link.child, link);
        }
        removed
    }

    /// Removes every link touching `id`, including the symmetric entries
    /// stored under the other endpoints, and returns them.
    pub fn remove_all_for(&mut self, id: Identity) -> Vec<Link> {
        let drained = self.adjacency.remove(&id).unwrap_or_default();
        for link in &drained {
            if let Some(other) = link.other_end(id).filter(|other| *other != id) {
                self.detach(other, link);
            }
        }
        drained
    }

    pub fn clear(&mut self) {
        self.adjacency.clear();
    }

    fn detach(&mut self, key: Identity, link: &Link) -> bool {
        let Some(links) = self.adjacency.get_mut(&key) else {
            return false;
        };
        let Some(position) = links.iter().position(|candidate| candidate == link) else {
            return false;
        };
        links.swap_remove(position);
        if links.is_empty() {
            self.adjacency.remove(&key);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::LinkIndex;
    use crate::model::identity::Identity;
    use crate::model::link::Link;
    use std::collections::HashSet;

    fn r(id: i64) -> Identity {
        Identity::requirement(id)
    }

    fn links_of(index: &LinkIndex, id: Identity) -> HashSet<Link> {
        index.links_of(id).copied().collect()
    }

    #[test]
    fn insert_lists_link_under_both_endpoints() {
        let mut index = LinkIndex::new();
        let link = Link::new(r(1), r(2));
        index.insert(link);

        assert_eq!(links_of(&index, r(1)), HashSet::from([link]));
        assert_eq!(links_of(&index, r(2)), HashSet::from([link]));
        assert_eq!(index.parent_link_of(r(2)), Some(&link));
        assert_eq!(index.parent_link_of(r(1)), None);
        assert_eq!(index.link_count(), 1);
    }

    #[test]
    fn remove_is_symmetric_and_idempotent() {
        let mut index = LinkIndex::new();
        let link = Link::new(r(1), r(2));
        index.insert(link);

        assert!(index.remove(&link));
        assert!(index.links_of(r(1)).next().is_none());
        assert!(index.links_of(r(2)).next().is_none());
        assert!(index.is_empty());

        assert!(!index.remove(&link));
    }

    #[test]
    fn swap_remove_keeps_remaining_fan_out() {
        let mut index = LinkIndex::new();
        let links: Vec<_> = (2..=6).map(|child| Link::new(r(1), r(child))).collect();
        for link in &links {
            index.insert(*link);
        }

        index.remove(&links[1]);

        let expected: HashSet<_> = links
            .iter()
            .copied()
            .filter(|link| *link != links[1])
            .collect();
        assert_eq!(links_of(&index, r(1)), expected);
        assert!(index.links_of(r(3)).next().is_none());
        assert_eq!(index.children_of(r(1)).count(), 4);
    }

    #[test]
    fn remove_all_for_drains_other_endpoint_entries() {
        let mut index = LinkIndex::new();
        let up = Link::new(r(1), r(2));
        let down_a = Link::new(r(2), r(3));
        let down_b = Link::new(r(2), Identity::solution(2));
        let unrelated = Link::new(r(1), r(4));
        for link in [up, down_a, down_b, unrelated] {
            index.insert(link);
        }

        let drained: HashSet<_> = index.remove_all_for(r(2)).into_iter().collect();
        assert_eq!(drained, HashSet::from([up, down_a, down_b]));

        assert!(index.iter().all(|link| !link.touches(r(2))));
        assert_eq!(links_of(&index, r(1)), HashSet::from([unrelated]));
        assert!(index.links_of(r(3)).next().is_none());
        assert!(index.links_of(Identity::solution(2)).next().is_none());
    }

    #[test]
    fn remove_all_for_unknown_identity_is_empty() {
        let mut index = LinkIndex::new();
        index.insert(Link::new(r(1), r(2)));
        assert!(index.remove_all_for(r(9)).is_empty());
        assert_eq!(index.link_count(), 1);
    }
}

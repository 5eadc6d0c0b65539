//! Root and forest derivation.
//!
//! # Invariants
//! - Every registered identity is considered exactly once.
//! - An item is a root iff no link in the index has it as child.

use crate::graph::link_index::LinkIndex;
use crate::graph::registry::ItemRegistry;
use crate::model::identity::Identity;
use serde::Serialize;
use std::collections::HashSet;

/// One node of the display forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForestNode {
    pub identity: Identity,
    pub children: Vec<ForestNode>,
}

impl ForestNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ForestNode::size).sum::<usize>()
    }
}

/// Derives roots from the registry and index.
pub struct RootResolver;

impl RootResolver {
    /// Registered items without a parent link, in unspecified order.
    pub fn roots(registry: &ItemRegistry, index: &LinkIndex) -> HashSet<Identity> {
        registry
            .identities()
            .filter(|id| !index.has_parent(*id))
            .collect()
    }

    /// Roots with their descendants, sorted by identity at every level.
    ///
    /// Items only reachable through a cycle have no root and are left out.
    pub fn forest(registry: &ItemRegistry, index: &LinkIndex) -> Vec<ForestNode> {
        let mut roots: Vec<_> = Self::roots(registry, index).into_iter().collect();
        roots.sort();
        let mut visited = HashSet::new();
        roots
            .into_iter()
            .filter_map(|root| build_node(registry, index, root, &mut visited))
            .collect()
    }
}

fn build_node(
    registry: &ItemRegistry,
    index: &LinkIndex,
    id: Identity,
    visited: &mut HashSet<Identity>,
) -> Option<ForestNode> {
    if !visited.insert(id) {
        return None;
    }
    let mut children: Vec<_> = index
        .children_of(id)
        .filter(|child| registry.contains(*child))
        .collect();
    children.sort();
    let children = children
        .into_iter()
        .filter_map(|child| build_node(registry, index, child, visited))
        .collect();
    Some(ForestNode {
        identity: id,
        children,
    })
}

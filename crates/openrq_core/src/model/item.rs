//! Item domain model.
//!
//! # Responsibility
//! - Hold the cached attributes of one persisted requirement or solution.
//! - Expose kind-specific data through a tagged facet instead of inert
//!   methods on the wrong kind.
//!
//! # Invariants
//! - `identity.kind` always matches the facet variant.
//! - Only solutions carry structural members; requirements never do.

use crate::model::identity::{Identity, ItemKind};
use serde::{Deserialize, Serialize};

/// Canvas position in scene units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Item rectangle size in scene units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i64,
    pub height: i64,
}

impl Size {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }
}

/// Attributes shared by both item kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttributes {
    /// External UID, independent from the row id.
    pub uid: i64,
    /// Edit counter maintained by the store.
    pub version: i64,
    /// Visibility flag.
    pub shown: bool,
    /// Rich-text description, stored verbatim.
    pub description: String,
    pub position: Point,
    pub size: Size,
}

impl Default for ItemAttributes {
    fn default() -> Self {
        Self {
            uid: 0,
            version: 1,
            shown: true,
            description: String::new(),
            position: Point::default(),
            size: Size::default(),
        }
    }
}

/// Requirement-only data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequirementFacet {
    pub rationale: String,
    pub fit_criterion: String,
}

/// Solution-only data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SolutionFacet {
    /// Free-text external reference.
    pub link: String,
    /// Structural children, in insertion order. Distinct from graph links.
    pub members: Vec<Identity>,
}

/// Kind-specific part of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemFacet {
    Requirement(RequirementFacet),
    Solution(SolutionFacet),
}

impl ItemFacet {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Requirement(_) => ItemKind::Requirement,
            Self::Solution(_) => ItemKind::Solution,
        }
    }

    fn empty(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Requirement => Self::Requirement(RequirementFacet::default()),
            ItemKind::Solution => Self::Solution(SolutionFacet::default()),
        }
    }
}

/// Cached view of one persisted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    identity: Identity,
    pub attributes: ItemAttributes,
    facet: ItemFacet,
}

impl Item {
    pub fn requirement(id: i64, attributes: ItemAttributes, facet: RequirementFacet) -> Self {
        Self {
            identity: Identity::requirement(id),
            attributes,
            facet: ItemFacet::Requirement(facet),
        }
    }

    pub fn solution(id: i64, attributes: ItemAttributes, facet: SolutionFacet) -> Self {
        Self {
            identity: Identity::solution(id),
            attributes,
            facet: ItemFacet::Solution(facet),
        }
    }

    /// Item with default attributes and an empty facet for `identity.kind`.
    pub fn empty(identity: Identity) -> Self {
        Self {
            identity,
            attributes: ItemAttributes::default(),
            facet: ItemFacet::empty(identity.kind),
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn kind(&self) -> ItemKind {
        self.identity.kind
    }

    pub fn facet(&self) -> &ItemFacet {
        &self.facet
    }

    pub fn as_requirement(&self) -> Option<&RequirementFacet> {
        match &self.facet {
            ItemFacet::Requirement(facet) => Some(facet),
            ItemFacet::Solution(_) => None,
        }
    }

    pub fn as_solution(&self) -> Option<&SolutionFacet> {
        match &self.facet {
            ItemFacet::Solution(facet) => Some(facet),
            ItemFacet::Requirement(_) => None,
        }
    }

    /// Structural children, or `None` for kinds that cannot own any.
    pub fn structural_children(&self) -> Option<&[Identity]> {
        self.as_solution().map(|facet| facet.members.as_slice())
    }

    pub(crate) fn facet_mut(&mut self) -> &mut ItemFacet {
        &mut self.facet
    }

    pub(crate) fn members_mut(&mut self) -> Option<&mut Vec<Identity>> {
        match &mut self.facet {
            ItemFacet::Solution(facet) => Some(&mut facet.members),
            ItemFacet::Requirement(_) => None,
        }
    }

    /// Centre of the item rectangle; links attach here. Clamped at the
    /// edges of the coordinate range.
    pub fn center(&self) -> Point {
        let ItemAttributes { position, size, .. } = &self.attributes;
        Point::new(
            position.x.saturating_add(size.width / 2),
            position.y.saturating_add(size.height / 2),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Item, ItemAttributes, Point, Size};
    use crate::model::identity::{Identity, ItemKind};

    #[test]
    fn requirement_has_no_structural_children() {
        let item = Item::empty(Identity::requirement(4));
        assert_eq!(item.kind(), ItemKind::Requirement);
        assert!(item.structural_children().is_none());
        assert!(item.as_requirement().is_some());
    }

    #[test]
    fn solution_exposes_empty_member_list() {
        let mut item = Item::empty(Identity::solution(4));
        assert_eq!(item.structural_children(), Some(&[][..]));

        item.members_mut()
            .expect("solutions own members")
            .push(Identity::requirement(1));
        assert_eq!(
            item.structural_children(),
            Some(&[Identity::requirement(1)][..])
        );
    }

    #[test]
    fn center_is_middle_of_rectangle() {
        let attributes = ItemAttributes {
            position: Point::new(10, 20),
            size: Size::new(128, 64),
            ..ItemAttributes::default()
        };
        let item = Item::requirement(1, attributes, Default::default());
        assert_eq!(item.center(), Point::new(74, 52));
    }

    #[test]
    fn center_saturates_at_coordinate_limits() {
        let attributes = ItemAttributes {
            position: Point::new(i64::MAX, i64::MIN),
            size: Size::new(128, -64),
            ..ItemAttributes::default()
        };
        let item = Item::requirement(1, attributes, Default::default());
        assert_eq!(item.center(), Point::new(i64::MAX, i64::MIN));
    }
}

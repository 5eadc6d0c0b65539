//! Item/link consistency engine.
//!
//! # Responsibility
//! - Own the item registry and link index of one opened project.
//! - Run every structural command durable-first: the gateway is written
//!   before memory, and a failed write leaves memory untouched.
//!
//! # Invariants
//! - Mutating commands require `EngineState::Ready`.
//! - Single parent: at most one link in the index names a given child.
//! - The index is symmetric and only references registered items.
//! - A failed load leaves the engine `Closed` with empty structures.
//!
//! # See also
//! - `graph::guard` for link validation.
//! - `repo::gateway` for the durable contract.

use crate::config::EngineConfig;
use crate::graph::geometry::{snap_to_grid, LinkGeometry};
use crate::graph::guard::{ConsistencyGuard, GuardError};
use crate::graph::link_index::LinkIndex;
use crate::graph::registry::ItemRegistry;
use crate::graph::roots::{ForestNode, RootResolver};
use crate::model::identity::{Identity, ItemKind};
use crate::model::item::{Item, ItemFacet, Point, Size};
use crate::model::link::Link;
use crate::repo::gateway::{
    Attribute, AttributeValue, PersistenceGateway, StoreError, StoreOperation,
};
use crate::service::label::derive_item_label;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lifecycle of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Closed,
    Loading,
    Ready,
}

impl Display for EngineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Loading => "loading",
            Self::Ready => "ready",
        })
    }
}

/// Result type used by engine commands.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from engine commands.
#[derive(Debug)]
pub enum EngineError {
    /// Command needs a loaded project.
    NotReady(EngineState),
    /// Identity is not registered.
    NotFound(Identity),
    /// Parent and child are the same item.
    SelfLink(Identity),
    /// Child already has a parent.
    DuplicateParent { child: Identity, parent: Identity },
    /// Link would close a parent cycle.
    Cycle { parent: Identity, child: Identity },
    /// Item kind cannot own structural children.
    NoStructuralChildren(Identity),
    /// Snapped drop position falls outside scene coordinates.
    InvalidPosition(Point),
    /// Width and height must both be positive.
    InvalidSize(Size),
    /// Attribute does not hold text.
    NotTextAttribute(Attribute),
    /// Gateway call failed; nothing in memory changed.
    Persistence {
        operation: StoreOperation,
        source: StoreError,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady(state) => write!(f, "project is not ready (state: {state})"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::SelfLink(id) => write!(f, "item cannot be linked to itself: {id}"),
            Self::DuplicateParent { child, parent } => {
                write!(f, "item {child} already has parent {parent}")
            }
            Self::Cycle { parent, child } => {
                write!(f, "link {parent} -> {child} would create a cycle")
            }
            Self::NoStructuralChildren(id) => {
                write!(f, "item {id} cannot own structural children")
            }
            Self::InvalidPosition(at) => {
                write!(f, "position ({}, {}) is outside the scene", at.x, at.y)
            }
            Self::InvalidSize(size) => write!(
                f,
                "item size must be positive, got {}x{}",
                size.width, size.height
            ),
            Self::NotTextAttribute(attribute) => {
                write!(f, "attribute `{attribute}` does not hold text")
            }
            Self::Persistence { operation, source } => {
                write!(f, "storage operation `{operation}` failed: {source}")
            }
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<GuardError> for EngineError {
    fn from(value: GuardError) -> Self {
        match value {
            GuardError::SelfLink(id) => Self::SelfLink(id),
            GuardError::DuplicateParent { child, parent } => {
                Self::DuplicateParent { child, parent }
            }
            GuardError::Cycle { parent, child } => Self::Cycle { parent, child },
            GuardError::Store(source) => Self::Persistence {
                operation: StoreOperation::ParentOf,
                source,
            },
        }
    }
}

fn persistence(operation: StoreOperation) -> impl FnOnce(StoreError) -> EngineError {
    move |source| EngineError::Persistence { operation, source }
}

/// Why a stored link was left out of the index on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    UnresolvedParent,
    UnresolvedChild,
    SelfLink,
}

impl SkipReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::UnresolvedParent => "unresolved_parent",
            Self::UnresolvedChild => "unresolved_child",
            Self::SelfLink => "self_link",
        }
    }
}

/// Stored link that was not indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedLink {
    pub link: Link,
    pub reason: SkipReason,
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub items: usize,
    pub links: usize,
    pub skipped: Vec<SkippedLink>,
}

/// Durable clean-up step that failed during a delete.
#[derive(Debug)]
pub struct CleanupFailure {
    pub operation: StoreOperation,
    /// Link being cleared, when the step was per link.
    pub link: Option<Link>,
    pub error: StoreError,
}

/// Outcome of a delete.
#[derive(Debug)]
pub struct DeleteReport {
    pub identity: Identity,
    /// Links purged from the index.
    pub removed_links: Vec<Link>,
    /// Durable link clean-up that failed; the item was removed regardless.
    pub failures: Vec<CleanupFailure>,
}

impl DeleteReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Façade over registry, index and gateway for one project.
pub struct GraphEngine<G: PersistenceGateway> {
    gateway: G,
    config: EngineConfig,
    guard: ConsistencyGuard,
    state: EngineState,
    registry: ItemRegistry,
    index: LinkIndex,
}

impl<G: PersistenceGateway> GraphEngine<G> {
    /// Creates a closed engine; call `open` to load.
    pub fn new(gateway: G, config: EngineConfig) -> Self {
        let guard = ConsistencyGuard::new(config.reject_cycles);
        Self {
            gateway,
            config,
            guard,
            state: EngineState::Closed,
            registry: ItemRegistry::new(),
            index: LinkIndex::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn index(&self) -> &LinkIndex {
        &self.index
    }

    /// Loads every item, then every link, replacing all in-memory state.
    pub fn open(&mut self) -> EngineResult<LoadReport> {
        self.load()
    }

    /// Discards and rebuilds in-memory state from the store.
    pub fn reload(&mut self) -> EngineResult<LoadReport> {
        self.require_ready()?;
        self.load()
    }

    /// Drops all in-memory state.
    pub fn close(&mut self) {
        self.registry.clear();
        self.index.clear();
        self.state = EngineState::Closed;
        debug!("event=graph_close module=engine status=ok");
    }

    pub fn resolve(&self, id: Identity) -> Option<&Item> {
        self.registry.resolve(id)
    }

    /// Registered item, or `NotFound`.
    pub fn item(&self, id: Identity) -> EngineResult<&Item> {
        self.registry.resolve(id).ok_or(EngineError::NotFound(id))
    }

    pub fn links_of(&self, id: Identity) -> impl Iterator<Item = &Link> + '_ {
        self.index.links_of(id)
    }

    pub fn parent_of(&self, child: Identity) -> Option<Identity> {
        self.index.parent_link_of(child).map(|link| link.parent)
    }

    /// Children of `parent`, sorted by identity.
    pub fn children_of(&self, parent: Identity) -> Vec<Identity> {
        let mut children: Vec<_> = self.index.children_of(parent).collect();
        children.sort();
        children
    }

    pub fn roots(&self) -> HashSet<Identity> {
        RootResolver::roots(&self.registry, &self.index)
    }

    pub fn forest(&self) -> Vec<ForestNode> {
        RootResolver::forest(&self.registry, &self.index)
    }

    /// Canvas label for one item.
    pub fn item_label(&self, id: Identity) -> EngineResult<String> {
        let item = self.item(id)?;
        Ok(derive_item_label(
            &item.attributes.description,
            id,
            self.config.label_max_chars,
        ))
    }

    /// Current line geometry of one indexed link.
    pub fn link_geometry(&self, link: &Link) -> EngineResult<LinkGeometry> {
        let parent = self.item(link.parent)?;
        let child = self.item(link.child)?;
        Ok(LinkGeometry::between(*link, parent, child))
    }

    /// Geometry of every link touching `id`.
    pub fn geometry_of(&self, id: Identity) -> EngineResult<Vec<LinkGeometry>> {
        self.links_of(id)
            .map(|link| self.link_geometry(link))
            .collect()
    }

    /// Creates a durable `parent -> child` link, then indexes it.
    pub fn add_link(&mut self, parent: Identity, child: Identity) -> EngineResult<Link> {
        self.require_ready()?;
        self.ensure_registered(parent)?;
        self.ensure_registered(child)?;
        if let Err(err) = self
            .guard
            .validate(&self.index, &self.gateway, parent, child)
        {
            debug!(
                "event=link_add module=engine status=rejected parent={} child={} reason={}",
                parent, child, err
            );
            return Err(err.into());
        }

        self.gateway
            .add_association(parent, child)
            .map_err(|err| match err {
                StoreError::ParentAlreadySet { child, parent } => {
                    EngineError::DuplicateParent { child, parent }
                }
                other => persistence(StoreOperation::AddAssociation)(other),
            })?;

        let link = Link::new(parent, child);
        self.index.insert(link);
        info!(
            "event=link_add module=engine status=ok parent={} child={}",
            parent, child
        );
        Ok(link)
    }

    /// Removes a link durably, then from the index.
    ///
    /// Removing a link that does not exist is a no-op. The durable parent of
    /// the child is only cleared when it is `link.parent`.
    pub fn remove_link(&mut self, link: Link) -> EngineResult<()> {
        self.require_ready()?;
        self.ensure_registered(link.parent)?;
        self.ensure_registered(link.child)?;

        let indexed = self.index.contains(&link);
        let durable = if indexed {
            true
        } else {
            self.gateway
                .parent_of(link.child)
                .map_err(persistence(StoreOperation::ParentOf))?
                == Some(link.parent)
        };
        if durable {
            self.gateway
                .remove_association(link.child)
                .map_err(persistence(StoreOperation::RemoveAssociation))?;
        }
        if indexed {
            self.index.remove(&link);
        }

        info!(
            "event=link_remove module=engine status={} link={}",
            if indexed || durable { "ok" } else { "skip" },
            link
        );
        Ok(())
    }

    /// Persists a new position and returns the updated geometry of every
    /// incident link.
    pub fn move_item(&mut self, id: Identity, x: i64, y: i64) -> EngineResult<Vec<LinkGeometry>> {
        let position = Point::new(x, y);
        self.write_through(
            id,
            &[
                (Attribute::X, AttributeValue::Integer(x)),
                (Attribute::Y, AttributeValue::Integer(y)),
            ],
            |item| item.attributes.position = position,
        )?;
        debug!(
            "event=item_move module=engine status=ok id={} x={} y={}",
            id, x, y
        );
        self.geometry_of(id)
    }

    /// Persists a new size and returns the updated geometry of every
    /// incident link.
    pub fn resize_item(&mut self, id: Identity, size: Size) -> EngineResult<Vec<LinkGeometry>> {
        self.require_ready()?;
        if size.width <= 0 || size.height <= 0 {
            return Err(EngineError::InvalidSize(size));
        }
        self.write_through(
            id,
            &[
                (Attribute::Width, AttributeValue::Integer(size.width)),
                (Attribute::Height, AttributeValue::Integer(size.height)),
            ],
            |item| item.attributes.size = size,
        )?;
        self.geometry_of(id)
    }

    pub fn set_description(&mut self, id: Identity, description: &str) -> EngineResult<()> {
        self.set_text(id, Attribute::Description, description)
    }

    pub fn set_shown(&mut self, id: Identity, shown: bool) -> EngineResult<()> {
        self.write_through(
            id,
            &[(Attribute::Shown, AttributeValue::Bool(shown))],
            |item| item.attributes.shown = shown,
        )
    }

    /// Writes one text attribute (`Description`, `Rationale`,
    /// `FitCriterion` or `Link`).
    pub fn set_text(&mut self, id: Identity, attribute: Attribute, text: &str) -> EngineResult<()> {
        self.require_ready()?;
        if !attribute.is_text() {
            return Err(EngineError::NotTextAttribute(attribute));
        }
        let value = text.to_string();
        self.write_through(
            id,
            &[(attribute, AttributeValue::Text(value.clone()))],
            move |item| {
                if attribute == Attribute::Description {
                    item.attributes.description = value;
                    return;
                }
                match (attribute, item.facet_mut()) {
                    (Attribute::Rationale, ItemFacet::Requirement(facet)) => {
                        facet.rationale = value
                    }
                    (Attribute::FitCriterion, ItemFacet::Requirement(facet)) => {
                        facet.fit_criterion = value
                    }
                    (Attribute::Link, ItemFacet::Solution(facet)) => facet.link = value,
                    // kind mismatches are refused by the gateway before this runs
                    _ => {}
                }
            },
        )
    }

    /// Creates an item at a drop position.
    ///
    /// The position is snapped to the configured grid and the item gets the
    /// configured default size. A drop position that cannot be snapped is
    /// refused before anything is written, and the row is removed again if
    /// the geometry cannot be written.
    pub fn create_item(&mut self, kind: ItemKind, at: Point) -> EngineResult<Identity> {
        self.require_ready()?;
        let grid = self.config.grid;
        let position =
            snap_to_grid(at, grid.shift, grid.offset).ok_or(EngineError::InvalidPosition(at))?;

        let id = self
            .gateway
            .create_item(kind)
            .map_err(persistence(StoreOperation::CreateItem))?;

        if let Err(err) = self
            .gateway
            .set_geometry(id, position, self.config.item_size)
        {
            if let Err(rollback) = self.gateway.remove_item(id) {
                warn!(
                    "event=item_create module=engine status=error id={} step=rollback error={}",
                    id, rollback
                );
            }
            return Err(persistence(StoreOperation::SetAttributes)(err));
        }

        let item = self
            .gateway
            .load_item(id)
            .map_err(persistence(StoreOperation::LoadItem))?
            .ok_or_else(|| persistence(StoreOperation::LoadItem)(StoreError::ItemNotFound(id)))?;
        self.registry.register(item);
        info!(
            "event=item_create module=engine status=ok id={} x={} y={}",
            id, position.x, position.y
        );
        Ok(id)
    }

    /// Deletes an item and every link touching it.
    ///
    /// Link clean-up is best effort: failures are logged and collected in the
    /// report, and the item row is removed regardless. Only a failure to
    /// remove the row itself aborts, leaving the item registered.
    pub fn delete_item(&mut self, id: Identity) -> EngineResult<DeleteReport> {
        self.require_ready()?;
        self.ensure_registered(id)?;

        let mut failures = Vec::new();
        let incident: Vec<Link> = self.index.links_of(id).copied().collect();
        for link in &incident {
            if let Err(error) = self.gateway.remove_association(link.child) {
                warn!(
                    "event=item_delete module=engine status=error id={} step=remove_association link={} error={}",
                    id, link, error
                );
                failures.push(CleanupFailure {
                    operation: StoreOperation::RemoveAssociation,
                    link: Some(*link),
                    error,
                });
            }
        }
        let removed_links = self.index.remove_all_for(id);

        if let Err(error) = self.gateway.remove_all_associations_for(id) {
            warn!(
                "event=item_delete module=engine status=error id={} step=remove_all_associations error={}",
                id, error
            );
            failures.push(CleanupFailure {
                operation: StoreOperation::RemoveAllAssociations,
                link: None,
                error,
            });
        }

        self.gateway
            .remove_item(id)
            .map_err(persistence(StoreOperation::RemoveItem))?;

        self.registry.evict(id);
        for item in self.registry.items_mut() {
            if let Some(members) = item.members_mut() {
                members.retain(|member| *member != id);
            }
        }

        info!(
            "event=item_delete module=engine status=ok id={} links={} failures={}",
            id,
            removed_links.len(),
            failures.len()
        );
        Ok(DeleteReport {
            identity: id,
            removed_links,
            failures,
        })
    }

    /// Appends `member` to the structural children of `solution`.
    pub fn add_member(&mut self, solution: Identity, member: Identity) -> EngineResult<()> {
        self.require_ready()?;
        self.ensure_member_owner(solution)?;
        self.ensure_registered(member)?;
        if solution == member {
            return Err(EngineError::SelfLink(member));
        }
        if self.is_member(solution, member) {
            return Ok(());
        }

        self.gateway
            .add_member(solution, member)
            .map_err(persistence(StoreOperation::AddMember))?;
        if let Some(members) = self
            .registry
            .resolve_mut(solution)
            .and_then(Item::members_mut)
        {
            members.push(member);
        }
        debug!(
            "event=member_add module=engine status=ok solution={} member={}",
            solution, member
        );
        Ok(())
    }

    /// Removes `member` from `solution`. Returns whether it was a member.
    pub fn remove_member(&mut self, solution: Identity, member: Identity) -> EngineResult<bool> {
        self.require_ready()?;
        self.ensure_member_owner(solution)?;

        let removed = self
            .gateway
            .remove_member(solution, member)
            .map_err(persistence(StoreOperation::RemoveMember))?;
        if let Some(members) = self
            .registry
            .resolve_mut(solution)
            .and_then(Item::members_mut)
        {
            members.retain(|current| *current != member);
        }
        Ok(removed)
    }

    fn load(&mut self) -> EngineResult<LoadReport> {
        self.registry.clear();
        self.index.clear();
        self.state = EngineState::Loading;

        match self.rebuild() {
            Ok(report) => {
                self.state = EngineState::Ready;
                info!(
                    "event=graph_load module=engine status=ok items={} links={} skipped={}",
                    report.items,
                    report.links,
                    report.skipped.len()
                );
                Ok(report)
            }
            Err(err) => {
                self.close();
                warn!("event=graph_load module=engine status=error error={}", err);
                Err(err)
            }
        }
    }

    fn rebuild(&mut self) -> EngineResult<LoadReport> {
        let items = self
            .gateway
            .load_items()
            .map_err(persistence(StoreOperation::LoadItems))?;
        for item in items.into_values() {
            self.registry.register(item);
        }

        let mut stored: Vec<_> = self
            .gateway
            .load_links()
            .map_err(persistence(StoreOperation::LoadLinks))?
            .into_iter()
            .map(|(child, parent)| Link::new(parent, child))
            .collect();
        stored.sort();

        let mut report = LoadReport {
            items: self.registry.len(),
            ..LoadReport::default()
        };
        for link in stored {
            let reason = if link.is_self_link() {
                Some(SkipReason::SelfLink)
            } else if !self.registry.contains(link.parent) {
                Some(SkipReason::UnresolvedParent)
            } else if !self.registry.contains(link.child) {
                Some(SkipReason::UnresolvedChild)
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    warn!(
                        "event=graph_load module=engine status=skip link={} reason={}",
                        link,
                        reason.as_str()
                    );
                    report.skipped.push(SkippedLink { link, reason });
                }
                None => {
                    self.index.insert(link);
                    report.links += 1;
                }
            }
        }
        Ok(report)
    }

    fn write_through(
        &mut self,
        id: Identity,
        values: &[(Attribute, AttributeValue)],
        update: impl FnOnce(&mut Item),
    ) -> EngineResult<()> {
        self.require_ready()?;
        self.ensure_registered(id)?;
        self.gateway
            .set_attributes(id, values)
            .map_err(persistence(StoreOperation::SetAttributes))?;
        if let Some(item) = self.registry.resolve_mut(id) {
            update(item);
            item.attributes.version += 1;
        }
        Ok(())
    }

    fn is_member(&self, solution: Identity, member: Identity) -> bool {
        self.registry
            .resolve(solution)
            .and_then(Item::structural_children)
            .is_some_and(|members| members.contains(&member))
    }

    fn require_ready(&self) -> EngineResult<()> {
        match self.state {
            EngineState::Ready => Ok(()),
            other => Err(EngineError::NotReady(other)),
        }
    }

    fn ensure_registered(&self, id: Identity) -> EngineResult<()> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(EngineError::NotFound(id))
        }
    }

    fn ensure_member_owner(&self, solution: Identity) -> EngineResult<()> {
        let item = self.item(solution)?;
        if item.structural_children().is_none() {
            return Err(EngineError::NoStructuralChildren(solution));
        }
        Ok(())
    }
}

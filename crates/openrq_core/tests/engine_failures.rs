use openrq_core::db::open_db_in_memory;
use openrq_core::{
    Attribute, AttributeValue, EngineConfig, EngineError, EngineState, GraphEngine, Identity,
    Item, ItemKind, Link, PersistenceGateway, Point, SqliteProjectStore, StoreError,
    StoreOperation, StoreResult,
};
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Store wrapper that fails chosen operations on demand.
struct FlakyStore<'conn> {
    inner: SqliteProjectStore<'conn>,
    failing: RefCell<HashSet<StoreOperation>>,
}

impl<'conn> FlakyStore<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqliteProjectStore::try_new(conn).unwrap(),
            failing: RefCell::new(HashSet::new()),
        }
    }

    fn fail(&self, operation: StoreOperation) {
        self.failing.borrow_mut().insert(operation);
    }

    fn heal(&self) {
        self.failing.borrow_mut().clear();
    }

    fn check(&self, operation: StoreOperation) -> StoreResult<()> {
        if self.failing.borrow().contains(&operation) {
            return Err(StoreError::InvalidData(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

impl PersistenceGateway for FlakyStore<'_> {
    fn load_items(&self) -> StoreResult<HashMap<Identity, Item>> {
        self.check(StoreOperation::LoadItems)?;
        self.inner.load_items()
    }

    fn load_item(&self, id: Identity) -> StoreResult<Option<Item>> {
        self.check(StoreOperation::LoadItem)?;
        self.inner.load_item(id)
    }

    fn load_links(&self) -> StoreResult<HashMap<Identity, Identity>> {
        self.check(StoreOperation::LoadLinks)?;
        self.inner.load_links()
    }

    fn parent_of(&self, child: Identity) -> StoreResult<Option<Identity>> {
        self.check(StoreOperation::ParentOf)?;
        self.inner.parent_of(child)
    }

    fn add_association(&self, parent: Identity, child: Identity) -> StoreResult<()> {
        self.check(StoreOperation::AddAssociation)?;
        self.inner.add_association(parent, child)
    }

    fn remove_association(&self, child: Identity) -> StoreResult<bool> {
        self.check(StoreOperation::RemoveAssociation)?;
        self.inner.remove_association(child)
    }

    fn remove_all_associations_for(&self, id: Identity) -> StoreResult<usize> {
        self.check(StoreOperation::RemoveAllAssociations)?;
        self.inner.remove_all_associations_for(id)
    }

    fn get_attribute(&self, id: Identity, attribute: Attribute) -> StoreResult<AttributeValue> {
        self.check(StoreOperation::GetAttribute)?;
        self.inner.get_attribute(id, attribute)
    }

    fn set_attributes(
        &self,
        id: Identity,
        values: &[(Attribute, AttributeValue)],
    ) -> StoreResult<()> {
        self.check(StoreOperation::SetAttributes)?;
        self.inner.set_attributes(id, values)
    }

    fn create_item(&self, kind: ItemKind) -> StoreResult<Identity> {
        self.check(StoreOperation::CreateItem)?;
        self.inner.create_item(kind)
    }

    fn remove_item(&self, id: Identity) -> StoreResult<()> {
        self.check(StoreOperation::RemoveItem)?;
        self.inner.remove_item(id)
    }

    fn add_member(&self, solution: Identity, member: Identity) -> StoreResult<()> {
        self.check(StoreOperation::AddMember)?;
        self.inner.add_member(solution, member)
    }

    fn remove_member(&self, solution: Identity, member: Identity) -> StoreResult<bool> {
        self.check(StoreOperation::RemoveMember)?;
        self.inner.remove_member(solution, member)
    }
}

fn ready_engine(conn: &Connection) -> GraphEngine<FlakyStore<'_>> {
    let mut engine = GraphEngine::new(FlakyStore::new(conn), EngineConfig::default());
    engine.open().unwrap();
    engine
}

fn new_item(engine: &mut GraphEngine<FlakyStore<'_>>, kind: ItemKind) -> Identity {
    engine.create_item(kind, Point::new(0, 0)).unwrap()
}

fn assert_persistence(err: EngineError, expected: StoreOperation) {
    match err {
        EngineError::Persistence { operation, .. } => assert_eq!(operation, expected),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_association_write_leaves_index_untouched() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);
    let parent = new_item(&mut engine, ItemKind::Requirement);
    let child = new_item(&mut engine, ItemKind::Requirement);

    engine.gateway().fail(StoreOperation::AddAssociation);
    assert_persistence(
        engine.add_link(parent, child).unwrap_err(),
        StoreOperation::AddAssociation,
    );
    assert!(engine.links_of(parent).next().is_none());
    assert!(engine.links_of(child).next().is_none());

    engine.gateway().heal();
    engine.add_link(parent, child).unwrap();
}

#[test]
fn failed_durable_parent_check_aborts_link() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);
    let parent = new_item(&mut engine, ItemKind::Solution);
    let child = new_item(&mut engine, ItemKind::Solution);

    engine.gateway().fail(StoreOperation::ParentOf);
    assert_persistence(
        engine.add_link(parent, child).unwrap_err(),
        StoreOperation::ParentOf,
    );
    assert!(engine.index().is_empty());
}

#[test]
fn failed_association_removal_keeps_link() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);
    let parent = new_item(&mut engine, ItemKind::Requirement);
    let child = new_item(&mut engine, ItemKind::Solution);
    let link = engine.add_link(parent, child).unwrap();

    engine.gateway().fail(StoreOperation::RemoveAssociation);
    assert_persistence(
        engine.remove_link(link).unwrap_err(),
        StoreOperation::RemoveAssociation,
    );
    assert!(engine.index().contains(&link));
    assert_eq!(engine.parent_of(child), Some(parent));
}

#[test]
fn failed_move_keeps_cached_position() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);
    let id = new_item(&mut engine, ItemKind::Requirement);
    let before = engine.item(id).unwrap().attributes.clone();

    engine.gateway().fail(StoreOperation::SetAttributes);
    assert_persistence(
        engine.move_item(id, 500, 500).unwrap_err(),
        StoreOperation::SetAttributes,
    );
    assert_eq!(engine.item(id).unwrap().attributes, before);
}

#[test]
fn delete_is_best_effort_for_link_cleanup() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);
    let root = new_item(&mut engine, ItemKind::Requirement);
    let victim = new_item(&mut engine, ItemKind::Solution);
    let leaf = new_item(&mut engine, ItemKind::Requirement);
    engine.add_link(root, victim).unwrap();
    engine.add_link(victim, leaf).unwrap();

    engine.gateway().fail(StoreOperation::RemoveAssociation);
    engine.gateway().fail(StoreOperation::RemoveAllAssociations);
    let report = engine.delete_item(victim).unwrap();

    assert_eq!(report.removed_links.len(), 2);
    assert_eq!(report.failures.len(), 3);
    let per_link: HashSet<Link> = report.failures.iter().filter_map(|f| f.link).collect();
    assert_eq!(
        per_link,
        HashSet::from([Link::new(root, victim), Link::new(victim, leaf)])
    );
    assert!(report
        .failures
        .iter()
        .any(|f| f.operation == StoreOperation::RemoveAllAssociations));

    assert!(engine.resolve(victim).is_none());
    assert!(engine.index().is_empty());
    assert_eq!(engine.roots(), HashSet::from([root, leaf]));

    engine.gateway().heal();
    assert!(engine.gateway().load_links().unwrap().is_empty());
}

#[test]
fn failed_row_removal_keeps_item_registered() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);
    let parent = new_item(&mut engine, ItemKind::Requirement);
    let child = new_item(&mut engine, ItemKind::Requirement);
    engine.add_link(parent, child).unwrap();

    engine.gateway().fail(StoreOperation::RemoveItem);
    assert_persistence(
        engine.delete_item(child).unwrap_err(),
        StoreOperation::RemoveItem,
    );

    assert!(engine.resolve(child).is_some());
    assert!(engine.links_of(child).next().is_none());
    engine.gateway().heal();
    assert_eq!(engine.gateway().parent_of(child).unwrap(), None);
}

#[test]
fn failed_geometry_write_rolls_back_created_row() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);

    engine.gateway().fail(StoreOperation::SetAttributes);
    assert_persistence(
        engine
            .create_item(ItemKind::Solution, Point::new(10, 10))
            .unwrap_err(),
        StoreOperation::SetAttributes,
    );

    assert!(engine.registry().is_empty());
    engine.gateway().heal();
    assert!(engine.gateway().load_items().unwrap().is_empty());
}

#[test]
fn failed_load_returns_to_closed() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);
    let a = new_item(&mut engine, ItemKind::Requirement);
    let b = new_item(&mut engine, ItemKind::Requirement);
    engine.add_link(a, b).unwrap();

    engine.gateway().fail(StoreOperation::LoadLinks);
    assert_persistence(engine.reload().unwrap_err(), StoreOperation::LoadLinks);
    assert_eq!(engine.state(), EngineState::Closed);
    assert!(engine.registry().is_empty());
    assert!(engine.index().is_empty());
    assert!(matches!(
        engine.add_link(b, a),
        Err(EngineError::NotReady(EngineState::Closed))
    ));

    engine.gateway().heal();
    let report = engine.open().unwrap();
    assert_eq!((report.items, report.links), (2, 1));
}

#[test]
fn failed_member_write_leaves_members_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = ready_engine(&conn);
    let solution = new_item(&mut engine, ItemKind::Solution);
    let member = new_item(&mut engine, ItemKind::Requirement);

    engine.gateway().fail(StoreOperation::AddMember);
    assert_persistence(
        engine.add_member(solution, member).unwrap_err(),
        StoreOperation::AddMember,
    );
    assert_eq!(
        engine.item(solution).unwrap().structural_children(),
        Some(&[][..])
    );
}

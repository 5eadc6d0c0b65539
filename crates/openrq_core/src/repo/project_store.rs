//! SQLite implementation of the persistence gateway.
//!
//! # Responsibility
//! - Store requirements and solutions in their own tables.
//! - Keep parent pointers and solution memberships consistent on removal.
//!
//! # Invariants
//! - One parent per child: the pointer lives in the child row
//!   (`parent_id`, `parent_kind`).
//! - External UIDs are unique across both item tables.
//! - Multi-row writes run in one immediate transaction.

use crate::db::migrations::latest_version;
use crate::model::identity::{Identity, ItemKind};
use crate::model::item::{Item, ItemAttributes, Point, RequirementFacet, Size, SolutionFacet};
use crate::repo::gateway::{
    Attribute, AttributeValue, PersistenceGateway, StoreError, StoreResult,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::collections::HashMap;
use uuid::Uuid;

const ITEM_KINDS: [ItemKind; 2] = [ItemKind::Requirement, ItemKind::Solution];

const COMMON_COLUMNS: [&str; 11] = [
    "id",
    "uid",
    "version",
    "shown",
    "description",
    "x",
    "y",
    "width",
    "height",
    "parent_id",
    "parent_kind",
];

/// SQLite-backed project store.
pub struct SqliteProjectStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_project_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Project name recorded on creation, if any.
    pub fn project_name(&self) -> StoreResult<Option<String>> {
        self.conn
            .query_row("SELECT name FROM project_info WHERE id = 1;", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Records the project name unless one is already stored.
    ///
    /// Returns whether a name was written.
    pub fn init_project_name(&self, name: &str) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO project_info (id, name) VALUES (1, ?1);",
            [name],
        )?;
        Ok(changed > 0)
    }

    /// Number of item rows of `kind`.
    pub fn count_items(&self, kind: ItemKind) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", table_for(kind)),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl PersistenceGateway for SqliteProjectStore<'_> {
    fn load_items(&self) -> StoreResult<HashMap<Identity, Item>> {
        let mut members = load_all_members(self.conn)?;
        let mut items = HashMap::new();
        for kind in ITEM_KINDS {
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT * FROM {} ORDER BY id ASC;", table_for(kind)))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let id: i64 = row.get("id")?;
                let owned = match kind {
                    ItemKind::Solution => members.remove(&id).unwrap_or_default(),
                    ItemKind::Requirement => Vec::new(),
                };
                let item = parse_item_row(kind, row, owned)?;
                items.insert(item.identity(), item);
            }
        }
        Ok(items)
    }

    fn load_item(&self, id: Identity) -> StoreResult<Option<Item>> {
        let members = match id.kind {
            ItemKind::Solution => load_members_of(self.conn, id.id)?,
            ItemKind::Requirement => Vec::new(),
        };
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} WHERE id = ?1;", table_for(id.kind)))?;
        let mut rows = stmt.query([id.id])?;
        let item = match rows.next()? {
            Some(row) => Some(parse_item_row(id.kind, row, members)?),
            None => None,
        };
        Ok(item)
    }

    fn load_links(&self) -> StoreResult<HashMap<Identity, Identity>> {
        let mut links = HashMap::new();
        for kind in ITEM_KINDS {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT id, parent_id, parent_kind
                 FROM {}
                 WHERE parent_id IS NOT NULL;",
                table_for(kind)
            ))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let child = Identity::new(row.get(0)?, kind);
                if let Some(parent) = parse_parent(row.get(1)?, row.get(2)?)? {
                    links.insert(child, parent);
                }
            }
        }
        Ok(links)
    }

    fn parent_of(&self, child: Identity) -> StoreResult<Option<Identity>> {
        load_parent(self.conn, child)?.ok_or(StoreError::ItemNotFound(child))
    }

    fn add_association(&self, parent: Identity, child: Identity) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_item_exists(&tx, parent)?;
        let current = load_parent(&tx, child)?.ok_or(StoreError::ItemNotFound(child))?;
        if let Some(existing) = current {
            return Err(StoreError::ParentAlreadySet {
                child,
                parent: existing,
            });
        }
        tx.execute(
            &format!(
                "UPDATE {}
                 SET parent_id = ?1,
                     parent_kind = ?2
                 WHERE id = ?3;",
                table_for(child.kind)
            ),
            params![parent.id, parent.kind.as_str(), child.id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove_association(&self, child: Identity) -> StoreResult<bool> {
        ensure_item_exists(self.conn, child)?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE {}
                 SET parent_id = NULL,
                     parent_kind = NULL
                 WHERE id = ?1
                   AND parent_id IS NOT NULL;",
                table_for(child.kind)
            ),
            [child.id],
        )?;
        Ok(changed > 0)
    }

    fn remove_all_associations_for(&self, id: Identity) -> StoreResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut cleared = tx.execute(
            &format!(
                "UPDATE {}
                 SET parent_id = NULL,
                     parent_kind = NULL
                 WHERE id = ?1
                   AND parent_id IS NOT NULL;",
                table_for(id.kind)
            ),
            [id.id],
        )?;
        cleared += clear_children_of(&tx, id)?;
        tx.commit()?;
        Ok(cleared)
    }

    fn get_attribute(&self, id: Identity, attribute: Attribute) -> StoreResult<AttributeValue> {
        ensure_attribute_supported(id.kind, attribute)?;
        let value: Option<Value> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1;",
                    attribute.column(),
                    table_for(id.kind)
                ),
                [id.id],
                |row| row.get(0),
            )
            .optional()?;
        let value = value.ok_or(StoreError::ItemNotFound(id))?;
        attribute_from_sql(attribute, value)
    }

    fn set_attributes(
        &self,
        id: Identity,
        values: &[(Attribute, AttributeValue)],
    ) -> StoreResult<()> {
        if values.is_empty() {
            return ensure_item_exists(self.conn, id);
        }

        let mut assignments = Vec::with_capacity(values.len() + 1);
        let mut bindings = Vec::with_capacity(values.len() + 1);
        for (attribute, value) in values {
            ensure_attribute_supported(id.kind, *attribute)?;
            assignments.push(format!("{} = ?{}", attribute.column(), bindings.len() + 1));
            bindings.push(attribute_to_sql(*attribute, value)?);
        }
        if !values
            .iter()
            .any(|(attribute, _)| *attribute == Attribute::Version)
        {
            assignments.push("version = version + 1".to_string());
        }
        bindings.push(Value::Integer(id.id));

        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET {} WHERE id = ?{};",
                table_for(id.kind),
                assignments.join(", "),
                bindings.len()
            ),
            params_from_iter(bindings),
        )?;
        if changed == 0 {
            return Err(StoreError::ItemNotFound(id));
        }
        Ok(())
    }

    fn create_item(&self, kind: ItemKind) -> StoreResult<Identity> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let uid = fresh_uid(&tx)?;
        tx.execute(
            &format!("INSERT INTO {} (uid) VALUES (?1);", table_for(kind)),
            [uid],
        )?;
        let id = Identity::new(tx.last_insert_rowid(), kind);
        tx.commit()?;
        Ok(id)
    }

    fn remove_item(&self, id: Identity) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        clear_children_of(&tx, id)?;
        tx.execute(
            "DELETE FROM solution_members
             WHERE member_id = ?1
               AND member_kind = ?2;",
            params![id.id, id.kind.as_str()],
        )?;
        if id.kind == ItemKind::Solution {
            tx.execute(
                "DELETE FROM solution_members WHERE solution_id = ?1;",
                [id.id],
            )?;
        }
        let changed = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", table_for(id.kind)),
            [id.id],
        )?;
        if changed == 0 {
            return Err(StoreError::ItemNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn add_member(&self, solution: Identity, member: Identity) -> StoreResult<()> {
        ensure_member_owner(solution)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_item_exists(&tx, solution)?;
        ensure_item_exists(&tx, member)?;
        let next_position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0)
             FROM solution_members
             WHERE solution_id = ?1;",
            [solution.id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO solution_members (solution_id, member_id, member_kind, position)
             VALUES (?1, ?2, ?3, ?4);",
            params![solution.id, member.id, member.kind.as_str(), next_position],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove_member(&self, solution: Identity, member: Identity) -> StoreResult<bool> {
        ensure_member_owner(solution)?;
        ensure_item_exists(self.conn, solution)?;
        let changed = self.conn.execute(
            "DELETE FROM solution_members
             WHERE solution_id = ?1
               AND member_id = ?2
               AND member_kind = ?3;",
            params![solution.id, member.id, member.kind.as_str()],
        )?;
        Ok(changed > 0)
    }
}

fn table_for(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Requirement => "requirements",
        ItemKind::Solution => "solutions",
    }
}

fn fresh_uid(conn: &Connection) -> StoreResult<i64> {
    loop {
        let (high, _) = Uuid::new_v4().as_u64_pair();
        let candidate = i64::try_from(high >> 1).unwrap_or(i64::MAX);
        let taken: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM requirements WHERE uid = ?1)
                 OR EXISTS(SELECT 1 FROM solutions WHERE uid = ?1);",
            [candidate],
            |row| row.get(0),
        )?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
}

fn ensure_item_exists(conn: &Connection, id: Identity) -> StoreResult<()> {
    let exists: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
            table_for(id.kind)
        ),
        [id.id],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(StoreError::ItemNotFound(id))
    }
}

fn ensure_member_owner(solution: Identity) -> StoreResult<()> {
    if solution.kind.supports_members() {
        return Ok(());
    }
    Err(StoreError::InvalidData(format!(
        "{} items cannot own members: {solution}",
        solution.kind
    )))
}

fn ensure_attribute_supported(kind: ItemKind, attribute: Attribute) -> StoreResult<()> {
    if attribute.applies_to(kind) {
        Ok(())
    } else {
        Err(StoreError::UnsupportedAttribute { kind, attribute })
    }
}

/// Outer `None`: row missing. Inner `None`: no parent.
fn load_parent(conn: &Connection, child: Identity) -> StoreResult<Option<Option<Identity>>> {
    let row: Option<(Option<i64>, Option<String>)> = conn
        .query_row(
            &format!(
                "SELECT parent_id, parent_kind FROM {} WHERE id = ?1;",
                table_for(child.kind)
            ),
            [child.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(|(parent_id, parent_kind)| parse_parent(parent_id, parent_kind))
        .transpose()
}

fn clear_children_of(conn: &Connection, parent: Identity) -> StoreResult<usize> {
    let mut cleared = 0;
    for kind in ITEM_KINDS {
        cleared += conn.execute(
            &format!(
                "UPDATE {}
                 SET parent_id = NULL,
                     parent_kind = NULL
                 WHERE parent_id = ?1
                   AND parent_kind = ?2;",
                table_for(kind)
            ),
            params![parent.id, parent.kind.as_str()],
        )?;
    }
    Ok(cleared)
}

fn load_all_members(conn: &Connection) -> StoreResult<HashMap<i64, Vec<Identity>>> {
    let mut stmt = conn.prepare(
        "SELECT solution_id, member_id, member_kind
         FROM solution_members
         ORDER BY solution_id ASC, position ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut members: HashMap<i64, Vec<Identity>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let solution_id: i64 = row.get(0)?;
        let member = parse_member(row.get(1)?, row.get(2)?)?;
        members.entry(solution_id).or_default().push(member);
    }
    Ok(members)
}

fn load_members_of(conn: &Connection, solution_id: i64) -> StoreResult<Vec<Identity>> {
    let mut stmt = conn.prepare(
        "SELECT member_id, member_kind
         FROM solution_members
         WHERE solution_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([solution_id])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        members.push(parse_member(row.get(0)?, row.get(1)?)?);
    }
    Ok(members)
}

fn parse_member(member_id: i64, member_kind: String) -> StoreResult<Identity> {
    let kind = parse_kind(&member_kind, "solution_members.member_kind")?;
    Ok(Identity::new(member_id, kind))
}

fn parse_parent(
    parent_id: Option<i64>,
    parent_kind: Option<String>,
) -> StoreResult<Option<Identity>> {
    match (parent_id, parent_kind) {
        (Some(id), Some(kind)) => {
            let kind = parse_kind(&kind, "parent_kind")?;
            Ok(Some(Identity::new(id, kind)))
        }
        (None, None) => Ok(None),
        (id, kind) => Err(StoreError::InvalidData(format!(
            "inconsistent parent pointer: parent_id={id:?} parent_kind={kind:?}"
        ))),
    }
}

fn parse_kind(value: &str, column: &'static str) -> StoreResult<ItemKind> {
    ItemKind::parse(value)
        .ok_or_else(|| StoreError::InvalidData(format!("invalid item kind `{value}` in {column}")))
}

fn parse_item_row(kind: ItemKind, row: &Row<'_>, members: Vec<Identity>) -> StoreResult<Item> {
    let table = table_for(kind);
    let shown = match row.get::<_, i64>("shown")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid shown value `{other}` in {table}.shown"
            )));
        }
    };
    let attributes = ItemAttributes {
        uid: row.get("uid")?,
        version: row.get("version")?,
        shown,
        description: row.get("description")?,
        position: Point::new(row.get("x")?, row.get("y")?),
        size: Size::new(row.get("width")?, row.get("height")?),
    };
    let id: i64 = row.get("id")?;

    Ok(match kind {
        ItemKind::Requirement => Item::requirement(
            id,
            attributes,
            RequirementFacet {
                rationale: row.get("rationale")?,
                fit_criterion: row.get("fit_criterion")?,
            },
        ),
        ItemKind::Solution => Item::solution(
            id,
            attributes,
            SolutionFacet {
                link: row.get("link")?,
                members,
            },
        ),
    })
}

fn attribute_to_sql(attribute: Attribute, value: &AttributeValue) -> StoreResult<Value> {
    let converted = match attribute {
        Attribute::Shown => value.as_bool().map(|flag| Value::Integer(i64::from(flag))),
        _ if attribute.is_text() => value.as_text().map(|text| Value::Text(text.to_string())),
        _ => match value {
            AttributeValue::Integer(number) => Some(Value::Integer(*number)),
            _ => None,
        },
    };
    converted.ok_or_else(|| {
        StoreError::InvalidData(format!("value {value:?} does not fit attribute `{attribute}`"))
    })
}

fn attribute_from_sql(attribute: Attribute, value: Value) -> StoreResult<AttributeValue> {
    match (attribute, value) {
        (_, Value::Null) => Ok(AttributeValue::Null),
        (Attribute::Shown, Value::Integer(flag)) => Ok(AttributeValue::Bool(flag != 0)),
        (_, Value::Integer(number)) => Ok(AttributeValue::Integer(number)),
        (_, Value::Text(text)) => Ok(AttributeValue::Text(text)),
        (attribute, other) => Err(StoreError::InvalidData(format!(
            "unexpected stored value {other:?} for attribute `{attribute}`"
        ))),
    }
}

fn ensure_project_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["project_info", "requirements", "solutions", "solution_members"] {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
    }

    let requirement_columns = COMMON_COLUMNS
        .iter()
        .copied()
        .chain(["rationale", "fit_criterion"]);
    for column in requirement_columns {
        ensure_column(conn, "requirements", column)?;
    }
    for column in COMMON_COLUMNS.iter().copied().chain(["link"]) {
        ensure_column(conn, "solutions", column)?;
    }
    for column in ["solution_id", "member_id", "member_kind", "position"] {
        ensure_column(conn, "solution_members", column)?;
    }

    Ok(())
}

fn ensure_column(conn: &Connection, table: &'static str, column: &'static str) -> StoreResult<()> {
    let present: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2);",
        [table, column],
        |row| row.get(0),
    )?;
    if present {
        Ok(())
    } else {
        Err(StoreError::MissingRequiredColumn { table, column })
    }
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

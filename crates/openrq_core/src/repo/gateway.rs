//! Persistence gateway contract.
//!
//! # Responsibility
//! - Describe every durable operation the graph engine needs, independent of
//!   the storage engine behind it.
//! - Carry one error type for all gateway implementations.
//!
//! # Invariants
//! - A child has at most one durable parent; `add_association` refuses a
//!   second one instead of overwriting it.
//! - Every successful attribute batch bumps `version` by exactly one, unless
//!   the batch writes `Version` itself.
//! - Kind-specific attributes are refused on the other kind.

use crate::db::DbError;
use crate::model::identity::{Identity, ItemKind};
use crate::model::item::{Item, Point, Size};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by gateway operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from gateway operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target item row does not exist.
    ItemNotFound(Identity),
    /// Child already has a durable parent.
    ParentAlreadySet { child: Identity, parent: Identity },
    /// Attribute does not exist for this item kind.
    UnsupportedAttribute {
        kind: ItemKind,
        attribute: Attribute,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted or supplied data cannot be converted.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::ParentAlreadySet { child, parent } => {
                write!(f, "item {child} already has parent {parent}")
            }
            Self::UnsupportedAttribute { kind, attribute } => {
                write!(f, "attribute `{attribute}` is not stored for {kind} items")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "project store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "project store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "project store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid project data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Gateway call that produced an error, carried in engine errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    LoadItems,
    LoadItem,
    LoadLinks,
    ParentOf,
    AddAssociation,
    RemoveAssociation,
    RemoveAllAssociations,
    GetAttribute,
    SetAttributes,
    CreateItem,
    RemoveItem,
    AddMember,
    RemoveMember,
}

impl StoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadItems => "load_items",
            Self::LoadItem => "load_item",
            Self::LoadLinks => "load_links",
            Self::ParentOf => "parent_of",
            Self::AddAssociation => "add_association",
            Self::RemoveAssociation => "remove_association",
            Self::RemoveAllAssociations => "remove_all_associations_for",
            Self::GetAttribute => "get_attribute",
            Self::SetAttributes => "set_attributes",
            Self::CreateItem => "create_item",
            Self::RemoveItem => "remove_item",
            Self::AddMember => "add_member",
            Self::RemoveMember => "remove_member",
        }
    }
}

impl Display for StoreOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named item attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Uid,
    Version,
    Shown,
    Description,
    X,
    Y,
    Width,
    Height,
    /// Requirement only.
    Rationale,
    /// Requirement only.
    FitCriterion,
    /// Solution only.
    Link,
}

impl Attribute {
    /// Column name shared by both item tables.
    pub fn column(self) -> &'static str {
        match self {
            Self::Uid => "uid",
            Self::Version => "version",
            Self::Shown => "shown",
            Self::Description => "description",
            Self::X => "x",
            Self::Y => "y",
            Self::Width => "width",
            Self::Height => "height",
            Self::Rationale => "rationale",
            Self::FitCriterion => "fit_criterion",
            Self::Link => "link",
        }
    }

    /// Whether items of `kind` store this attribute.
    pub fn applies_to(self, kind: ItemKind) -> bool {
        match self {
            Self::Rationale | Self::FitCriterion => kind == ItemKind::Requirement,
            Self::Link => kind == ItemKind::Solution,
            _ => true,
        }
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            Self::Description | Self::Rationale | Self::FitCriterion | Self::Link
        )
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Attribute value as read from or written to the store.
///
/// `Null` is the null indicator for columns without a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Null,
    Integer(i64),
    Text(String),
    Bool(bool),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Integer(0) => Some(false),
            Self::Integer(1) => Some(true),
            _ => None,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Durable side of the item/link graph.
///
/// Implementations are synchronous; each call either completes or returns an
/// error, with no partial effect visible afterwards.
pub trait PersistenceGateway {
    /// Loads every persisted item with its attributes and members.
    fn load_items(&self) -> StoreResult<HashMap<Identity, Item>>;
    /// Loads one item, if present.
    fn load_item(&self, id: Identity) -> StoreResult<Option<Item>>;
    /// Loads every durable association as child -> parent.
    fn load_links(&self) -> StoreResult<HashMap<Identity, Identity>>;
    /// Durable parent of `child`, if any.
    fn parent_of(&self, child: Identity) -> StoreResult<Option<Identity>>;
    /// Records `parent` as the durable parent of `child`.
    fn add_association(&self, parent: Identity, child: Identity) -> StoreResult<()>;
    /// Clears the durable parent of `child`. Returns `false` if none existed.
    fn remove_association(&self, child: Identity) -> StoreResult<bool>;
    /// Clears every association touching `id`, as parent or child.
    fn remove_all_associations_for(&self, id: Identity) -> StoreResult<usize>;
    /// Reads one attribute.
    fn get_attribute(&self, id: Identity, attribute: Attribute) -> StoreResult<AttributeValue>;
    /// Writes a batch of attributes as one edit.
    fn set_attributes(
        &self,
        id: Identity,
        values: &[(Attribute, AttributeValue)],
    ) -> StoreResult<()>;
    /// Creates an empty item row with a fresh external UID.
    fn create_item(&self, kind: ItemKind) -> StoreResult<Identity>;
    /// Removes one item row, its memberships and its children's parent
    /// pointers.
    fn remove_item(&self, id: Identity) -> StoreResult<()>;
    /// Appends `member` to the structural children of `solution`.
    fn add_member(&self, solution: Identity, member: Identity) -> StoreResult<()>;
    /// Removes `member` from `solution`. Returns `false` if it was absent.
    fn remove_member(&self, solution: Identity, member: Identity) -> StoreResult<bool>;

    /// Writes one attribute as its own edit.
    fn set_attribute(
        &self,
        id: Identity,
        attribute: Attribute,
        value: AttributeValue,
    ) -> StoreResult<()> {
        self.set_attributes(id, &[(attribute, value)])
    }

    /// Writes position as one edit.
    fn set_position(&self, id: Identity, position: Point) -> StoreResult<()> {
        self.set_attributes(
            id,
            &[
                (Attribute::X, AttributeValue::Integer(position.x)),
                (Attribute::Y, AttributeValue::Integer(position.y)),
            ],
        )
    }

    /// Writes position and size as one edit.
    fn set_geometry(&self, id: Identity, position: Point, size: Size) -> StoreResult<()> {
        self.set_attributes(
            id,
            &[
                (Attribute::X, AttributeValue::Integer(position.x)),
                (Attribute::Y, AttributeValue::Integer(position.y)),
                (Attribute::Width, AttributeValue::Integer(size.width)),
                (Attribute::Height, AttributeValue::Integer(size.height)),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Attribute, AttributeValue};
    use crate::model::identity::ItemKind;

    #[test]
    fn kind_specific_attributes() {
        assert!(Attribute::Rationale.applies_to(ItemKind::Requirement));
        assert!(!Attribute::Rationale.applies_to(ItemKind::Solution));
        assert!(Attribute::Link.applies_to(ItemKind::Solution));
        assert!(!Attribute::Link.applies_to(ItemKind::Requirement));
        assert!(Attribute::X.applies_to(ItemKind::Solution));
    }

    #[test]
    fn bool_accepts_integer_flags() {
        assert_eq!(AttributeValue::Integer(1).as_bool(), Some(true));
        assert_eq!(AttributeValue::Integer(0).as_bool(), Some(false));
        assert_eq!(AttributeValue::Integer(2).as_bool(), None);
        assert_eq!(AttributeValue::Bool(true).as_integer(), Some(1));
        assert!(AttributeValue::Null.is_null());
    }
}

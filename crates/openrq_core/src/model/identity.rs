//! Item identity.
//!
//! # Responsibility
//! - Name one item across both item tables with a single composite key.
//!
//! # Invariants
//! - Numeric ids are only unique within one kind; equality, hashing and
//!   ordering always use both fields.
//! - An `Identity` never changes once assigned by the store.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static IDENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*([rs])([0-9]+)\s*$").expect("valid identity regex"));

/// Kind of a requirements-engineering item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Requirement,
    Solution,
}

impl ItemKind {
    /// Storage name used in `parent_kind`/`member_kind` columns.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requirement => "requirement",
            Self::Solution => "solution",
        }
    }

    /// Parses a storage name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "requirement" => Some(Self::Requirement),
            "solution" => Some(Self::Solution),
            _ => None,
        }
    }

    /// One-letter prefix of the text form (`R12`, `S3`).
    pub fn prefix(self) -> char {
        match self {
            Self::Requirement => 'R',
            Self::Solution => 'S',
        }
    }

    /// Whether items of this kind can own structural children.
    pub fn supports_members(self) -> bool {
        matches!(self, Self::Solution)
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key of one item: numeric row id plus kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub kind: ItemKind,
}

impl Identity {
    pub fn new(id: i64, kind: ItemKind) -> Self {
        Self { id, kind }
    }

    pub fn requirement(id: i64) -> Self {
        Self::new(id, ItemKind::Requirement)
    }

    pub fn solution(id: i64) -> Self {
        Self::new(id, ItemKind::Solution)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.id)
    }
}

/// Text could not be read as `R<id>` or `S<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityParseError(pub String);

impl Display for IdentityParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid item identity `{}`; expected R<id> or S<id>",
            self.0
        )
    }
}

impl Error for IdentityParseError {}

impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = IDENTITY_RE
            .captures(value)
            .ok_or_else(|| IdentityParseError(value.to_string()))?;
        let kind = match &captures[1] {
            "r" | "R" => ItemKind::Requirement,
            _ => ItemKind::Solution,
        };
        let id = captures[2]
            .parse::<i64>()
            .map_err(|_| IdentityParseError(value.to_string()))?;
        Ok(Self::new(id, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::{Identity, ItemKind};
    use std::collections::HashSet;

    #[test]
    fn same_numeric_id_with_different_kind_is_distinct() {
        let requirement = Identity::requirement(1);
        let solution = Identity::solution(1);
        assert_ne!(requirement, solution);

        let set: HashSet<_> = [requirement, solution, Identity::requirement(1)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn text_form_round_trips_case_insensitively() {
        assert_eq!(Identity::requirement(12).to_string(), "R12");
        assert_eq!("s3".parse::<Identity>().unwrap(), Identity::solution(3));
        assert_eq!(" R7 ".parse::<Identity>().unwrap(), Identity::requirement(7));
    }

    #[test]
    fn rejects_unknown_prefix_and_overflow() {
        assert!("X1".parse::<Identity>().is_err());
        assert!("R".parse::<Identity>().is_err());
        assert!("R99999999999999999999".parse::<Identity>().is_err());
    }

    #[test]
    fn storage_names_parse_back() {
        for kind in [ItemKind::Requirement, ItemKind::Solution] {
            assert_eq!(ItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ItemKind::parse("folder"), None);
    }
}

//! Domain model for requirements-engineering items.
//!
//! # Responsibility
//! - Define the identity, item and link types shared by graph, repository
//!   and service layers.
//!
//! # Invariants
//! - Every item is named by an `Identity` (numeric id + kind).
//! - Items only exist for rows the store has persisted.

pub mod identity;
pub mod item;
pub mod link;

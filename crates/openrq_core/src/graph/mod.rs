//! In-memory item/link graph.
//!
//! # Responsibility
//! - Cache live items and the links between them.
//! - Validate proposed links and derive roots without touching storage
//!   (the guard only reads the durable parent).
//!
//! # See also
//! - `service::graph_engine` for the façade that keeps this in sync with the
//!   store.

pub mod geometry;
pub mod guard;
pub mod link_index;
pub mod registry;
pub mod roots;

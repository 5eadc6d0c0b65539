//! Use-case layer.
//!
//! # Responsibility
//! - Drive the in-memory graph and the gateway together.
//! - Keep presentation layers decoupled from storage details.

pub mod graph_engine;
pub mod label;
pub mod project;

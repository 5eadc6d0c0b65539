//! Persistence layer.
//!
//! # Responsibility
//! - Define the gateway contract the graph engine writes through.
//! - Keep SQL details out of the engine.
//!
//! # Invariants
//! - Gateway APIs return semantic errors (`ItemNotFound`, `ParentAlreadySet`)
//!   in addition to transport errors.

pub mod gateway;
pub mod project_store;

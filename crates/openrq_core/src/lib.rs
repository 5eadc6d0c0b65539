//! Core of the OpenRQ requirements editor.
//! Owns the item/link graph, its consistency rules and its persistence.

pub mod config;
pub mod db;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig, GridConfig, LogConfig};
pub use graph::geometry::{snap_to_grid, LinkGeometry, ScenePoint};
pub use graph::guard::{ConsistencyGuard, GuardError};
pub use graph::link_index::LinkIndex;
pub use graph::registry::ItemRegistry;
pub use graph::roots::{ForestNode, RootResolver};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::identity::{Identity, IdentityParseError, ItemKind};
pub use model::item::{
    Item, ItemAttributes, ItemFacet, Point, RequirementFacet, Size, SolutionFacet,
};
pub use model::link::Link;
pub use repo::gateway::{
    Attribute, AttributeValue, PersistenceGateway, StoreError, StoreOperation, StoreResult,
};
pub use repo::project_store::SqliteProjectStore;
pub use service::graph_engine::{
    CleanupFailure, DeleteReport, EngineError, EngineResult, EngineState, GraphEngine,
    LoadReport, SkipReason, SkippedLink,
};
pub use service::label::derive_item_label;
pub use service::project::{project_file_path, Project, ProjectError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

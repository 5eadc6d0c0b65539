//! Project file lifecycle.
//!
//! # Responsibility
//! - Resolve project paths and open (or create) the backing database.
//! - Hand out stores and ready engines bound to the open connection.
//!
//! # Invariants
//! - Project files always carry the `.orq` extension.
//! - The project name is recorded once, on creation, from the file stem.

use crate::config::EngineConfig;
use crate::db::{open_db, DbError};
use crate::repo::gateway::StoreError;
use crate::repo::project_store::SqliteProjectStore;
use crate::service::graph_engine::{EngineError, GraphEngine};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Extension of project files, without the dot.
pub const PROJECT_EXTENSION: &str = "orq";

/// Errors from opening or using a project.
#[derive(Debug)]
pub enum ProjectError {
    Db(DbError),
    Store(StoreError),
    Engine(EngineError),
    /// Path has no usable file name.
    InvalidPath(PathBuf),
}

impl Display for ProjectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::InvalidPath(path) => write!(f, "invalid project path: `{}`", path.display()),
        }
    }
}

impl Error for ProjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Engine(err) => Some(err),
            Self::InvalidPath(_) => None,
        }
    }
}

impl From<DbError> for ProjectError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for ProjectError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<EngineError> for ProjectError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

/// Appends `.orq` unless `path` already ends with it.
pub fn project_file_path(path: impl AsRef<Path>) -> Result<PathBuf, ProjectError> {
    let path = path.as_ref();
    let has_name = path
        .file_stem()
        .is_some_and(|stem| !stem.to_string_lossy().trim().is_empty());
    if !has_name {
        return Err(ProjectError::InvalidPath(path.to_path_buf()));
    }
    if path.extension().is_some_and(|ext| ext == PROJECT_EXTENSION) {
        return Ok(path.to_path_buf());
    }
    let mut file_name = path.as_os_str().to_os_string();
    file_name.push(".");
    file_name.push(PROJECT_EXTENSION);
    Ok(PathBuf::from(file_name))
}

/// One open project file.
pub struct Project {
    conn: Connection,
    path: PathBuf,
    name: String,
}

impl Project {
    /// Opens or creates the project at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = project_file_path(path)?;
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| ProjectError::InvalidPath(path.clone()))?;

        let conn = open_db(&path)?;
        let name = {
            let store = SqliteProjectStore::try_new(&conn)?;
            if store.init_project_name(&stem)? {
                info!("event=project_create module=project status=ok name={stem}");
            }
            store.project_name()?.unwrap_or(stem)
        };
        info!(
            "event=project_open module=project status=ok path={}",
            path.display()
        );

        Ok(Self { conn, path, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store bound to this project's connection.
    pub fn store(&self) -> Result<SqliteProjectStore<'_>, ProjectError> {
        SqliteProjectStore::try_new(&self.conn).map_err(Into::into)
    }

    /// Engine bound to this project, already loaded.
    pub fn engine(
        &self,
        config: EngineConfig,
    ) -> Result<GraphEngine<SqliteProjectStore<'_>>, ProjectError> {
        let mut engine = GraphEngine::new(self.store()?, config);
        engine.open()?;
        Ok(engine)
    }
}

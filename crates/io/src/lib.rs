// Storage backends and export

pub mod atomic;
pub mod csv;
pub mod json;
pub mod native;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use dbforestale_engine::model::{Project, RecordSet};
use dbforestale_engine::repository::{ParcelRepository, ProjectRepository, StoreError};

pub use json::JsonStore;
pub use native::SqliteStore;

/// Stored document / database schema version.
/// Increment when the layout changes in a way old versions can't read.
pub const DOCUMENT_VERSION: u32 = 1;

/// SQLite database file name inside the data directory.
pub const SQLITE_FILE: &str = "dbforestale.sqlite";

/// Which backend holds the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Json,
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Json => "json",
            Backend::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Backend::Json),
            "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
            other => Err(format!("unknown storage backend '{other}' (expected json or sqlite)")),
        }
    }
}

/// A store chosen at runtime.
pub enum DataStore {
    Json(JsonStore),
    Sqlite(SqliteStore),
}

/// Open the data directory with the given backend.
pub fn open_store(backend: Backend, dir: &Path) -> Result<DataStore, StoreError> {
    log::debug!("opening {} store at {}", backend, dir.display());
    match backend {
        Backend::Json => Ok(DataStore::Json(JsonStore::open(dir))),
        Backend::Sqlite => Ok(DataStore::Sqlite(SqliteStore::open(&dir.join(SQLITE_FILE))?)),
    }
}

impl ProjectRepository for DataStore {
    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        match self {
            DataStore::Json(s) => s.list_projects(),
            DataStore::Sqlite(s) => s.list_projects(),
        }
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        match self {
            DataStore::Json(s) => s.get_project(id),
            DataStore::Sqlite(s) => s.get_project(id),
        }
    }

    fn put_project(&mut self, project: &Project) -> Result<(), StoreError> {
        match self {
            DataStore::Json(s) => s.put_project(project),
            DataStore::Sqlite(s) => s.put_project(project),
        }
    }
}

impl ParcelRepository for DataStore {
    fn get(&self, project_id: &str) -> Result<RecordSet, StoreError> {
        match self {
            DataStore::Json(s) => s.get(project_id),
            DataStore::Sqlite(s) => s.get(project_id),
        }
    }

    fn put(&mut self, project_id: &str, records: &RecordSet) -> Result<(), StoreError> {
        match self {
            DataStore::Json(s) => s.put(project_id, records),
            DataStore::Sqlite(s) => s.put(project_id, records),
        }
    }
}

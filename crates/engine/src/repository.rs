//! Storage seams.
//!
//! The engine never touches files. Backends implement [`ProjectRepository`]
//! and [`ParcelRepository`]; anything implementing both is a [`Store`].

use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Project, RecordSet};

#[derive(Debug)]
pub enum StoreError {
    /// Filesystem failure.
    Io(std::io::Error),
    /// Document could not be encoded or decoded.
    Serialize(String),
    /// Backend-specific failure (database errors and the like).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "storage I/O error: {e}"),
            Self::Serialize(msg) => write!(f, "invalid stored document: {msg}"),
            Self::Backend(msg) => write!(f, "storage backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

pub trait ProjectRepository {
    /// All projects, oldest first.
    fn list_projects(&self) -> Result<Vec<Project>, StoreError>;
    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError>;
    /// Insert or replace a project by id.
    fn put_project(&mut self, project: &Project) -> Result<(), StoreError>;
}

pub trait ParcelRepository {
    /// The project's record set; empty when nothing was stored yet.
    fn get(&self, project_id: &str) -> Result<RecordSet, StoreError>;
    /// Replace the project's record set.
    fn put(&mut self, project_id: &str, records: &RecordSet) -> Result<(), StoreError>;
}

/// A complete backend.
pub trait Store: ProjectRepository + ParcelRepository {}

impl<T: ProjectRepository + ParcelRepository> Store for T {}

/// In-memory store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    projects: Vec<Project>,
    records: BTreeMap<String, RecordSet>,
    /// Number of `put` calls, for asserting write behavior.
    pub writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectRepository for MemoryStore {
    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.projects.clone())
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.iter().find(|p| p.id == id).cloned())
    }

    fn put_project(&mut self, project: &Project) -> Result<(), StoreError> {
        match self.projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => *existing = project.clone(),
            None => self.projects.push(project.clone()),
        }
        Ok(())
    }
}

impl ParcelRepository for MemoryStore {
    fn get(&self, project_id: &str) -> Result<RecordSet, StoreError> {
        Ok(self.records.get(project_id).cloned().unwrap_or_default())
    }

    fn put(&mut self, project_id: &str, records: &RecordSet) -> Result<(), StoreError> {
        self.records.insert(project_id.to_string(), records.clone());
        self.writes += 1;
        Ok(())
    }
}

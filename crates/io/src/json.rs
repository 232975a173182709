// JSON document store
//
// Layout under the data directory:
//   projects.json             project index (array of projects)
//   parcels/<project-id>.json one record-set document per project

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dbforestale_engine::model::{Project, RecordSet};
use dbforestale_engine::repository::{ParcelRepository, ProjectRepository, StoreError};

use crate::atomic::atomic_write;
use crate::DOCUMENT_VERSION;

const PROJECTS_FILE: &str = "projects.json";
const PARCELS_DIR: &str = "parcels";

/// On-disk wrapper around a project's record set.
#[derive(Debug, Serialize, Deserialize)]
struct RecordSetDocument {
    version: u32,
    project_id: String,
    parcels: RecordSet,
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `dir`. Nothing is created until the first write.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn projects_path(&self) -> PathBuf {
        self.dir.join(PROJECTS_FILE)
    }

    fn parcels_path(&self, project_id: &str) -> PathBuf {
        self.dir
            .join(PARCELS_DIR)
            .join(format!("{}.json", file_stem(project_id)))
    }

    fn read_projects(&self) -> Result<Vec<Project>, StoreError> {
        let path = self.projects_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Project ids become file names; keep them to a safe alphabet.
fn file_stem(project_id: &str) -> String {
    project_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl ProjectRepository for JsonStore {
    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects = self.read_projects()?;
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.read_projects()?.into_iter().find(|p| p.id == id))
    }

    fn put_project(&mut self, project: &Project) -> Result<(), StoreError> {
        let mut projects = self.read_projects()?;
        match projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => *existing = project.clone(),
            None => projects.push(project.clone()),
        }
        let json = serde_json::to_vec_pretty(&projects)?;
        atomic_write(&self.projects_path(), &json)?;
        Ok(())
    }
}

impl ParcelRepository for JsonStore {
    fn get(&self, project_id: &str) -> Result<RecordSet, StoreError> {
        let path = self.parcels_path(project_id);
        if !path.exists() {
            return Ok(RecordSet::new());
        }

        let content = fs::read_to_string(&path)?;
        let doc: RecordSetDocument = serde_json::from_str(&content)?;
        if doc.version > DOCUMENT_VERSION {
            log::warn!(
                "{} was written by a newer version (v{}), reading as v{}",
                path.display(),
                doc.version,
                DOCUMENT_VERSION
            );
        }
        if doc.project_id != project_id {
            return Err(StoreError::Serialize(format!(
                "{} belongs to project '{}'",
                path.display(),
                doc.project_id
            )));
        }
        Ok(doc.parcels)
    }

    fn put(&mut self, project_id: &str, records: &RecordSet) -> Result<(), StoreError> {
        let doc = RecordSetDocument {
            version: DOCUMENT_VERSION,
            project_id: project_id.to_string(),
            parcels: records.clone(),
        };
        let json = serde_json::to_vec_pretty(&doc)?;
        atomic_write(&self.parcels_path(project_id), &json)?;
        log::debug!("wrote {} parcel(s) for '{}'", records.len(), project_id);
        Ok(())
    }
}

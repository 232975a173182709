// SQLite store
//
// One row per project and one row per parcel. The parcel form is kept as a
// JSON column; identity and ordering live in real columns so the set can be
// replaced in a single transaction.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use dbforestale_engine::model::{Parcel, ParcelForm, Project, RecordSet};
use dbforestale_engine::repository::{ParcelRepository, ProjectRepository, StoreError};

use crate::DOCUMENT_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    client TEXT NOT NULL,
    authority TEXT NOT NULL,
    created_at TEXT NOT NULL       -- RFC 3339
);

CREATE TABLE IF NOT EXISTS parcels (
    project_id TEXT NOT NULL,
    position INTEGER NOT NULL,     -- order within the record set
    id TEXT NOT NULL,              -- uuid
    created_at TEXT NOT NULL,
    last_modified TEXT,            -- NULL until first save
    main_unit TEXT NOT NULL,
    sub_unit TEXT NOT NULL,
    form TEXT NOT NULL,            -- JSON
    PRIMARY KEY (project_id, position)
);
"#;

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialize(format!("bad timestamp '{value}': {e}")))
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path).map_err(db_err)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        let version: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        match version.and_then(|v| v.parse::<u32>().ok()) {
            Some(v) if v > DOCUMENT_VERSION => {
                log::warn!("database was written by a newer version (v{v})");
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?1)",
                    params![DOCUMENT_VERSION.to_string()],
                )
                .map_err(db_err)?;
            }
        }

        Ok(Self { conn })
    }

    fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRow> {
        Ok(ProjectRow {
            id: row.get(0)?,
            name: row.get(1)?,
            location: row.get(2)?,
            client: row.get(3)?,
            authority: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

/// A project row before its timestamp is decoded.
struct ProjectRow {
    id: String,
    name: String,
    location: String,
    client: String,
    authority: String,
    created_at: String,
}

impl ProjectRow {
    fn into_project(self) -> Result<Project, StoreError> {
        Ok(Project {
            created_at: parse_time(&self.created_at)?,
            id: self.id,
            name: self.name,
            location: self.location,
            client: self.client,
            authority: self.authority,
        })
    }
}

impl ProjectRepository for SqliteStore {
    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, location, client, authority, created_at
                 FROM projects ORDER BY created_at, id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], Self::row_to_project)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter().map(ProjectRow::into_project).collect()
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, location, client, authority, created_at
                 FROM projects WHERE id = ?1",
                params![id],
                Self::row_to_project,
            )
            .optional()
            .map_err(db_err)?;

        row.map(ProjectRow::into_project).transpose()
    }

    fn put_project(&mut self, project: &Project) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO projects (id, name, location, client, authority, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.id,
                    project.name,
                    project.location,
                    project.client,
                    project.authority,
                    project.created_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

/// A parcel row before its text columns are decoded.
struct ParcelRow {
    id: String,
    created_at: String,
    last_modified: Option<String>,
    form: String,
}

impl ParcelRepository for SqliteStore {
    fn get(&self, project_id: &str) -> Result<RecordSet, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, created_at, last_modified, form
                 FROM parcels WHERE project_id = ?1 ORDER BY position",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(ParcelRow {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    last_modified: row.get(2)?,
                    form: row.get(3)?,
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        let mut records = RecordSet::new();
        for row in rows {
            let id = Uuid::parse_str(&row.id)
                .map_err(|e| StoreError::Serialize(format!("bad parcel id '{}': {e}", row.id)))?;
            let form: ParcelForm = serde_json::from_str(&row.form)?;
            records.push(Parcel {
                id,
                created_at: parse_time(&row.created_at)?,
                last_modified: row.last_modified.as_deref().map(parse_time).transpose()?,
                form,
            });
        }
        Ok(records)
    }

    fn put(&mut self, project_id: &str, records: &RecordSet) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM parcels WHERE project_id = ?1", params![project_id])
            .map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO parcels
                     (project_id, position, id, created_at, last_modified, main_unit, sub_unit, form)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(db_err)?;
            for (position, parcel) in records.iter().enumerate() {
                let form = serde_json::to_string(&parcel.form)?;
                stmt.execute(params![
                    project_id,
                    position as i64,
                    parcel.id.to_string(),
                    parcel.created_at.to_rfc3339(),
                    parcel.last_modified.map(|t| t.to_rfc3339()),
                    parcel.form.main_unit,
                    parcel.form.sub_unit,
                    form,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        log::debug!("wrote {} parcel(s) for '{}'", records.len(), project_id);
        Ok(())
    }
}

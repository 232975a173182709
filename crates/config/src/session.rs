use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use dbforestale_engine::EditingContext;

const SESSION_FILE: &str = "session.json";
const SESSION_VERSION: u32 = 1;

/// Which project and parcel the CLI is working on, kept between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Session {
    pub version: u32,
    pub current_project: Option<String>,
    pub current_parcel: Option<usize>,
}

impl Session {
    /// Session file inside a data directory.
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(SESSION_FILE)
    }

    /// Load the session of a data directory. Missing or unreadable files
    /// yield None.
    pub fn load(data_dir: &Path) -> Option<Self> {
        let path = Self::path(data_dir);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("ignoring unreadable {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), String> {
        fs::create_dir_all(data_dir).map_err(|e| e.to_string())?;
        let session = Session { version: SESSION_VERSION, ..self.clone() };
        let json = serde_json::to_string_pretty(&session).map_err(|e| e.to_string())?;
        fs::write(Self::path(data_dir), json).map_err(|e| e.to_string())
    }

    /// Editing context for the current project, if one is selected.
    pub fn context(&self) -> Option<EditingContext> {
        self.current_project
            .as_ref()
            .map(|id| EditingContext::new(id.clone(), self.current_parcel))
    }

    pub fn set_context(&mut self, ctx: &EditingContext) {
        self.current_project = Some(ctx.record_set_id.clone());
        self.current_parcel = ctx.index;
    }
}

impl From<&EditingContext> for Session {
    fn from(ctx: &EditingContext) -> Self {
        let mut session = Session { version: SESSION_VERSION, ..Session::default() };
        session.set_context(ctx);
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_session() {
        let dir = tempdir().unwrap();
        assert_eq!(Session::load(dir.path()), None);
        assert_eq!(Session::default().context(), None);
    }

    #[test]
    fn test_roundtrip_through_context() {
        let dir = tempdir().unwrap();
        let ctx = EditingContext::new("project-1", Some(3));
        Session::from(&ctx).save(dir.path()).unwrap();

        let loaded = Session::load(dir.path()).unwrap();
        assert_eq!(loaded.version, SESSION_VERSION);
        assert_eq!(loaded.context(), Some(ctx));
    }

    #[test]
    fn test_corrupt_session_ignored() {
        let dir = tempdir().unwrap();
        fs::write(Session::path(dir.path()), "[").unwrap();
        assert_eq!(Session::load(dir.path()), None);
    }
}

use super::state::StorageState;
use crate::utils::is_safe_key;
use crate::{Config, Result, ScraperError};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

/// A named authentication snapshot as read back from disk.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub name: String,
    pub state: StorageState,
    pub saved_at: DateTime<Utc>,
}

/// Durable store of authentication snapshots, one JSON file per session name
/// under the sessions directory. Last write wins.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(config.storage.sessions_dir()?))
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if !is_safe_key(name) {
            return Err(ScraperError::InvalidSessionName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// A missing file and an unparsable blob both read as absent. A corrupt
    /// snapshot only means the login has to be re-run.
    pub fn load(&self, name: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("could not read session snapshot {}: {}", name, e);
                return Ok(None);
            }
        };

        match serde_json::from_str::<StorageState>(&content) {
            Ok(state) => {
                let saved_at = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                Ok(Some(SessionSnapshot {
                    name: name.to_string(),
                    state,
                    saved_at,
                }))
            }
            Err(e) => {
                tracing::warn!("ignoring corrupt session snapshot {}: {}", name, e);
                Ok(None)
            }
        }
    }

    /// Atomic overwrite: write to a sibling temp file, then rename over the
    /// target so a crash mid-write never leaves a half-written snapshot.
    pub fn save(&self, name: &str, state: &StorageState) -> Result<()> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;

        let tmp = self.dir.join(format!("{name}.json.tmp"));
        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!("saved session snapshot {}", name);
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json")
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path)?;
        Ok(true)
    }

    pub fn has(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.exists()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::Cookie;
    use tempfile::TempDir;

    fn sample_state() -> StorageState {
        StorageState {
            cookies: vec![Cookie {
                name: "sid".to_string(),
                value: "secret".to_string(),
                domain: ".mock.social".to_string(),
                path: "/".to_string(),
                expires: 0.0,
                http_only: true,
                secure: true,
                same_site: "Lax".to_string(),
            }],
            origins: Vec::new(),
        }
    }

    fn store() -> (SessionStore, TempDir) {
        let temp = TempDir::new().unwrap();
        (SessionStore::new(temp.path()), temp)
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let (store, _temp) = store();
        let state = sample_state();

        store.save("mock", &state).unwrap();
        let snapshot = store.load("mock").unwrap().unwrap();

        assert_eq!(snapshot.name, "mock");
        assert_eq!(snapshot.state, state);
    }

    #[test]
    fn test_load_never_saved_is_absent() {
        let (store, _temp) = store();
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_snapshot_is_absent() {
        let (store, temp) = store();
        std::fs::write(temp.path().join("broken.json"), "{not json").unwrap();

        assert!(store.load("broken").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_by_name() {
        let (store, _temp) = store();
        store.save("mock", &StorageState::new()).unwrap();

        let state = sample_state();
        store.save("mock", &state).unwrap();

        let snapshot = store.load("mock").unwrap().unwrap();
        assert_eq!(snapshot.state, state);
        assert_eq!(store.list().unwrap(), vec!["mock".to_string()]);
    }

    #[test]
    fn test_list_and_delete() {
        let (store, _temp) = store();
        store.save("instagram", &StorageState::new()).unwrap();
        store.save("twitter", &StorageState::new()).unwrap();

        assert_eq!(
            store.list().unwrap(),
            vec!["instagram".to_string(), "twitter".to_string()]
        );

        assert!(store.delete("twitter").unwrap());
        assert!(!store.delete("twitter").unwrap());
        assert_eq!(store.list().unwrap(), vec!["instagram".to_string()]);
    }

    #[test]
    fn test_has_reflects_presence() {
        let (store, _temp) = store();
        assert!(!store.has("mock"));

        store.save("mock", &StorageState::new()).unwrap();
        assert!(store.has("mock"));
    }

    #[test]
    fn test_unsafe_name_rejected() {
        let (store, _temp) = store();
        assert!(matches!(
            store.save("../evil", &StorageState::new()),
            Err(ScraperError::InvalidSessionName(_))
        ));
        assert!(store.load("a/b").is_err());
    }

    #[test]
    fn test_list_on_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path().join("never-created"));
        assert!(store.list().unwrap().is_empty());
    }
}

//! Session persistence.
//!
//! Stores hold whole [`SessionRecord`]s keyed by id. The manager saves on
//! every status change and reloads records at startup as archived sessions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Result, SessionError};
use crate::model::SessionRecord;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, record: &SessionRecord) -> Result<()>;

    async fn load_all(&self) -> Result<Vec<SessionRecord>>;
}

/// One JSON file per session under a directory.
pub struct FsSessionStore {
    dir: PathBuf,
}

impl FsSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(record)?;
        let path = self.path_for(&record.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SessionRecord>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<SessionRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session record"),
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

/// Keeps records in process memory.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<BTreeMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| SessionError::Store("memory store lock poisoned".into()))?
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SessionRecord>> {
        let mut records: Vec<SessionRecord> = self
            .records
            .lock()
            .map_err(|_| SessionError::Store("memory store lock poisoned".into()))?
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SessionStatus, Turn};
    use chrono::Utc;

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            profile_id: "claude".to_string(),
            change_id: Some("run-7".to_string()),
            model: None,
            extra_args: vec![],
            cwd: None,
            status: SessionStatus::Completed,
            message: None,
            exit_code: Some(0),
            spawn_count: 1,
            history: vec![Turn::user("fix it"), Turn::assistant("done")],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fs_store_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsSessionStore::new(dir.path().join("sessions"));

        store.save(&record("s-1")).await.expect("save");
        let mut updated = record("s-1");
        updated.status = SessionStatus::Failed;
        store.save(&updated).await.expect("overwrite");
        store.save(&record("s-2")).await.expect("save");

        let loaded = store.load_all().await.expect("load");
        assert_eq!(loaded.len(), 2);
        let first = loaded.iter().find(|r| r.id == "s-1").expect("s-1");
        assert_eq!(first.status, SessionStatus::Failed);
        assert_eq!(first.history.len(), 2);
    }

    #[tokio::test]
    async fn test_fs_store_skips_garbage_and_missing_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsSessionStore::new(dir.path().join("absent"));
        assert!(store.load_all().await.expect("empty").is_empty());

        let store = FsSessionStore::new(dir.path());
        std::fs::write(dir.path().join("broken.json"), "{not json").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");
        store.save(&record("ok")).await.expect("save");

        let loaded = store.load_all().await.expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "ok");
    }

    #[tokio::test]
    async fn test_memory_store_overwrites_by_id() {
        let store = MemorySessionStore::new();
        store.save(&record("a")).await.expect("save");
        store.save(&record("a")).await.expect("save");
        assert_eq!(store.load_all().await.expect("load").len(), 1);
    }
}

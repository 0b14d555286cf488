use anyhow::{Context, Result};
use async_trait::async_trait;
use autoprompt_core::SessionSnapshot;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a session (prompts, delay, cursor) is kept between runs.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, session: &SessionSnapshot) -> Result<()>;

    /// `None` when nothing was saved yet.
    async fn load(&self) -> Result<Option<SessionSnapshot>>;
}

pub struct JsonFileStorage {
    pub path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok(); // ensure folder exists
        }
        Self { path }
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn save(&self, session: &SessionSnapshot) -> Result<()> {
        let data = serde_json::to_string_pretty(session)?;
        // Write then rename; readers never see a partial file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), cursor = session.cursor, "session saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        };
        let session = serde_json::from_str(&data)
            .with_context(|| format!("{} is not a saved session", self.path.display()))?;
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(cursor: usize) -> SessionSnapshot {
        SessionSnapshot {
            prompts: vec!["one".into(), "two".into(), "three".into()],
            delay_ms: 30000,
            cursor,
        }
    }

    #[tokio::test]
    async fn nothing_saved_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("session.json"));
        assert_eq!(storage.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn later_saves_replace_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested/session.json"));

        storage.save(&session(1)).await.unwrap();
        storage.save(&session(2)).await.unwrap();

        let loaded = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded.cursor, 2);
        assert!(!loaded.is_finished());
        assert!(!dir.path().join("nested/session.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStorage::new(&path).load().await.unwrap_err();
        assert!(err.to_string().contains("is not a saved session"));
    }
}

//! Local filesystem state store.
//!
//! The whole state map is rewritten after every successful delivery
//! (write to temp, then rename), so a crash mid-run loses at most the
//! in-flight record and never an earlier entry.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::storage::{Change, PersistedState, StateStore};

/// JSON file backed state store.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    path: PathBuf,
    state: PersistedState,
}

impl LocalStateStore {
    /// Open the store, recovering from a missing or unreadable file.
    ///
    /// Never fails: anything that cannot be loaded starts as empty state.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match Self::load(&path).await {
            Ok(Some(state)) => {
                log::info!("Loaded {} state entries from {}", state.len(), path.display());
                state
            }
            Ok(None) => {
                log::info!("No state file at {}; starting fresh", path.display());
                PersistedState::default()
            }
            Err(e) => {
                log::warn!("Ignoring unreadable state at {}: {}", path.display(), e);
                PersistedState::default()
            }
        };
        Self { path, state }
    }

    /// Strict load: `None` when the file is absent, an error when it is unreadable.
    pub async fn load(path: &Path) -> Result<Option<PersistedState>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => PersistedState::from_json(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the full state atomically (write to temp, then rename).
    async fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = self.state.to_json()?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    fn check(&self, record: &Record) -> Change {
        self.state.change_for(record)
    }

    async fn commit(&mut self, record: &Record) -> Result<()> {
        self.state.record_delivery(record, Utc::now());
        self.flush().await?;
        log::debug!("Committed {} to {}", record.identity, self.path.display());
        Ok(())
    }

    fn state(&self) -> &PersistedState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::{Price, Route};

    fn record() -> Record {
        Record::new("https://ucuzaucak.net/ilan/ankara-roma/")
            .with_route(Route::new("Ankara", "Roma"))
            .with_price(Some(Price {
                amount: 2499,
                text: "2.499 TL".into(),
            }))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let store = LocalStateStore::open(dir.path().join("state.json")).await;
        assert!(store.state().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{ truncated").await.unwrap();

        let store = LocalStateStore::open(&path).await;
        assert!(store.state().is_empty());
        assert!(LocalStateStore::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_commit_persists_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let rec = record();

        let mut store = LocalStateStore::open(&path).await;
        assert_eq!(store.check(&rec), Change::New);
        store.commit(&rec).await.unwrap();
        assert!(!path.with_extension("tmp").exists());

        let reopened = LocalStateStore::open(&path).await;
        assert_eq!(reopened.state().len(), 1);
        assert_eq!(reopened.check(&rec), Change::Unchanged);
    }

    #[tokio::test]
    async fn test_commit_keeps_previous_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(
            &path,
            br#"{"seen_ids": {"https://ucuzaucak.net/ilan/eski": {"url": "x", "price": 10}}}"#,
        )
        .await
        .unwrap();

        let mut store = LocalStateStore::open(&path).await;
        store.commit(&record()).await.unwrap();

        let saved = LocalStateStore::load(&path).await.unwrap().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved.get("https://ucuzaucak.net/ilan/eski").unwrap().price, 10);
    }
}

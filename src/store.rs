use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Subscriber chat ids persisted as a JSON array.
///
/// All file access goes through one mutex so a `/start` arriving while a
/// notification is being fanned out cannot lose an update.
#[derive(Debug)]
pub struct SubscriberStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All subscribers in insertion order. Missing or unreadable file yields an empty list.
    pub async fn load(&self) -> Vec<i64> {
        let _guard = self.lock.lock().await;
        match self.read_unlocked().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("{e:#}");
                Vec::new()
            }
        }
    }

    /// Add `chat_id` unless already present. Returns `true` if it was added.
    ///
    /// The whole list is rewritten on every addition. A file that exists but
    /// cannot be read is an error and is left untouched.
    pub async fn add(&self, chat_id: i64) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut ids = self.read_unlocked().await?;
        if ids.contains(&chat_id) {
            return Ok(false);
        }
        ids.push(chat_id);
        self.write_unlocked(&ids).await?;
        Ok(true)
    }

    /// Missing file and unparsable contents read as empty; IO errors are returned.
    async fn read_unlocked(&self) -> Result<Vec<i64>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No subscriber file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", self.path.display()));
            }
        };
        match serde_json::from_str::<Vec<i64>>(&contents) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                warn!("Ignoring unparsable subscriber file {}: {e}", self.path.display());
                Ok(Vec::new())
            }
        }
    }

    async fn write_unlocked(&self, ids: &[i64]) -> Result<()> {
        let contents = serde_json::to_string(ids).context("failed to serialize subscribers")?;
        // Write to a sibling file then rename so a crash never leaves a torn list
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

//! File-based knowledge store: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `KnowledgeEntry`.
//! Default location: `~/.codeweave/knowledge.jsonl`

use async_trait::async_trait;
use codeweave_core::error::MemoryError;
use codeweave_core::knowledge::{KnowledgeEntry, KnowledgeStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// A file-backed knowledge store using JSONL (one JSON object per line).
///
/// Entries are loaded on creation and flushed to disk on every mutation.
/// The write lock is held across the flush so concurrent writers never
/// interleave partial files.
pub struct FileKnowledgeStore {
    path: PathBuf,
    entries: Arc<RwLock<Vec<KnowledgeEntry>>>,
}

impl FileKnowledgeStore {
    /// Open the store at `path`. A missing file means an empty store; the
    /// file is created on first write.
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "File knowledge store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<KnowledgeEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<KnowledgeEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted knowledge entry");
                    None
                }
            })
            .collect()
    }

    fn flush(&self, entries: &[KnowledgeEntry]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create knowledge directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize knowledge entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write knowledge file: {e}")))
    }
}

#[async_trait]
impl KnowledgeStore for FileKnowledgeStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn all(&self) -> Result<Vec<KnowledgeEntry>, MemoryError> {
        Ok(self.entries.read().await.clone())
    }

    async fn append(&self, mut entry: KnowledgeEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        let mut entries = self.entries.write().await;
        entries.push(entry);
        if let Err(e) = self.flush(&entries) {
            entries.pop();
            return Err(e);
        }
        Ok(id)
    }

    async fn record_usage(&self, ids: &[String]) -> Result<(), MemoryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.write().await;
        let mut touched = false;
        for entry in entries.iter_mut().filter(|e| ids.contains(&e.id)) {
            entry.usage_count = entry.usage_count.saturating_add(1);
            touched = true;
        }
        if touched {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

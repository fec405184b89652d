//! In-memory knowledge store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use codeweave_core::error::MemoryError;
use codeweave_core::knowledge::{KnowledgeEntry, KnowledgeStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Stores entries in a Vec behind a `RwLock`.
pub struct InMemoryKnowledgeStore {
    entries: Arc<RwLock<Vec<KnowledgeEntry>>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed the store with existing entries.
    pub fn with_entries(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn all(&self) -> Result<Vec<KnowledgeEntry>, MemoryError> {
        Ok(self.entries.read().await.clone())
    }

    async fn append(&self, mut entry: KnowledgeEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn record_usage(&self, ids: &[String]) -> Result<(), MemoryError> {
        let mut entries = self.entries.write().await;
        for entry in entries.iter_mut().filter(|e| ids.contains(&e.id)) {
            entry.usage_count = entry.usage_count.saturating_add(1);
        }
        Ok(())
    }
}

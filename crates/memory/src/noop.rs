//! No-op knowledge store: disables persistent knowledge entirely.

use async_trait::async_trait;
use codeweave_core::error::MemoryError;
use codeweave_core::knowledge::{KnowledgeEntry, KnowledgeStore};

/// A knowledge store that stores nothing.
pub struct NoopKnowledgeStore;

#[async_trait]
impl KnowledgeStore for NoopKnowledgeStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn all(&self) -> Result<Vec<KnowledgeEntry>, MemoryError> {
        Ok(Vec::new())
    }

    async fn append(&self, entry: KnowledgeEntry) -> Result<String, MemoryError> {
        Ok(entry.id)
    }

    async fn record_usage(&self, _ids: &[String]) -> Result<(), MemoryError> {
        Ok(())
    }
}

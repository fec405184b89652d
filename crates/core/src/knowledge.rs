//! Knowledge entries and the store trait.
//!
//! Knowledge is short, tagged guidance the model saved in earlier sessions
//! (conventions, pitfalls, preferences). The store is an injected collaborator:
//! the orchestrator reads a snapshot, appends new entries, and records usage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoryError;

/// Where a knowledge entry applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeScope {
    Global,
    #[default]
    Project,
}

/// A persisted piece of tagged guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,

    /// Normalized tags: lower-case, leading `#`.
    pub tags: Vec<String>,

    pub content: String,

    #[serde(default)]
    pub scope: KnowledgeScope,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub usage_count: u32,
}

impl KnowledgeEntry {
    /// Create an entry, normalizing and de-duplicating its tags.
    pub fn new<I, S>(tags: I, content: impl Into<String>, scope: KnowledgeScope) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for tag in tags {
            if let Some(t) = normalize_tag(tag.as_ref())
                && !normalized.contains(&t)
            {
                normalized.push(t);
            }
        }
        Self {
            id: Uuid::new_v4().to_string(),
            tags: normalized,
            content: content.into(),
            scope,
            created_at: Utc::now(),
            usage_count: 0,
        }
    }
}

/// Normalize a tag to lower-case with a single leading `#`.
///
/// Returns `None` for tags that are empty after trimming.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let bare = raw.trim().trim_start_matches('#').trim();
    if bare.is_empty() {
        return None;
    }
    let bare: String = bare
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    Some(format!("#{bare}"))
}

/// Persistent knowledge storage.
///
/// Implementations must allow concurrent reads and serialize writes.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "none").
    fn name(&self) -> &str;

    /// Every stored entry, in insertion order.
    async fn all(&self) -> std::result::Result<Vec<KnowledgeEntry>, MemoryError>;

    /// Append a new entry; returns its id.
    async fn append(&self, entry: KnowledgeEntry) -> std::result::Result<String, MemoryError>;

    /// Increment the usage counter of each listed entry. Unknown ids are ignored.
    async fn record_usage(&self, ids: &[String]) -> std::result::Result<(), MemoryError>;
}

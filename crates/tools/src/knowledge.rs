//! `save_knowledge`: persist an insight through the injected store.

use codeweave_core::error::ToolError;
use codeweave_core::knowledge::{KnowledgeEntry, KnowledgeStore};
use codeweave_core::tool::ToolExecutionResult;
use serde_json::json;

use crate::request::KnowledgeArgs;

pub async fn save_knowledge(store: &dyn KnowledgeStore, args: &KnowledgeArgs) -> Result<ToolExecutionResult, ToolError> {
    let entry = KnowledgeEntry::new(&args.tags, args.content.trim(), args.scope);
    let tags = entry.tags.clone();
    let id = store.append(entry).await.map_err(|e| ToolError::ExecutionFailed {
        tool_name: "save_knowledge".into(),
        reason: e.to_string(),
    })?;

    tracing::debug!(id = %id, store = store.name(), "Knowledge saved");
    let shown = if tags.is_empty() { "(untagged)".to_string() } else { tags.join(", ") };
    Ok(ToolExecutionResult::text(format!("Saved knowledge {shown}")).with_metadata(json!({ "id": id, "tags": tags })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweave_core::knowledge::KnowledgeScope;
    use codeweave_memory::InMemoryKnowledgeStore;

    #[tokio::test]
    async fn saves_normalized_tags() {
        let store = InMemoryKnowledgeStore::new();
        let args = KnowledgeArgs {
            tags: vec!["React".into(), "#Hooks".into()],
            content: "  Keep effects idempotent ".into(),
            scope: KnowledgeScope::Global,
        };
        let result = save_knowledge(&store, &args).await.unwrap();
        assert_eq!(result.output, "Saved knowledge #react, #hooks");

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "Keep effects idempotent");
        assert_eq!(all[0].scope, KnowledgeScope::Global);
        assert_eq!(result.metadata.unwrap()["id"], all[0].id.as_str());
    }
}

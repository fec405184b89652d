//! Reassembles streamed tool-call fragments into complete calls.

use std::collections::{BTreeMap, HashSet};

use codeweave_core::message::MessageToolCall;
use codeweave_core::provider::ToolCallFragment;

/// Minimum name length before a name is considered stable enough to announce.
const MIN_HINT_NAME_LEN: usize = 3;

#[derive(Debug, Default, Clone)]
struct Slot {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Accumulates fragments per index, in arrival order.
///
/// The result depends only on the concatenated content per index, never on
/// where chunk boundaries fell.
#[derive(Debug, Default)]
pub struct StreamReconstructor {
    slots: BTreeMap<usize, Slot>,
    hinted: HashSet<usize>,
}

impl StreamReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment. Returns a progress hint the first time the call's
    /// name looks complete: longer than three characters, and this fragment
    /// carried no further name text.
    pub fn push(&mut self, fragment: &ToolCallFragment) -> Option<String> {
        let slot = self.slots.entry(fragment.index).or_default();

        if let Some(id) = fragment.id.as_deref().filter(|id| !id.is_empty()) {
            slot.id = Some(id.to_string());
        }
        if let Some(args) = &fragment.arguments {
            slot.arguments.push_str(args);
        }

        let name_growing = fragment.name.as_deref().is_some_and(|n| !n.is_empty());
        if name_growing {
            slot.name.push_str(fragment.name.as_deref().unwrap_or_default());
            return None;
        }

        if slot.name.len() > MIN_HINT_NAME_LEN && self.hinted.insert(fragment.index) {
            return Some(format!("Preparing {}...", slot.name));
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Finished calls ordered by index. Indices whose name never arrived are
    /// dropped; missing ids are filled deterministically from turn and index.
    pub fn finish(self, turn: usize) -> Vec<MessageToolCall> {
        self.slots
            .into_iter()
            .filter_map(|(index, slot)| {
                let name = slot.name.trim().to_string();
                if name.is_empty() {
                    tracing::debug!(index, "Discarding tool call fragment without a name");
                    return None;
                }
                Some(MessageToolCall {
                    id: slot.id.unwrap_or_else(|| format!("call_{turn}_{index}")),
                    name,
                    arguments: slot.arguments,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ToolCallFragment {
        ToolCallFragment {
            index,
            id: id.map(String::from),
            name: name.map(String::from),
            arguments: args.map(String::from),
        }
    }

    /// One call split into pieces of `cut` characters.
    fn chunked(name: &str, args: &str, index: usize, cut: usize) -> Vec<ToolCallFragment> {
        let mut out = vec![frag(index, Some("id"), None, None)];
        let name_chars: Vec<char> = name.chars().collect();
        for piece in name_chars.chunks(cut.max(1)) {
            out.push(frag(index, None, Some(&piece.iter().collect::<String>()), None));
        }
        let arg_chars: Vec<char> = args.chars().collect();
        for piece in arg_chars.chunks(cut.max(1)) {
            out.push(frag(index, None, None, Some(&piece.iter().collect::<String>())));
        }
        out
    }

    #[test]
    fn reassembles_interleaved_calls_by_index() {
        let mut r = StreamReconstructor::new();
        for f in [
            frag(1, Some("b"), Some("list_"), None),
            frag(0, Some("a"), Some("read_"), Some("{\"pa")),
            frag(1, None, Some("files"), Some("{}")),
            frag(0, None, Some("file"), Some("th\": \"x\"}")),
        ] {
            r.push(&f);
        }
        let calls = r.finish(0);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[0].arguments, "{\"path\": \"x\"}");
        assert_eq!(calls[1].name, "list_files");
    }

    #[test]
    fn result_independent_of_chunk_boundaries() {
        let name = "update_file";
        let args = r#"{"path": "src/app.ts", "content": "export {}\n"}"#;
        let mut results = Vec::new();
        for cut in [1, 2, 3, 7, 100] {
            let mut r = StreamReconstructor::new();
            for f in chunked(name, args, 0, cut) {
                r.push(&f);
            }
            results.push(r.finish(0));
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(results[0][0].arguments, args);
    }

    #[test]
    fn nameless_index_is_discarded() {
        let mut r = StreamReconstructor::new();
        r.push(&frag(0, Some("a"), None, Some("{}")));
        r.push(&frag(1, Some("b"), Some("list_files"), Some("{}")));
        let calls = r.finish(0);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "list_files");
    }

    #[test]
    fn hint_emitted_once_after_name_stabilizes() {
        let mut r = StreamReconstructor::new();
        assert_eq!(r.push(&frag(0, Some("a"), Some("sea"), None)), None);
        // name too short to announce
        assert_eq!(r.push(&frag(0, None, None, Some("{"))), None);
        assert_eq!(r.push(&frag(0, None, Some("rch_files"), None)), None);
        assert_eq!(r.push(&frag(0, None, None, Some("\"query\""))), Some("Preparing search_files...".into()));
        assert_eq!(r.push(&frag(0, None, None, Some(": \"x\"}"))), None);
    }

    #[test]
    fn missing_id_filled_from_turn_and_index() {
        let mut r = StreamReconstructor::new();
        r.push(&frag(2, None, Some("list_files"), None));
        assert_eq!(r.finish(3)[0].id, "call_3_2");
    }
}

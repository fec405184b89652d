//! System prompt and conversation assembly.

use std::str::FromStr;

use codeweave_core::message::{ConversationTurn, Message};
use codeweave_core::task::{TaskItem, render_tasks};
use serde::{Deserialize, Serialize};

use crate::context::BuiltContext;
use crate::knowledge::{self, RankedEntry};

pub const DEFAULT_ROLE: &str = "You are Codeweave, a careful senior software engineer working inside \
the user's project. You change code only through the provided tools and explain what you did.";

/// What the user wants out of this request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Fix,
    Explain,
    Chat,
}

impl Mode {
    fn instructions(self) -> &'static str {
        match self {
            Mode::Fix => {
                "Mode: fix. Find the cause of the problem, then propose the smallest complete change that \
                 resolves it using the file tools. Summarize the change in a few sentences."
            }
            Mode::Explain => {
                "Mode: explain. Explain the relevant code clearly and concretely. Do not modify files unless \
                 the user explicitly asks for it."
            }
            Mode::Chat => "Mode: chat. Answer conversationally. Use tools only when the answer depends on project files.",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Fix => write!(f, "fix"),
            Mode::Explain => write!(f, "explain"),
            Mode::Chat => write!(f, "chat"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fix" => Ok(Mode::Fix),
            "explain" => Ok(Mode::Explain),
            "chat" => Ok(Mode::Chat),
            other => Err(format!("unknown mode '{other}' (expected fix, explain or chat)")),
        }
    }
}

/// Everything that goes into the system message.
#[derive(Debug, Clone, Copy)]
pub struct PromptParts<'a> {
    pub role: &'a str,
    pub mode: Mode,
    pub context: &'a BuiltContext,
    pub knowledge: &'a [RankedEntry],
    pub tasks: &'a [TaskItem],
    pub tools_enabled: bool,
    pub protected_patterns: &'a [String],
}

pub fn system_prompt(parts: &PromptParts<'_>) -> String {
    let role = if parts.role.trim().is_empty() { DEFAULT_ROLE } else { parts.role.trim() };
    let mut sections = vec![role.to_string(), parts.mode.instructions().to_string()];

    if parts.tools_enabled {
        sections.push(tool_rules(parts.protected_patterns));
    }
    if !parts.knowledge.is_empty() {
        sections.push(format!("## Project Knowledge\n{}", knowledge::render(parts.knowledge)));
    }
    if !parts.tasks.is_empty() {
        sections.push(format!("## Task List\n{}", render_tasks(parts.tasks)));
    }
    sections.push(parts.context.text.trim_end().to_string());

    sections.join("\n\n")
}

fn tool_rules(protected: &[String]) -> String {
    let mut rules = String::from(
        "## Tool Rules\n\
         - update_file and create_file replace the whole file: always send the complete new content, never a fragment or a diff.\n\
         - Use the exact file names listed in the project. Read a file before changing it if its content is not shown.\n\
         - Your changes are proposals; the user applies or rejects them.\n\
         - Independent read operations may be issued together in one turn.",
    );
    if !protected.is_empty() {
        rules.push_str("\n- Never create, modify or delete protected files. Protected name patterns: ");
        rules.push_str(&protected.join(", "));
    }
    rules
}

/// System message, the last `window` history entries, then the request.
pub fn conversation(system: String, history: &[ConversationTurn], window: usize, request: &str) -> Vec<Message> {
    let start = history.len().saturating_sub(window);
    let mut messages = Vec::with_capacity(history.len() - start + 2);
    messages.push(Message::system(system));
    messages.extend(history[start..].iter().map(ConversationTurn::to_message));
    messages.push(Message::user(request));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextMode;
    use codeweave_core::knowledge::{KnowledgeEntry, KnowledgeScope};
    use codeweave_core::message::Role;

    fn ctx() -> BuiltContext {
        BuiltContext {
            text: "## Project Files\n### a.rs\n```rust\nfn a() {}\n```\n".into(),
            mode: ContextMode::Full,
        }
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Explain".parse::<Mode>(), Ok(Mode::Explain));
        assert_eq!(" chat ".parse::<Mode>(), Ok(Mode::Chat));
        assert!("refactor".parse::<Mode>().is_err());
        assert_eq!(Mode::default().to_string(), "fix");
    }

    #[test]
    fn system_prompt_has_every_section() {
        let context = ctx();
        let knowledge = vec![RankedEntry {
            entry: KnowledgeEntry::new(["auth"], "Tokens expire after 1h", KnowledgeScope::Project),
            score: 10.0,
        }];
        let tasks = vec![TaskItem::new("t1", "Fix login")];
        let protected = vec![".env".to_string()];
        let prompt = system_prompt(&PromptParts {
            role: "",
            mode: Mode::Explain,
            context: &context,
            knowledge: &knowledge,
            tasks: &tasks,
            tools_enabled: true,
            protected_patterns: &protected,
        });
        assert!(prompt.starts_with(DEFAULT_ROLE));
        assert!(prompt.contains("Mode: explain"));
        assert!(prompt.contains("complete new content"));
        assert!(prompt.contains("Protected name patterns: .env"));
        assert!(prompt.contains("- [#auth] Tokens expire after 1h"));
        assert!(prompt.contains("- [ ] Fix login (t1)"));
        assert!(prompt.ends_with("```"));
    }

    #[test]
    fn tool_rules_omitted_when_tools_disabled() {
        let context = ctx();
        let prompt = system_prompt(&PromptParts {
            role: "You are a reviewer.",
            mode: Mode::Chat,
            context: &context,
            knowledge: &[],
            tasks: &[],
            tools_enabled: false,
            protected_patterns: &[],
        });
        assert!(prompt.starts_with("You are a reviewer."));
        assert!(!prompt.contains("## Tool Rules"));
        assert!(!prompt.contains("## Task List"));
    }

    #[test]
    fn conversation_keeps_last_window_entries() {
        let history: Vec<ConversationTurn> = (0..6)
            .map(|i| {
                if i % 2 == 0 { ConversationTurn::user(format!("q{i}")) } else { ConversationTurn::assistant(format!("a{i}")) }
            })
            .collect();
        let messages = conversation("sys".into(), &history, 4, "now");
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "q2");
        assert_eq!(messages[4].content, "a5");
        assert_eq!(messages[5].role, Role::User);
        assert_eq!(messages[5].content, "now");
    }

    #[test]
    fn short_history_kept_whole() {
        let history = vec![ConversationTurn::user("hi")];
        let messages = conversation("sys".into(), &history, 4, "again");
        assert_eq!(messages.len(), 3);
    }
}

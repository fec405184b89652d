//! Knowledge store implementations for Codeweave.

pub mod noop;
pub mod in_memory;
pub mod file_backend;

pub use noop::NoopKnowledgeStore;
pub use in_memory::InMemoryKnowledgeStore;
pub use file_backend::FileKnowledgeStore;

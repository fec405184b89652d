//! Security module for Codeweave.
//!
//! Provides the protected-path policy: a deny-list of sensitive name
//! fragments that no tool may create, update, or delete.

pub mod path;

pub use path::{DEFAULT_PROTECTED_PATTERNS, ProtectedPathError, ProtectedPathPolicy};

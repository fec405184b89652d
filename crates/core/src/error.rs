//! Error types for the Codeweave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum. Only provider failures and
//! rejected input escape an orchestration; tool and knowledge-store errors
//! are reported inside it.

use thiserror::Error;

/// The top-level error type for all Codeweave operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Caller input ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Entry not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("File not found: {file_name}")]
    FileNotFound { file_name: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Blocked: '{path}' is a protected path and cannot be modified")]
    Blocked { path: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Line range {start}-{end} is out of bounds for '{file_name}' ({total} lines)")]
    LineOutOfRange {
        file_name: String,
        start: usize,
        end: usize,
        total: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn blocked_error_names_the_path() {
        let err = ToolError::Blocked { path: ".env".into() };
        let text = err.to_string();
        assert!(text.contains("Blocked"));
        assert!(text.contains(".env"));
    }

    #[test]
    fn line_range_error_reports_total() {
        let err = ToolError::LineOutOfRange {
            file_name: "main.rs".into(),
            start: 40,
            end: 50,
            total: 12,
        };
        assert!(err.to_string().contains("12 lines"));
    }
}

//! Error classification for retry decisions and diagnostics.
//!
//! Typed errors map straight to a category; anything else falls back to
//! ordered pattern matching on the lower-cased message, first match wins.

use codeweave_core::diagnostic::{DetectedError, ErrorCategory, ErrorContext, Severity};
use codeweave_core::error::{ProviderError, ToolError};

/// Attempt cap shared by retry decisions.
pub const MAX_ATTEMPTS: u32 = 3;

/// Message patterns per category, in match order.
const PATTERNS: &[(ErrorCategory, &[&str])] = &[
    (ErrorCategory::Timeout, &["timeout", "timed out", "deadline exceeded"]),
    (
        ErrorCategory::Connectivity,
        &["network", "connection", "dns", "refused", "unreachable", "econnreset", "socket", "stream interrupted"],
    ),
    (
        ErrorCategory::RemoteService,
        &[
            "rate limit",
            "rate_limit",
            "429",
            "500",
            "502",
            "503",
            "504",
            "server error",
            "bad gateway",
            "overloaded",
            "unavailable",
        ],
    ),
    (
        ErrorCategory::Permission,
        &["permission", "forbidden", "unauthorized", "401", "403", "access denied", "blocked", "protected path"],
    ),
    (
        ErrorCategory::Validation,
        &["invalid", "missing field", "required", "validation", "must be", "out of bounds"],
    ),
    (ErrorCategory::Syntax, &["syntax", "parse", "unexpected token", "malformed", "unterminated"]),
    (ErrorCategory::ToolExecution, &["tool", "not found", "no such file"]),
    (ErrorCategory::Runtime, &["panic", "exception", "undefined", "null pointer", "overflow", "runtime"]),
];

/// Classify a free-form error message.
pub fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}

pub fn classify_provider_error(err: &ProviderError) -> ErrorCategory {
    match err {
        ProviderError::Timeout(_) => ErrorCategory::Timeout,
        ProviderError::Network(_) | ProviderError::StreamInterrupted(_) => ErrorCategory::Connectivity,
        ProviderError::RateLimited { .. } => ErrorCategory::RemoteService,
        ProviderError::AuthenticationFailed(_) => ErrorCategory::Permission,
        ProviderError::ModelNotFound(_) | ProviderError::NotConfigured(_) => ErrorCategory::Validation,
        ProviderError::ApiError { status_code, message } => match *status_code {
            408 => ErrorCategory::Timeout,
            429 | 500..=599 => ErrorCategory::RemoteService,
            401 | 403 => ErrorCategory::Permission,
            400..=499 => ErrorCategory::Validation,
            _ => classify_message(message),
        },
    }
}

pub fn classify_tool_error(err: &ToolError) -> ErrorCategory {
    match err {
        ToolError::NotFound(_) | ToolError::FileNotFound { .. } => ErrorCategory::ToolExecution,
        ToolError::Blocked { .. } => ErrorCategory::Permission,
        ToolError::InvalidArguments(_) | ToolError::LineOutOfRange { .. } => ErrorCategory::Validation,
        ToolError::ExecutionFailed { reason, .. } => match classify_message(reason) {
            ErrorCategory::Unknown => ErrorCategory::ToolExecution,
            other => other,
        },
    }
}

/// Baseline severity per category; "fatal" or "critical" in the message
/// escalates to [`Severity::Critical`].
pub fn severity(category: ErrorCategory, message: &str) -> Severity {
    let lower = message.to_lowercase();
    if lower.contains("fatal") || lower.contains("critical") {
        return Severity::Critical;
    }
    match category {
        ErrorCategory::Permission | ErrorCategory::Runtime | ErrorCategory::RemoteService => Severity::High,
        ErrorCategory::Validation => Severity::Low,
        ErrorCategory::Connectivity
        | ErrorCategory::Timeout
        | ErrorCategory::Syntax
        | ErrorCategory::ToolExecution
        | ErrorCategory::Unknown => Severity::Medium,
    }
}

/// Whether a failed attempt (1-based) should be tried again.
pub fn is_retryable(category: ErrorCategory, severity: Severity, attempt: u32, max_attempts: u32) -> bool {
    matches!(
        category,
        ErrorCategory::Connectivity | ErrorCategory::Timeout | ErrorCategory::RemoteService
    ) && severity < Severity::Critical
        && attempt < max_attempts
}

pub fn detect_provider_error(err: &ProviderError, attempt: u32) -> DetectedError {
    let message = err.to_string();
    let category = classify_provider_error(err);
    DetectedError::new(
        category,
        severity(category, &message),
        message,
        ErrorContext { tool_name: None, attempt },
    )
}

pub fn detect_tool_error(err: &ToolError, tool_name: &str, attempt: u32) -> DetectedError {
    let message = err.to_string();
    let category = classify_tool_error(err);
    DetectedError::new(
        category,
        severity(category, &message),
        message,
        ErrorContext {
            tool_name: Some(tool_name.to_string()),
            attempt,
        },
    )
}

//! Classified failures recorded during an orchestration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Syntax,
    Runtime,
    ToolExecution,
    RemoteService,
    Connectivity,
    Validation,
    Timeout,
    Permission,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Runtime => "runtime",
            ErrorCategory::ToolExecution => "tool_execution",
            ErrorCategory::RemoteService => "remote_service",
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Ordered so that `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// 1-based attempt number
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedError {
    pub id: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub context: ErrorContext,
    pub detected_at: DateTime<Utc>,
    resolved: bool,
}

impl DetectedError {
    pub fn new(category: ErrorCategory, severity: Severity, message: impl Into<String>, context: ErrorContext) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category,
            severity,
            message: message.into(),
            context,
            detected_at: Utc::now(),
            resolved: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Mark as resolved, e.g. after a successful retry or auto-fix.
    pub fn resolve(&mut self) {
        self.resolved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn resolution_is_explicit() {
        let mut err = DetectedError::new(
            ErrorCategory::Timeout,
            Severity::Medium,
            "timed out",
            ErrorContext { tool_name: None, attempt: 1 },
        );
        assert!(!err.is_resolved());
        err.resolve();
        assert!(err.is_resolved());
    }
}

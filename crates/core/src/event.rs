//! Domain event system: decoupled observation of orchestration progress.
//!
//! The host constructs one bus and passes it into each orchestration call.
//! Subscribers (usage loggers, dashboards) react without the loop knowing them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::diagnostic::ErrorCategory;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A model turn finished, with the number of tool calls it issued
    TurnCompleted {
        turn: usize,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A model call failed and is being retried
    ModelCallRetried {
        attempt: u32,
        delay_ms: u64,
        category: ErrorCategory,
        timestamp: DateTime<Utc>,
    },

    /// Knowledge entries were included in the prompt
    KnowledgeSurfaced {
        entry_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A failure was classified
    ErrorDetected {
        category: ErrorCategory,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

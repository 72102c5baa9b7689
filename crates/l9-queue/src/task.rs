//! The queued task record.

use std::cmp::Ordering;

use l9_core::{TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QueueError, QueueResult};

/// Most urgent priority.
pub const MIN_PRIORITY: u8 = 1;
/// Least urgent priority.
pub const MAX_PRIORITY: u8 = 10;
/// Priority used when none is given.
pub const DEFAULT_PRIORITY: u8 = 5;
/// Status of a freshly enqueued task.
pub const DEFAULT_STATUS: &str = "pending_igor_approval";
/// Payload key the worker checks before executing anything.
pub const APPROVAL_FLAG: &str = "approved_by_igor";

/// Agent recorded when the payload does not name one.
const DEFAULT_AGENT: &str = "system";

/// Reject priorities outside `1..=10`.
///
/// # Errors
///
/// Returns [`QueueError::InvalidPriority`].
pub fn validate_priority(priority: u8) -> QueueResult<u8> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(priority)
    } else {
        Err(QueueError::InvalidPriority(priority))
    }
}

/// A unit of work waiting for the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTask {
    /// Unique task id.
    pub task_id: TaskId,
    /// Short human-readable name.
    pub name: String,
    /// Handler arguments, opaque to the queue.
    pub payload: Map<String, Value>,
    /// Executor that runs the task (`gmp`, `git`, ...).
    pub handler: String,
    /// Agent the task belongs to.
    pub agent_id: String,
    /// 1 (most urgent) to 10.
    pub priority: u8,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Enqueue time.
    pub created_at: Timestamp,
    /// Lifecycle label.
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    DEFAULT_STATUS.to_owned()
}

impl QueuedTask {
    /// Create a task with default priority and status.
    ///
    /// The agent is taken from `payload["agent_id"]` when it is a string.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        handler: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        let agent_id = payload
            .get("agent_id")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_AGENT)
            .to_owned();
        Self {
            task_id: TaskId::new(),
            name: name.into(),
            payload,
            handler: handler.into(),
            agent_id,
            priority: DEFAULT_PRIORITY,
            tags: Vec::new(),
            created_at: Timestamp::now(),
            status: default_status(),
        }
    }

    /// Set the priority. Checked when the task is enqueued.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the owning agent.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Whether the payload carries `approved_by_igor: true`.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.payload.get(APPROVAL_FLAG).and_then(Value::as_bool) == Some(true)
    }

    /// Order across backends: priority, then age.
    #[must_use]
    pub fn urgency_cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.created_at.cmp(&other.created_at))
    }
}

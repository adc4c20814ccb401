use serde::{Deserialize, Serialize};

use crate::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Incomplete,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    // Declared high to low so the derived `Ord` sorts "high before low" directly.
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// Pure UI view state. Never persisted (§6); a record loaded from storage
/// always gets the default (all-false) flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransientFlags {
    pub editing: bool,
    pub confirming_delete: bool,
    pub is_editing_inline: bool,
}

/// Fields every task variant carries, regardless of shape (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskHeader {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub flags: TransientFlags,
}

impl TaskHeader {
    pub fn new(id: String, description: String) -> Self {
        Self {
            id,
            description,
            status: TaskStatus::Incomplete,
            flags: TransientFlags::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledTask {
    pub header: TaskHeader,
    pub start: Instant,
    pub end: Instant,
    pub duration: i64,
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnscheduledTask {
    pub header: TaskHeader,
    pub priority: Priority,
    pub est_duration: Option<i64>,
    /// Tie-break order for drag-reorder; lower sorts first.
    pub rank: i64,
}

/// A task is a tagged variant with two shapes (§9): model via pattern match,
/// never via inheritance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Task {
    Scheduled(ScheduledTask),
    Unscheduled(UnscheduledTask),
}

impl Task {
    pub fn header(&self) -> &TaskHeader {
        match self {
            Task::Scheduled(t) => &t.header,
            Task::Unscheduled(t) => &t.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut TaskHeader {
        match self {
            Task::Scheduled(t) => &mut t.header,
            Task::Unscheduled(t) => &mut t.header,
        }
    }

    pub fn id(&self) -> &str {
        &self.header().id
    }

    pub fn status(&self) -> TaskStatus {
        self.header().status
    }

    pub fn is_completed(&self) -> bool {
        self.status() == TaskStatus::Completed
    }

    pub fn is_editing(&self) -> bool {
        self.header().flags.editing
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Task::Scheduled(t) if t.locked)
    }

    pub fn as_scheduled(&self) -> Option<&ScheduledTask> {
        match self {
            Task::Scheduled(t) => Some(t),
            Task::Unscheduled(_) => None,
        }
    }

    pub fn as_scheduled_mut(&mut self) -> Option<&mut ScheduledTask> {
        match self {
            Task::Scheduled(t) => Some(t),
            Task::Unscheduled(_) => None,
        }
    }

    pub fn as_unscheduled(&self) -> Option<&UnscheduledTask> {
        match self {
            Task::Unscheduled(t) => Some(t),
            Task::Scheduled(_) => None,
        }
    }

    /// Shiftable per the glossary: scheduled, incomplete, not editing, not locked.
    pub fn is_shiftable(&self) -> bool {
        match self {
            Task::Scheduled(t) => {
                t.header.status == TaskStatus::Incomplete && !t.header.flags.editing && !t.locked
            }
            Task::Unscheduled(_) => false,
        }
    }
}

/// Raw input for `add`/`update`, prior to validation and materialization (§4.2, §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInput {
    pub description: String,
    pub task_type: Option<String>,
    pub status: Option<TaskStatus>,
    pub locked: Option<bool>,
    // Scheduled fields.
    pub start_time: Option<String>,
    pub duration: Option<i64>,
    // Unscheduled fields.
    pub priority: Option<String>,
    pub est_duration: Option<i64>,
}

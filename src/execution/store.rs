//! In-memory execution state, keyed by task id

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::progress::{ExecutionStatus, ProgressMessage};

/// Store shared between connection tasks and views
pub type SharedStore = Arc<Mutex<ExecutionStore>>;

/// Coarse task status shown next to the step list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Idle,
    Running,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Everything received for one task
#[derive(Debug, Clone, Serialize)]
pub struct TaskExecution {
    pub task_id: String,
    pub status: TaskStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Vec<ProgressMessage>,
}

impl TaskExecution {
    fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Idle,
            start_time: Utc::now(),
            end_time: None,
            messages: Vec::new(),
        }
    }

    fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        if status.is_terminal() && self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }
}

/// Task id → execution record.
///
/// Records are never evicted and message lists are unbounded; a store lives
/// as long as the view that owns it.
#[derive(Debug, Default)]
pub struct ExecutionStore {
    executions: HashMap<String, TaskExecution>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Create the record if missing. A second call keeps existing messages.
    pub fn initialize_execution(&mut self, task_id: &str) -> &TaskExecution {
        self.executions
            .entry(task_id.to_string())
            .or_insert_with(|| TaskExecution::new(task_id))
    }

    /// Append in arrival order; unknown ids are initialized first
    pub fn add_message(&mut self, task_id: &str, message: ProgressMessage) {
        let execution = self
            .executions
            .entry(task_id.to_string())
            .or_insert_with(|| TaskExecution::new(task_id));

        if !execution.status.is_terminal() {
            match message.execution_status {
                ExecutionStatus::Error | ExecutionStatus::Failed => {
                    execution.set_status(TaskStatus::Error)
                }
                // `completed`/`end` finish a step, not the task; task
                // completion comes from `mark_status` after reconciling
                _ => execution.set_status(TaskStatus::Running),
            }
        }

        execution.messages.push(message);
    }

    pub fn select_execution_by_task_id(&self, task_id: &str) -> Option<&TaskExecution> {
        self.executions.get(task_id)
    }

    pub fn select_execution_messages(&self, task_id: &str) -> &[ProgressMessage] {
        self.executions
            .get(task_id)
            .map(|e| e.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Status decided outside the message stream (reconciled completion,
    /// connection exhaustion). Returns false for unknown ids.
    pub fn mark_status(&mut self, task_id: &str, status: TaskStatus) -> bool {
        match self.executions.get_mut(task_id) {
            Some(execution) => {
                execution.set_status(status);
                true
            }
            None => false,
        }
    }

    /// Move a record from the client's temporary id to the server's id.
    ///
    /// If the server id already has a record, the temporary record's
    /// messages are appended to it.
    pub fn rekey(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.executions.contains_key(from);
        }
        let Some(mut moved) = self.executions.remove(from) else {
            return false;
        };

        match self.executions.get_mut(to) {
            Some(existing) => {
                existing.messages.append(&mut moved.messages);
                if moved.status.is_terminal() && !existing.status.is_terminal() {
                    existing.set_status(moved.status);
                }
            }
            None => {
                moved.task_id = to.to_string();
                self.executions.insert(to.to_string(), moved);
            }
        }
        true
    }

    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.executions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(node_type: &str) -> ProgressMessage {
        ProgressMessage::new(node_type, ExecutionStatus::Running)
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut store = ExecutionStore::new();
        store.initialize_execution("t1");
        store.add_message("t1", running("CompletenessQC"));
        store.initialize_execution("t1");

        assert_eq!(store.select_execution_messages("t1").len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_message_keeps_order_and_duplicates() {
        let mut store = ExecutionStore::new();
        store.initialize_execution("t1");
        store.add_message("t1", running("A"));
        store.add_message("t1", running("B"));
        store.add_message("t1", running("B"));

        let types: Vec<_> = store
            .select_execution_messages("t1")
            .iter()
            .filter_map(|m| m.node_type())
            .collect();
        assert_eq!(types, vec!["A", "B", "B"]);
    }

    #[test]
    fn test_status_derivation() {
        let mut store = ExecutionStore::new();
        assert_eq!(store.initialize_execution("t1").status, TaskStatus::Idle);

        store.add_message("t1", running("A"));
        assert_eq!(store.select_execution_by_task_id("t1").unwrap().status, TaskStatus::Running);

        store.add_message("t1", ProgressMessage::new("A", ExecutionStatus::Completed));
        assert_eq!(store.select_execution_by_task_id("t1").unwrap().status, TaskStatus::Running);

        store.add_message("t1", ProgressMessage::new("A", ExecutionStatus::End));
        let exec = store.select_execution_by_task_id("t1").unwrap();
        assert_eq!(exec.status, TaskStatus::Running);
        assert!(exec.end_time.is_none());

        store.mark_status("t1", TaskStatus::Completed);
        assert!(store.select_execution_by_task_id("t1").unwrap().end_time.is_some());

        // terminal status sticks
        store.add_message("t1", running("B"));
        assert_eq!(store.select_execution_by_task_id("t1").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn test_end_on_early_step_does_not_finish_task() {
        use crate::progress::reconcile;
        use crate::qc::QcCategory;

        let mut store = ExecutionStore::new();
        store.add_message("t3", ProgressMessage::new("CompletenessQC", ExecutionStatus::End));
        store.add_message("t3", running("TimelinessQC"));

        let exec = store.select_execution_by_task_id("t3").unwrap();
        let reconciled = reconcile(QcCategory::Flow.steps(), &exec.messages);
        assert!(!reconciled.is_complete);
        assert_eq!(exec.status, TaskStatus::Running);
        assert!(exec.end_time.is_none());
    }

    #[test]
    fn test_failure_marks_error() {
        let mut store = ExecutionStore::new();
        store.add_message("t2", ProgressMessage::new("A", ExecutionStatus::Failed));
        assert_eq!(store.select_execution_by_task_id("t2").unwrap().status, TaskStatus::Error);
    }

    #[test]
    fn test_unknown_task_reads_are_empty() {
        let store = ExecutionStore::new();
        assert!(store.select_execution_by_task_id("nope").is_none());
        assert!(store.select_execution_messages("nope").is_empty());
    }

    #[test]
    fn test_rekey_moves_record() {
        let mut store = ExecutionStore::new();
        store.initialize_execution("tmp");
        store.add_message("tmp", running("A"));

        assert!(store.rekey("tmp", "42"));
        assert!(store.select_execution_by_task_id("tmp").is_none());
        let exec = store.select_execution_by_task_id("42").unwrap();
        assert_eq!(exec.task_id, "42");
        assert_eq!(exec.messages.len(), 1);

        assert!(!store.rekey("missing", "43"));
    }

    #[test]
    fn test_rekey_merges_into_existing() {
        let mut store = ExecutionStore::new();
        store.add_message("42", running("A"));
        store.add_message("tmp", running("B"));

        assert!(store.rekey("tmp", "42"));
        assert_eq!(store.select_execution_messages("42").len(), 2);
        assert_eq!(store.task_ids(), vec!["42".to_string()]);
    }

    #[test]
    fn test_mark_status() {
        let mut store = ExecutionStore::new();
        assert!(!store.mark_status("x", TaskStatus::Error));
        store.initialize_execution("x");
        assert!(store.mark_status("x", TaskStatus::Error));
        assert!(store.select_execution_by_task_id("x").unwrap().end_time.is_some());
    }
}

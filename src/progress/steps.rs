//! Step descriptors and per-step view state

use serde::{Deserialize, Serialize};

/// Static definition of one phase of a QC pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepDescriptor {
    pub step_index: usize,
    pub title: &'static str,
    /// Matched against `node.nodeType` of incoming messages
    pub node_type: &'static str,
    pub description: &'static str,
}

impl StepDescriptor {
    pub const fn new(
        step_index: usize,
        title: &'static str,
        node_type: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            step_index,
            title,
            node_type,
            description,
        }
    }
}

/// Status of a step as rendered by the views.
///
/// The numeric codes are the ones the console uses for its step widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl StepState {
    pub fn code(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Failed => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Default for StepState {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Derived view state for one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStatus {
    pub descriptor: StepDescriptor,
    pub state: StepState,
    pub progress: f64,
    pub completed_quantity: u64,
    pub total_quantity: u64,
    pub table: Option<String>,
    pub table_name: Option<String>,
    /// Last `node.enabled` reported for this step, if any
    pub enabled: Option<bool>,
}

impl StepStatus {
    pub fn new(descriptor: StepDescriptor) -> Self {
        Self {
            descriptor,
            state: StepState::NotStarted,
            progress: 0.0,
            completed_quantity: 0,
            total_quantity: 0,
            table: None,
            table_name: None,
            enabled: None,
        }
    }

    /// A step is disabled only when the backend said so explicitly
    pub fn is_disabled(&self) -> bool {
        self.enabled == Some(false)
    }
}

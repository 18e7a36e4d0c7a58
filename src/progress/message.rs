//! Progress messages streamed by the backend while a QC task runs.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Error returned when an event payload is not a progress message.
#[derive(Error, Debug)]
#[error("Malformed progress message: {0}")]
pub struct MessageParseError(#[from] serde_json::Error);

/// Execution status reported for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    End,
    Error,
    Failed,
    /// Anything the backend sends that we do not know about
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    /// `completed` or `end`
    pub fn is_success(self) -> bool {
        matches!(self, Self::Completed | Self::End)
    }

    /// `error` or `failed`
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Failed)
    }

    pub fn is_terminal(self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::End => write!(f, "end"),
            Self::Error => write!(f, "error"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The pipeline node a message refers to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNode {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub node_step: Option<i64>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub is_auto: Option<bool>,
}

/// One progress event. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    #[serde(default, deserialize_with = "string_or_number")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub node: ProgressNode,
    pub execution_status: ExecutionStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub completed_quantity: Option<u64>,
    #[serde(default)]
    pub table_quantity: Option<u64>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub status: Option<i32>,
}

impl ProgressMessage {
    /// Parse a raw event payload
    pub fn from_json(raw: &str) -> Result<Self, MessageParseError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Message for one node with everything else unset
    pub fn new(node_type: impl Into<String>, execution_status: ExecutionStatus) -> Self {
        Self {
            task_id: None,
            node: ProgressNode {
                node_type: Some(node_type.into()),
                ..Default::default()
            },
            execution_status,
            progress: None,
            completed_quantity: None,
            table_quantity: None,
            table: None,
            table_name: None,
            status: None,
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_quantities(mut self, completed: u64, total: u64) -> Self {
        self.completed_quantity = Some(completed);
        self.table_quantity = Some(total);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.node.enabled = Some(enabled);
        self
    }

    pub fn node_type(&self) -> Option<&str> {
        self.node.node_type.as_deref()
    }
}

/// Ids arrive as either JSON strings or numbers depending on the endpoint
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

//! Events sent from connection tasks to whatever renders them.

use crate::progress::Reconciliation;

/// View-facing notifications for one tracked task
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// The stream is open.
    Opened,

    /// The backend assigned its own id to the task.
    TaskIdAssigned { temporary: String, assigned: String },

    /// Fresh step-level view state after a message was recorded.
    Progress(Reconciliation),

    /// The final step finished.
    Completed,

    /// A step reported `error`/`failed`.
    StepFailed { step: String },

    /// A transport error; the client will retry.
    Reconnecting(String),

    /// Terminal error shown to the user; needs a manual re-launch.
    Failed(String),

    /// The server closed the stream.
    Closed,
}

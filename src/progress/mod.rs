//! Progress model: streamed messages, static step lists and the reconciler
//! that turns one into view state for the other.

pub mod message;
pub mod reconciler;
pub mod steps;

pub use message::{ExecutionStatus, MessageParseError, ProgressMessage, ProgressNode};
pub use reconciler::{
    complete_earlier_steps, reconcile, reconcile_with, EarlierStepPolicy, Reconciliation,
};
pub use steps::{StepDescriptor, StepState, StepStatus};

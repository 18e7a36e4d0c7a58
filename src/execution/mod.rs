//! Execution state for launched QC tasks

pub mod events;
pub mod store;
pub mod tracker;

pub use events::TrackerEvent;
pub use store::{ExecutionStore, SharedStore, TaskExecution, TaskStatus};
pub use tracker::ExecutionTracker;

//! Glue between one SSE connection, the shared store and the reconciler.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::events::TrackerEvent;
use super::store::{SharedStore, TaskStatus};
use crate::progress::{reconcile_with, EarlierStepPolicy, ProgressMessage, StepDescriptor};
use crate::sse::{SseError, SseEvent, SseHandler};

/// Follows one task: every event is parsed, recorded and reconciled, and
/// the result is published to the view.
pub struct ExecutionTracker {
    store: SharedStore,
    steps: &'static [StepDescriptor],
    policy: EarlierStepPolicy,
    task_id: Mutex<String>,
    events: mpsc::Sender<TrackerEvent>,
}

impl ExecutionTracker {
    /// Registers `temporary_id` in the store right away so the view has a
    /// record to show before the first message arrives.
    pub async fn new(
        store: SharedStore,
        steps: &'static [StepDescriptor],
        policy: EarlierStepPolicy,
        temporary_id: impl Into<String>,
        events: mpsc::Sender<TrackerEvent>,
    ) -> Self {
        let temporary_id = temporary_id.into();
        store.lock().await.initialize_execution(&temporary_id);
        Self {
            store,
            steps,
            policy,
            task_id: Mutex::new(temporary_id),
            events,
        }
    }

    /// Current key of the tracked task in the store
    pub async fn task_id(&self) -> String {
        self.task_id.lock().await.clone()
    }

    async fn publish(&self, event: TrackerEvent) {
        let _ = self.events.send(event).await;
    }

    /// Record one parsed message and publish the derived state
    pub async fn record(&self, message: ProgressMessage) {
        let mut task_id = self.task_id.lock().await;

        if let Some(assigned) = message.task_id.clone() {
            if assigned != *task_id {
                let temporary = std::mem::replace(&mut *task_id, assigned.clone());
                self.store.lock().await.rekey(&temporary, &assigned);
                tracing::debug!("Task {} is now {}", temporary, assigned);
                self.publish(TrackerEvent::TaskIdAssigned {
                    temporary,
                    assigned,
                })
                .await;
            }
        }

        let failed_step = message
            .execution_status
            .is_failure()
            .then(|| message.node.node_name.clone().or_else(|| message.node.node_type.clone()))
            .flatten();

        let reconciliation = {
            let mut store = self.store.lock().await;
            store.add_message(&task_id, message);
            let reconciliation =
                reconcile_with(self.steps, store.select_execution_messages(&task_id), self.policy);
            if reconciliation.is_complete {
                store.mark_status(&task_id, TaskStatus::Completed);
            }
            reconciliation
        };
        drop(task_id);

        let complete = reconciliation.is_complete;
        self.publish(TrackerEvent::Progress(reconciliation)).await;

        if let Some(step) = failed_step {
            self.publish(TrackerEvent::StepFailed { step }).await;
        }
        if complete {
            self.publish(TrackerEvent::Completed).await;
        }
    }
}

#[async_trait]
impl SseHandler for ExecutionTracker {
    async fn on_open(&self) {
        self.publish(TrackerEvent::Opened).await;
    }

    async fn on_message(&self, event: SseEvent) {
        let data = event.data.trim();
        if data.is_empty() {
            return;
        }
        match ProgressMessage::from_json(data) {
            Ok(message) => self.record(message).await,
            Err(e) => {
                // dropped, the connection stays open
                tracing::warn!("Ignoring {} event: {}", event.event_type(), e);
            }
        }
    }

    async fn on_error(&self, error: &SseError) {
        self.publish(TrackerEvent::Reconnecting(error.to_string())).await;
    }

    async fn on_close(&self) {
        self.publish(TrackerEvent::Closed).await;
    }

    async fn on_max_reconnect_attempts_reached(&self) {
        let task_id = self.task_id().await;
        self.store
            .lock()
            .await
            .mark_status(&task_id, TaskStatus::Error);
        self.publish(TrackerEvent::Failed(
            "Connection lost; relaunch the task to retry".to_string(),
        ))
        .await;
    }
}

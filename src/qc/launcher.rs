//! Launch a QC task and follow it

use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{QcCategory, QcLaunchRequest, QcResultRow, ValidationError};
use crate::api::{ApiClient, ApiError, Page, PageQuery};
use crate::config::AppConfig;
use crate::execution::{ExecutionTracker, SharedStore, TrackerEvent};
use crate::progress::EarlierStepPolicy;
use crate::sse::{create_sse, ReconnectPolicy, SseConfig, SseHandle, SseTransport};

const RESULT_LIST_ENDPOINT: &str = "/data/qc/result/list";

/// A task whose stream is connected
pub struct LaunchedTask {
    pub category: QcCategory,
    pub temporary_id: String,
    pub tracker: Arc<ExecutionTracker>,
    pub handle: SseHandle,
    pub events: mpsc::Receiver<TrackerEvent>,
}

impl LaunchedTask {
    /// Store key of the task, the server id once one was assigned
    pub async fn task_id(&self) -> String {
        self.tracker.task_id().await
    }
}

pub struct QcLauncher {
    api: ApiClient,
    transport: Arc<dyn SseTransport>,
    store: SharedStore,
    reconnect: ReconnectPolicy,
    step_policy: EarlierStepPolicy,
}

impl QcLauncher {
    pub fn new(
        api: ApiClient,
        transport: Arc<dyn SseTransport>,
        store: SharedStore,
        config: &AppConfig,
    ) -> Self {
        Self {
            api,
            transport,
            store,
            reconnect: config.sse.reconnect_policy(),
            step_policy: config.earlier_step_policy,
        }
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Validate the form, register the task and open its progress stream
    pub async fn launch(
        &self,
        category: QcCategory,
        request: &QcLaunchRequest,
    ) -> Result<LaunchedTask, ValidationError> {
        request.validate()?;

        let temporary_id = format!("tmp-{}", Uuid::new_v4());
        let (tx, rx) = mpsc::channel(256);
        let tracker = Arc::new(
            ExecutionTracker::new(
                self.store.clone(),
                category.steps(),
                self.step_policy,
                temporary_id.clone(),
                tx,
            )
            .await,
        );

        let sse_request = self
            .api
            .sse_request(category.launch_endpoint(), request.to_body());
        let config = SseConfig::new(sse_request).with_policy(self.reconnect);
        let handle = create_sse(config, tracker.clone(), self.transport.clone());

        tracing::info!("Launching {} QC as {}", category, temporary_id);
        handle.connect();

        Ok(LaunchedTask {
            category,
            temporary_id,
            tracker,
            handle,
            events: rx,
        })
    }

    /// Paginated result listing for a finished task
    pub async fn results(
        &self,
        category: QcCategory,
        task_id: &str,
        page: PageQuery,
    ) -> Result<Page<QcResultRow>, ApiError> {
        let filters = vec![
            ("taskId".to_string(), task_id.to_string()),
            ("qcType".to_string(), category.result_type().to_string()),
        ];
        self.api.list_page(RESULT_LIST_ENDPOINT, page, &filters).await
    }
}

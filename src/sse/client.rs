//! SSE client with bounded reconnection

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::parser::{EventParser, SseEvent};
use super::state::{Action, ConnectionMachine, ConnectionState, Input, ReconnectPolicy};
use super::transport::SseTransport;
use super::{SseError, SseRequest};

/// Callbacks invoked by the connection task.
///
/// Only `on_message` is mandatory.
#[async_trait]
pub trait SseHandler: Send + Sync {
    async fn on_open(&self) {}

    async fn on_message(&self, event: SseEvent);

    /// Called once per transport error, before any retry
    async fn on_error(&self, _error: &SseError) {}

    /// The server ended the stream
    async fn on_close(&self) {}

    async fn on_max_reconnect_attempts_reached(&self) {}
}

#[derive(Debug, Clone)]
pub struct SseConfig {
    pub request: SseRequest,
    pub policy: ReconnectPolicy,
}

impl SseConfig {
    pub fn new(request: SseRequest) -> Self {
        Self {
            request,
            policy: ReconnectPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }
}

struct Inner {
    config: SseConfig,
    handler: Arc<dyn SseHandler>,
    transport: Arc<dyn SseTransport>,
    machine: Mutex<ConnectionMachine>,
    cancel: CancellationToken,
}

impl Inner {
    fn step(&self, input: Input) -> Action {
        let mut machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
        let action = machine.handle(input);
        tracing::trace!("sse {:?} -> {:?} ({:?})", input, machine.state(), action);
        action
    }

    async fn run(self: Arc<Self>, mut action: Action) {
        loop {
            action = match action {
                Action::OpenRequest => self.attempt().await,
                Action::Wait(delay) => {
                    tracing::info!(
                        "Reconnecting to {} in {:?}",
                        self.config.request.url,
                        delay
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    self.step(Input::BackoffElapsed)
                }
                Action::NotifyMaxAttemptsReached => {
                    tracing::warn!(
                        "Giving up on {} after {} attempts",
                        self.config.request.url,
                        self.config.policy.max_attempts
                    );
                    self.handler.on_max_reconnect_attempts_reached().await;
                    self.cancel.cancel();
                    return;
                }
                Action::NotifyClose => {
                    tracing::info!("Stream {} closed by server", self.config.request.url);
                    self.handler.on_close().await;
                    self.cancel.cancel();
                    return;
                }
                Action::NotifyOpen | Action::Stop | Action::None => return,
            };
        }
    }

    /// One connection attempt; returns what to do next
    async fn attempt(&self) -> Action {
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return Action::Stop,
            result = self.transport.open(&self.config.request) => result,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return self.fail(e).await,
        };

        if self.step(Input::Opened) != Action::NotifyOpen {
            return Action::Stop;
        }
        tracing::info!("Connected to {}", self.config.request.url);
        self.handler.on_open().await;

        let mut parser = EventParser::new();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return Action::Stop,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for event in parser.feed(&chunk) {
                        self.handler.on_message(event).await;
                    }
                }
                Some(Err(e)) => return self.fail(e).await,
                None => {
                    if let Some(event) = parser.finish() {
                        self.handler.on_message(event).await;
                    }
                    return self.step(Input::StreamEnded);
                }
            }
        }
    }

    async fn fail(&self, error: SseError) -> Action {
        tracing::warn!("SSE transport error on {}: {}", self.config.request.url, error);
        self.handler.on_error(&error).await;
        self.step(Input::TransportError)
    }
}

/// Handle returned by [`create_sse`].
///
/// Dropping the handle disconnects.
pub struct SseHandle {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Build a client; nothing happens until [`SseHandle::connect`]
pub fn create_sse(
    config: SseConfig,
    handler: Arc<dyn SseHandler>,
    transport: Arc<dyn SseTransport>,
) -> SseHandle {
    let machine = ConnectionMachine::new(config.policy);
    SseHandle {
        inner: Arc::new(Inner {
            config,
            handler,
            transport,
            machine: Mutex::new(machine),
            cancel: CancellationToken::new(),
        }),
        task: Mutex::new(None),
    }
}

impl SseHandle {
    /// Start the connection task. Must be called inside a tokio runtime.
    /// Calling it again while connected, or after disconnecting, does nothing.
    pub fn connect(&self) {
        let action = self.inner.step(Input::Connect);
        if action != Action::OpenRequest {
            return;
        }
        let task = tokio::spawn(self.inner.clone().run(action));
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    /// Tear the connection down. Idempotent, and fine before `connect`.
    pub fn disconnect(&self) {
        self.inner.step(Input::Disconnect);
        self.inner.cancel.cancel();
    }

    pub fn state(&self) -> ConnectionState {
        self.inner
            .machine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state()
    }

    /// True once the connection was torn down, for whatever reason
    pub fn is_disconnected(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Wait for the connection task to finish
    pub async fn closed(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("SSE task aborted: {}", e);
            }
        }
    }
}

impl Drop for SseHandle {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

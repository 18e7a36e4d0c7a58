//! Byte-stream transports for the SSE client

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;

use super::{SseError, SseRequest};

/// Raw body chunks as they come off the wire
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, SseError>>;

/// Opens one streaming response. Reconnection is the client's job.
#[async_trait]
pub trait SseTransport: Send + Sync {
    async fn open(&self, request: &SseRequest) -> Result<ByteStream, SseError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, SseError> {
        // No overall timeout: the body stays open as long as the task runs
        let client = reqwest::Client::builder()
            .user_agent(format!("qcwatch/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SseError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SseTransport for HttpTransport {
    async fn open(&self, request: &SseRequest) -> Result<ByteStream, SseError> {
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &request.url)
            .header(reqwest::header::ACCEPT, "text/event-stream");

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SseError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SseError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| SseError::Stream(e.to_string()))
            })
            .boxed();
        Ok(stream)
    }
}

//! Server-Sent Events client used to follow QC task progress.
//!
//! - [`parser`] splits a byte stream into events
//! - [`state`] is the reconnect state machine
//! - [`transport`] opens the HTTP stream
//! - [`client`] ties them together behind [`create_sse`]

pub mod client;
pub mod parser;
pub mod state;
pub mod transport;

pub use client::{create_sse, SseConfig, SseHandle, SseHandler};
pub use parser::{EventParser, SseEvent};
pub use state::{CloseReason, ConnectionMachine, ConnectionState, ReconnectPolicy};
pub use transport::{ByteStream, HttpTransport, SseTransport};

use crate::api::HttpMethod;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SseError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Server answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Stream interrupted: {0}")]
    Stream(String),
}

/// What to open
#[derive(Debug, Clone, PartialEq)]
pub struct SseRequest {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

impl SseRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            body: Some(body),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

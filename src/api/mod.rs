//! REST access to the governance backend
//!
//! Every endpoint answers with the same envelope, `{ code, msg, data }`,
//! where `code == 200` is success. Anything else is a business error the
//! views show as a notification.

mod client;

pub use client::ApiClient;

use serde::{Deserialize, Serialize};

/// Code the backend uses for success
pub const SUCCESS_CODE: i64 = 200;

/// HTTP method
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Turn a non-200 code into [`ApiError::Business`]
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(ApiError::Business {
                code: self.code,
                msg: self.msg.unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}

/// `pageNum`/`pageSize` pagination, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page_num: u32,
    pub page_size: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: 10,
        }
    }
}

impl PageQuery {
    pub fn new(page_num: u32, page_size: u32) -> Self {
        Self {
            page_num: page_num.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page_num.saturating_sub(1) as usize) * self.page_size as usize
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        vec![
            ("pageNum".to_string(), self.page_num.to_string()),
            ("pageSize".to_string(), self.page_size.to_string()),
        ]
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
    #[serde(default)]
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            total: 0,
        }
    }

    /// Slice an in-memory collection the way the backend pages results
    pub fn from_slice(items: &[T], query: PageQuery) -> Self
    where
        T: Clone,
    {
        let rows = items
            .iter()
            .skip(query.offset())
            .take(query.page_size as usize)
            .cloned()
            .collect();
        Self {
            rows,
            total: items.len() as u64,
        }
    }
}

/// REST client errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Client error: {0}")]
    ClientError(String),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Business error {code}: {msg}")]
    Business { code: i64, msg: String },
    #[error("Response carried no data")]
    MissingData,
}

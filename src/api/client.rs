//! HTTP client for the backend's JSON API

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{ApiError, ApiResponse, HttpMethod, Page, PageQuery};
use crate::sse::SseRequest;

/// API client bound to one backend base URL
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    default_headers: HashMap<String, String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("qcwatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ApiError::ClientError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_headers: HashMap::new(),
        })
    }

    pub fn with_bearer_token(mut self, token_type: &str, token: &str) -> Self {
        self.default_headers.insert(
            "Authorization".to_string(),
            format!("{} {}", token_type, token),
        );
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.default_headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Build a streaming request carrying the same auth headers
    pub fn sse_request(&self, endpoint: &str, body: serde_json::Value) -> SseRequest {
        let mut request = SseRequest::post(self.url(endpoint), body);
        for (key, value) in &self.default_headers {
            request = request.with_header(key, value);
        }
        request
    }

    /// Send a request and unwrap the `{ code, msg, data }` envelope
    pub async fn send<B, T>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        query: &[(String, String)],
        body: Option<&B>,
    ) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(endpoint);
        let mut request = self.http.request(method.as_reqwest(), &url);

        for (key, value) in &self.default_headers {
            request = request.header(key, value);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!("{:?} {}", method, url);
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::RequestError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::RequestError(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: ApiResponse<T> =
            serde_json::from_str(&text).map_err(|e| ApiError::ParseError(e.to_string()))?;
        envelope.into_result()
    }

    /// GET a paginated listing, extra filters go next to `pageNum`/`pageSize`
    pub async fn list_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        page: PageQuery,
        filters: &[(String, String)],
    ) -> Result<Page<T>, ApiError> {
        let mut query = page.to_query();
        query.extend(filters.iter().cloned());
        let page = self
            .send::<(), Page<T>>(HttpMethod::Get, endpoint, &query, None)
            .await?;
        Ok(page.unwrap_or_else(Page::empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:8080/api/", 10).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api");
        assert_eq!(
            client.url("/data/qc/completenessQc"),
            "http://localhost:8080/api/data/qc/completenessQc"
        );
    }

    #[test]
    fn test_sse_request_carries_auth() {
        let client = ApiClient::new("http://localhost:8080", 10)
            .unwrap()
            .with_bearer_token("Bearer", "abc")
            .with_header("X-Tenant", "hospital-1");
        let req = client.sse_request("data/qc/accuracyQc", serde_json::json!({"x": 1}));

        assert_eq!(req.url, "http://localhost:8080/data/qc/accuracyQc");
        assert_eq!(req.method, HttpMethod::Post);
        assert!(req
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer abc"));
        assert!(req
            .headers
            .iter()
            .any(|(k, v)| k == "X-Tenant" && v == "hospital-1"));
    }
}

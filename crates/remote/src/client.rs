//! HTTP client for the remote resource-management time-tracking API.

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;

use crate::error::{RemoteError, Result};
use crate::types::{ApiErrorBody, PageEnvelope, RemoteProject, RemoteTimeEntry, TimeEntryPayload};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Bearer-style token header. The remote service uses its own header rather
/// than the standard `Authorization: Bearer` scheme.
const AUTH_HEADER: &str = "auth";

/// Page size for list endpoints.
const PROJECT_PAGE_SIZE: usize = 1000;
/// Hard cap on fetched pages to bound worst-case latency.
const PROJECT_PAGE_CAP: usize = 10;

/// Client for the remote resource-management API.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    /// Create a new remote API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the remote API (e.g., "https://api.example.com")
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create headers for an API request.
    fn headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(token)
            .map_err(|_| RemoteError::auth("Invalid access token format"))?;
        headers.insert(AUTH_HEADER, auth_value);

        Ok(headers)
    }

    fn log_response(status: StatusCode, body: &str) {
        if status.is_success() {
            debug!("Remote API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("Remote API error response ({}): {}", status, preview);
    }

    /// Classify a non-success response into the typed taxonomy.
    fn classify_error(status: StatusCode, body: &str, retry_after: Option<u64>) -> RemoteError {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.assembled_message());

        match status.as_u16() {
            401 | 403 => {
                RemoteError::auth(message.unwrap_or_else(|| "Authentication failed".to_string()))
            }
            429 => RemoteError::rate_limit(
                message.unwrap_or_else(|| "Too many requests".to_string()),
                retry_after,
            ),
            404 => {
                RemoteError::not_found(message.unwrap_or_else(|| "Resource not found".to_string()))
            }
            400 | 422 => RemoteError::validation(
                message.unwrap_or_else(|| format!("Request rejected: {}", body)),
            ),
            _ => RemoteError::network(format!(
                "HTTP {}: {}",
                status.as_u16(),
                message.unwrap_or_else(|| body.to_string())
            )),
        }
    }

    fn retry_after_hint(headers: &HeaderMap) -> Option<u64> {
        headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    }

    /// Parse a JSON response body. A 2xx body that fails to parse is a
    /// network-kind error, never silently swallowed.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let retry_after = Self::retry_after_hint(response.headers());
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::classify_error(status, &body, retry_after));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize remote response. Body: {}, Error: {}",
                body,
                e
            );
            RemoteError::network(format!("Failed to parse response: {}", e))
        })
    }

    /// Parse a response whose success carries no body (DELETE, 204/205/304).
    async fn parse_empty_response(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let retry_after = Self::retry_after_hint(response.headers());
        let body = response.text().await?;
        Self::log_response(status, &body);
        Err(Self::classify_error(status, &body, retry_after))
    }

    /// Create a time entry.
    ///
    /// POST /api/v1/time_entries
    pub async fn create_time_entry(
        &self,
        token: &str,
        payload: &TimeEntryPayload,
    ) -> Result<RemoteTimeEntry> {
        let url = format!("{}/api/v1/time_entries", self.base_url);
        debug!(
            "Creating remote time entry: assignable_id={} date={}",
            payload.assignable_id, payload.date
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(payload)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Update an existing time entry.
    ///
    /// PUT /api/v1/time_entries/{entryId}
    pub async fn update_time_entry(
        &self,
        token: &str,
        entry_id: i64,
        payload: &TimeEntryPayload,
    ) -> Result<RemoteTimeEntry> {
        let url = format!("{}/api/v1/time_entries/{}", self.base_url, entry_id);
        debug!("Updating remote time entry {}", entry_id);

        let response = self
            .client
            .put(&url)
            .headers(self.headers(token)?)
            .json(payload)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Delete a time entry.
    ///
    /// DELETE /api/v1/time_entries/{entryId}
    pub async fn delete_time_entry(&self, token: &str, entry_id: i64) -> Result<()> {
        let url = format!("{}/api/v1/time_entries/{}", self.base_url, entry_id);

        let response = self
            .client
            .delete(&url)
            .headers(self.headers(token)?)
            .send()
            .await?;

        Self::parse_empty_response(response).await
    }

    /// List all non-archived remote projects.
    ///
    /// GET /api/v1/projects?per_page={n}&page={p}
    ///
    /// Pages until a short page is returned, filtering archived records.
    /// Fetching stops at a hard page cap; hitting the cap logs a warning
    /// rather than failing.
    pub async fn list_projects(&self, token: &str) -> Result<Vec<RemoteProject>> {
        let url = format!("{}/api/v1/projects", self.base_url);
        let mut projects = Vec::new();
        let mut page = 1usize;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(self.headers(token)?)
                .query(&[
                    ("per_page", PROJECT_PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?;

            let envelope: PageEnvelope<RemoteProject> = Self::parse_response(response).await?;
            let fetched = envelope.data.len();
            projects.extend(envelope.data.into_iter().filter(|p| !p.archived));

            if fetched < PROJECT_PAGE_SIZE {
                break;
            }
            if page >= PROJECT_PAGE_CAP {
                warn!(
                    "Remote project listing hit the {}-page cap; result may be truncated",
                    PROJECT_PAGE_CAP
                );
                break;
            }
            page += 1;
        }

        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteErrorKind;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        request_line: String,
        auth_header: Option<String>,
    }

    #[derive(Debug, Clone)]
    struct MockResponse {
        status: u16,
        body: String,
        retry_after: Option<u64>,
    }

    fn respond(status: u16, body: &str) -> MockResponse {
        MockResponse {
            status,
            body: body.to_string(),
            retry_after: None,
        }
    }

    fn header_end_offset(buffer: &[u8]) -> Option<usize> {
        buffer.windows(4).position(|window| window == b"\r\n\r\n")
    }

    async fn read_http_request(
        stream: &mut tokio::net::TcpStream,
    ) -> Option<(String, HashMap<String, String>)> {
        let mut buffer = Vec::new();
        loop {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if header_end_offset(&buffer).is_some() {
                break;
            }
        }

        let header_end = header_end_offset(&buffer)?;
        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let mut lines = head.lines();
        let request_line = lines.next()?.to_string();

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body_read = buffer.len().saturating_sub(header_end + 4);
        while body_read < content_length {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                break;
            }
            body_read = body_read.saturating_add(read);
        }

        Some((request_line, headers))
    }

    fn status_text(status: u16) -> &'static str {
        match status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            404 => "Not Found",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            _ => "Error",
        }
    }

    async fn write_http_response(
        stream: &mut tokio::net::TcpStream,
        response: &MockResponse,
    ) -> std::io::Result<()> {
        let retry_after_line = response
            .retry_after
            .map(|secs| format!("Retry-After: {}\r\n", secs))
            .unwrap_or_default();
        let raw = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            response.status,
            status_text(response.status),
            retry_after_line,
            response.body.len(),
            response.body
        );
        stream.write_all(raw.as_bytes()).await?;
        stream.flush().await
    }

    async fn start_mock_server(
        outcomes: Vec<MockResponse>,
    ) -> (
        String,
        Arc<TokioMutex<Vec<CapturedRequest>>>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let captured = Arc::new(TokioMutex::new(Vec::<CapturedRequest>::new()));
        let scripted = Arc::new(TokioMutex::new(VecDeque::from(outcomes)));
        let captured_clone = Arc::clone(&captured);
        let scripted_clone = Arc::clone(&scripted);

        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(value) => value,
                    Err(_) => break,
                };
                let captured_inner = Arc::clone(&captured_clone);
                let scripted_inner = Arc::clone(&scripted_clone);
                tokio::spawn(async move {
                    let Some((request_line, headers)) = read_http_request(&mut stream).await
                    else {
                        return;
                    };
                    captured_inner.lock().await.push(CapturedRequest {
                        request_line,
                        auth_header: headers.get("auth").cloned(),
                    });

                    let outcome = scripted_inner
                        .lock()
                        .await
                        .pop_front()
                        .unwrap_or_else(|| respond(500, r#"{"message":"unexpected request"}"#));
                    let _ = write_http_response(&mut stream, &outcome).await;
                });
            }
        });

        (format!("http://{}", addr), captured, handle)
    }

    fn entry_payload() -> TimeEntryPayload {
        TimeEntryPayload {
            assignable_id: 9_000_000_123,
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"),
            hours: dec!(3.00),
            notes: Some("weekly planning".to_string()),
            task: crate::types::TASK_BILLABLE.to_string(),
        }
    }

    fn entry_body(id: i64) -> String {
        format!(
            r#"{{"id":{},"assignable_id":9000000123,"date":"2026-03-02","hours":3.0,"notes":"weekly planning","task":"Billable"}}"#,
            id
        )
    }

    fn project_page(ids: std::ops::Range<i64>, archived_every: Option<i64>) -> String {
        let items = ids
            .map(|id| {
                let archived = archived_every.map(|n| id % n == 0).unwrap_or(false);
                format!(
                    r#"{{"id":{},"name":"Project {}","archived":{}}}"#,
                    id, id, archived
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        format!(r#"{{"data":[{}]}}"#, items)
    }

    #[tokio::test]
    async fn create_sends_custom_auth_header_and_parses_entry() {
        let (base_url, captured, server) =
            start_mock_server(vec![respond(201, &entry_body(9_876_543_210))]).await;

        let client = RemoteClient::new(&base_url);
        let entry = client
            .create_time_entry("secret-token", &entry_payload())
            .await
            .expect("create success");

        assert_eq!(entry.id, 9_876_543_210);
        assert_eq!(entry.hours, dec!(3.0));
        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].request_line.starts_with("POST /api/v1/time_entries"));
        assert_eq!(requests[0].auth_header.as_deref(), Some("secret-token"));

        server.abort();
    }

    #[tokio::test]
    async fn unauthorized_classifies_as_auth_error() {
        let (base_url, _captured, server) =
            start_mock_server(vec![respond(401, r#"{"message":"token expired"}"#)]).await;

        let client = RemoteClient::new(&base_url);
        let err = client
            .create_time_entry("token", &entry_payload())
            .await
            .expect_err("auth failure");

        assert_eq!(err.kind(), RemoteErrorKind::Auth);
        assert!(err.to_string().contains("token expired"));
        server.abort();
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after_hint() {
        let (base_url, _captured, server) = start_mock_server(vec![MockResponse {
            status: 429,
            body: r#"{"message":"slow down"}"#.to_string(),
            retry_after: Some(12),
        }])
        .await;

        let client = RemoteClient::new(&base_url);
        let err = client
            .update_time_entry("token", 42, &entry_payload())
            .await
            .expect_err("rate limited");

        assert_eq!(err.kind(), RemoteErrorKind::RateLimit);
        assert_eq!(err.retry_after_secs(), Some(12));
        server.abort();
    }

    #[tokio::test]
    async fn validation_error_assembles_field_details() {
        let (base_url, _captured, server) = start_mock_server(vec![respond(
            422,
            r#"{"message":"Validation failed","errors":{"hours":["must be greater than 0"]}}"#,
        )])
        .await;

        let client = RemoteClient::new(&base_url);
        let err = client
            .create_time_entry("token", &entry_payload())
            .await
            .expect_err("validation failure");

        assert_eq!(err.kind(), RemoteErrorKind::Validation);
        assert!(err.to_string().contains("hours: must be greater than 0"));
        server.abort();
    }

    #[tokio::test]
    async fn missing_entry_classifies_as_not_found() {
        let (base_url, _captured, server) =
            start_mock_server(vec![respond(404, r#"{"message":"no such entry"}"#)]).await;

        let client = RemoteClient::new(&base_url);
        let err = client
            .update_time_entry("token", 31337, &entry_payload())
            .await
            .expect_err("not found");

        assert_eq!(err.kind(), RemoteErrorKind::NotFound);
        server.abort();
    }

    #[tokio::test]
    async fn server_error_classifies_as_network() {
        let (base_url, _captured, server) =
            start_mock_server(vec![respond(500, r#"{"message":"database on fire"}"#)]).await;

        let client = RemoteClient::new(&base_url);
        let err = client
            .create_time_entry("token", &entry_payload())
            .await
            .expect_err("server failure");

        assert_eq!(err.kind(), RemoteErrorKind::Network);
        server.abort();
    }

    #[tokio::test]
    async fn unparseable_success_body_is_a_network_error() {
        let (base_url, _captured, server) =
            start_mock_server(vec![respond(200, "<html>gateway</html>")]).await;

        let client = RemoteClient::new(&base_url);
        let err = client
            .create_time_entry("token", &entry_payload())
            .await
            .expect_err("parse failure");

        assert_eq!(err.kind(), RemoteErrorKind::Network);
        assert!(err.to_string().contains("Failed to parse response"));
        server.abort();
    }

    #[tokio::test]
    async fn delete_accepts_no_content_response() {
        let (base_url, captured, server) = start_mock_server(vec![respond(204, "")]).await;

        let client = RemoteClient::new(&base_url);
        client
            .delete_time_entry("token", 777)
            .await
            .expect("delete success");

        let requests = captured.lock().await.clone();
        assert!(requests[0]
            .request_line
            .starts_with("DELETE /api/v1/time_entries/777"));
        server.abort();
    }

    #[tokio::test]
    async fn project_listing_pages_until_short_page_and_filters_archived() {
        // First page is exactly full (forcing a second fetch), second is short.
        let full_page = project_page(1..(PROJECT_PAGE_SIZE as i64 + 1), Some(100));
        let short_page = project_page(2001..2004, None);
        let (base_url, captured, server) =
            start_mock_server(vec![respond(200, &full_page), respond(200, &short_page)]).await;

        let client = RemoteClient::new(&base_url);
        let projects = client.list_projects("token").await.expect("list projects");

        // 1000 on the full page minus 10 archived (ids divisible by 100), plus 3.
        assert_eq!(projects.len(), PROJECT_PAGE_SIZE - 10 + 3);
        assert!(projects.iter().all(|p| !p.archived));

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].request_line.contains("page=1"));
        assert!(requests[1].request_line.contains("page=2"));
        server.abort();
    }
}

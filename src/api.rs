use reqwest::{Method, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::task::TaskSource;

/// A friend as indexed by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Friend {
    pub name: String,
    #[serde(default)]
    pub last_screenshot: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub last_screenshot_time: Option<f64>,
}

/// The backend reports the last sync either as an ISO timestamp or as unix seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LastSync {
    Unix(f64),
    Iso(String),
}

/// Response of `GET /api/friends_list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FriendsList {
    #[serde(default)]
    pub friends: Vec<Friend>,
    #[serde(default)]
    pub last_sync: Option<LastSync>,
    #[serde(default)]
    pub selected_friend: Option<String>,
}

/// A stored screenshot. Sent over the wire as `["name.png", 1700000000.0]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(String, f64)")]
pub struct Screenshot {
    pub filename: String,
    pub modified: f64,
}

impl From<(String, f64)> for Screenshot {
    fn from((filename, modified): (String, f64)) -> Self {
        Self { filename, modified }
    }
}

#[derive(Debug, Deserialize)]
struct ScreenshotsResponse {
    #[serde(default)]
    screenshots: Vec<Screenshot>,
}

/// Returned by every endpoint that starts a background task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStarted {
    pub task_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Response of `GET /api/task_wait`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskReport {
    pub status: TaskState,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteAllResponse {
    #[serde(default)]
    deleted_files: Vec<String>,
}

/// Outcome of a screenshot-all task, counted per friend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenshotAllSummary {
    pub successful: usize,
    pub failed: Vec<(String, String)>,
}

impl ScreenshotAllSummary {
    /// Build from the task result: an object of `name -> {"error": null | "..."}`.
    pub fn from_result(result: &Value) -> Self {
        let mut summary = Self::default();
        if let Some(entries) = result.as_object() {
            for (name, entry) in entries {
                match entry.get("error").and_then(Value::as_str) {
                    Some(err) => summary.failed.push((name.clone(), err.to_string())),
                    None => summary.successful += 1,
                }
            }
        }
        summary
    }

    pub fn status_text(&self) -> String {
        let mut text = format!("Screenshots completed! {} successful", self.successful);
        if !self.failed.is_empty() {
            text.push_str(&format!(", {} failed", self.failed.len()));
        }
        text
    }
}

/// Errors surfaced by backend calls. `Display` is the text shown in status lines.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    TaskFailed(String),

    #[error("Task timed out")]
    TimedOut,

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ApiError::TimedOut => true,
            ApiError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Pick the message for a non-2xx response: the body's `error` field, else the status.
pub fn error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// JSON client for the companion backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        // No overall request timeout: task_wait may hold the request open while the
        // task runs, and the poller bounds each poll by its remaining budget.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("findmy-companion/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Absolute URL of a screenshot image, for handing to an external viewer.
    pub fn screenshot_url(&self, filename: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint("api/get_screenshot")?;
        url.query_pairs_mut().append_pair("filename", filename);
        Ok(url)
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, request: reqwest::RequestBuilder, path: &str) -> Result<Vec<u8>, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = error_message(status.as_u16(), &body);
            warn!(path, status = status.as_u16(), %message, "backend request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        debug!(path, status = status.as_u16(), bytes = body.len(), "backend request ok");
        Ok(body.to_vec())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let mut request = self.client.request(method, self.endpoint(path)?);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let bytes = self.send(request, path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn friends_list(&self) -> Result<FriendsList, ApiError> {
        self.call(Method::GET, "api/friends_list", &[], None).await
    }

    pub async fn sync(&self) -> Result<TaskStarted, ApiError> {
        self.call(Method::POST, "api/sync", &[], None).await
    }

    pub async fn select_friend(&self, name: &str) -> Result<TaskStarted, ApiError> {
        let body = serde_json::json!({ "name": name });
        self.call(Method::POST, "api/select_friend", &[], Some(body))
            .await
    }

    pub async fn take_screenshot(&self) -> Result<TaskStarted, ApiError> {
        self.call(Method::POST, "api/take_screenshot", &[], None)
            .await
    }

    pub async fn screenshot_all(&self) -> Result<TaskStarted, ApiError> {
        self.call(Method::POST, "api/screenshot_all", &[], None)
            .await
    }

    pub async fn list_screenshots(&self) -> Result<Vec<Screenshot>, ApiError> {
        let resp: ScreenshotsResponse = self
            .call(Method::GET, "api/list_screenshots", &[], None)
            .await?;
        Ok(resp.screenshots)
    }

    /// Start downloading a screenshot; the caller reads or streams the body.
    pub async fn get_screenshot(&self, filename: &str) -> Result<reqwest::Response, ApiError> {
        let path = "api/get_screenshot";
        let response = self
            .client
            .get(self.endpoint(path)?)
            .query(&[("filename", filename)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            let message = error_message(status.as_u16(), &body);
            warn!(path, filename, status = status.as_u16(), %message, "screenshot download failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    pub async fn delete_screenshot(&self, filename: &str) -> Result<String, ApiError> {
        let body = serde_json::json!({ "filename": filename });
        let resp: MessageResponse = self
            .call(Method::POST, "api/delete_screenshot", &[], Some(body))
            .await?;
        Ok(resp
            .message
            .unwrap_or_else(|| format!("Deleted screenshot '{filename}'")))
    }

    pub async fn delete_all_screenshots(&self) -> Result<Vec<String>, ApiError> {
        let resp: DeleteAllResponse = self
            .call(Method::POST, "api/delete_all_screenshots", &[], None)
            .await?;
        Ok(resp.deleted_files)
    }

    pub async fn task_wait(&self, task_id: &str) -> Result<TaskReport, ApiError> {
        self.call(Method::GET, "api/task_wait", &[("task_id", task_id)], None)
            .await
    }
}

impl TaskSource for ApiClient {
    async fn task_status(&self, task_id: &str) -> Result<TaskReport, ApiError> {
        self.task_wait(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friends_list_parses_backend_shape() {
        let body = r#"{
            "last_sync": "2025-03-01T10:00:00.123456",
            "selected_friend": "mike smith",
            "friends": [
                {"name": "mike smith", "last_screenshot": "mike smith_20250301_100000.png", "last_screenshot_time": 1740823200.5},
                {"name": "anna", "last_screenshot": null, "last_screenshot_time": null}
            ]
        }"#;
        let list: FriendsList = serde_json::from_str(body).unwrap();
        assert_eq!(list.friends.len(), 2);
        assert_eq!(list.selected_friend.as_deref(), Some("mike smith"));
        assert_eq!(
            list.last_sync,
            Some(LastSync::Iso("2025-03-01T10:00:00.123456".to_string()))
        );
        assert_eq!(list.friends[0].last_screenshot_time, Some(1740823200.5));
        assert_eq!(list.friends[1].last_screenshot, None);
    }

    #[test]
    fn test_friends_list_accepts_unix_last_sync_and_missing_fields() {
        let list: FriendsList = serde_json::from_str(r#"{"last_sync": 1700000000}"#).unwrap();
        assert_eq!(list.last_sync, Some(LastSync::Unix(1700000000.0)));
        assert!(list.friends.is_empty());
        assert!(list.selected_friend.is_none());
    }

    #[test]
    fn test_screenshots_parse_from_pairs() {
        let body = r#"{"screenshots": [["a.png", 100], ["b.png", 200.25]]}"#;
        let resp: ScreenshotsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            resp.screenshots,
            vec![
                Screenshot { filename: "a.png".into(), modified: 100.0 },
                Screenshot { filename: "b.png".into(), modified: 200.25 },
            ]
        );
    }

    #[test]
    fn test_task_report_states() {
        let pending: TaskReport =
            serde_json::from_str(r#"{"status": "in_progress", "message": "Task is in progress"}"#)
                .unwrap();
        assert_eq!(pending.status, TaskState::InProgress);

        let done: TaskReport =
            serde_json::from_str(r#"{"status": "completed", "result": "shot.png"}"#).unwrap();
        assert_eq!(done.status, TaskState::Completed);
        assert_eq!(done.result, Some(Value::from("shot.png")));

        let odd: TaskReport = serde_json::from_str(r#"{"status": "queued"}"#).unwrap();
        assert_eq!(odd.status, TaskState::Unknown);
    }

    #[test]
    fn test_error_message_prefers_body_error() {
        assert_eq!(
            error_message(404, br#"{"error": "Friend 'bob' not found"}"#),
            "Friend 'bob' not found"
        );
        assert_eq!(error_message(500, b"<html>oops</html>"), "HTTP 500");
        assert_eq!(error_message(502, br#"{"message": "bad gateway"}"#), "HTTP 502");
    }

    #[test]
    fn test_screenshot_all_summary() {
        let result = serde_json::json!({
            "anna": {"error": null, "filename": "anna.png"},
            "bob": {"error": "Friend not found"},
            "carl": {"error": null}
        });
        let summary = ScreenshotAllSummary::from_result(&result);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, vec![("bob".to_string(), "Friend not found".to_string())]);
        assert_eq!(summary.status_text(), "Screenshots completed! 2 successful, 1 failed");

        let empty = ScreenshotAllSummary::from_result(&Value::Null);
        assert_eq!(empty.status_text(), "Screenshots completed! 0 successful");
    }

    /// Answer one request with a canned response; yields the raw request.
    async fn serve_once(status: &str, body: &str) -> (ApiClient, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = ApiClient::new(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request_complete(&request) {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (client, server)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= end + 4 + length
    }

    #[tokio::test]
    async fn test_error_body_becomes_status_error() {
        let (client, server) =
            serve_once("404 Not Found", r#"{"error": "Friend 'bob' not found"}"#).await;
        let err = client.select_friend("bob").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 404, .. }));
        assert_eq!(err.to_string(), "Friend 'bob' not found");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/select_friend HTTP/1.1"));
        assert!(request.ends_with(r#"{"name":"bob"}"#));
    }

    #[tokio::test]
    async fn test_error_without_body_falls_back_to_http_status() {
        let (client, server) = serve_once("500 Internal Server Error", "").await;
        let err = client.friends_list().await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
        assert_eq!(err.to_string(), "HTTP 500");
        assert!(server.await.unwrap().starts_with("GET /api/friends_list HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_non_json_success_is_malformed() {
        let (client, _server) = serve_once("200 OK", "<html>maintenance</html>").await;
        let err = client.list_screenshots().await.unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_task_wait_sends_task_id_and_parses_report() {
        let (client, server) =
            serve_once("200 OK", r#"{"status": "completed", "result": "anna_1.png"}"#).await;
        let report = client.task_status("abc-123").await.unwrap();
        assert_eq!(report.status, TaskState::Completed);
        assert_eq!(report.result, Some(Value::from("anna_1.png")));
        assert!(server.await.unwrap().starts_with("GET /api/task_wait?task_id=abc-123 HTTP/1.1"));
    }

    #[test]
    fn test_client_urls() {
        let client = ApiClient::new("http://127.0.0.1:5050").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5050/");
        let url = client.screenshot_url("mike smith_1.png").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:5050/api/get_screenshot?filename=mike+smith_1.png"
        );

        let prefixed = ApiClient::new("http://host/findmy").unwrap();
        assert_eq!(
            prefixed.endpoint("api/sync").unwrap().as_str(),
            "http://host/findmy/api/sync"
        );

        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}

//! HTTP capability used for CookieCloud, cover art and WebDAV.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Verbs the pipeline sends. WebDAV adds `PROPFIND` and `MKCOL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Delete,
    Propfind,
    Mkcol,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Propfind => "PROPFIND",
            HttpMethod::Mkcol => "MKCOL",
        }
    }

    /// Safe to resend after a transport error or a 5xx.
    ///
    /// `MKCOL` counts: a second attempt at most answers 405.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, HttpMethod::Put)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Per-request override of the client timeout
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// `Authorization: Basic base64(user:pass)`. Empty credentials add nothing.
    pub fn basic_auth(self, user: &str, pass: &str) -> Self {
        if user.is_empty() && pass.is_empty() {
            return self;
        }
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
        self.header("Authorization", format!("Basic {}", token))
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Fully buffered response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| BridgeError::OperationFailed(format!("invalid JSON body: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Backoff schedule for [`HttpClient::execute_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, doubling from `base_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Statuses worth another attempt.
    pub fn should_retry_status(status: u16) -> bool {
        status == 429 || status >= 500
    }

    /// Attempts allowed for `method`; non-idempotent verbs get one.
    pub fn attempts_for(&self, method: HttpMethod) -> u32 {
        if method.is_idempotent() {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Outbound HTTP, shared by every component through `Arc<dyn HttpClient>`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send once. Non-2xx statuses are returned, not turned into errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Send with retries on transport errors and [`RetryPolicy::should_retry_status`].
    /// Non-idempotent verbs are sent once whatever the policy says.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let attempts = policy.attempts_for(request.method);
        let mut attempt = 1;
        loop {
            let outcome = self.execute(request.clone()).await;
            let retry = match &outcome {
                Ok(response) => RetryPolicy::should_retry_status(response.status),
                Err(BridgeError::Cancelled) => false,
                Err(_) => true,
            };
            if !retry || attempt >= attempts {
                return outcome;
            }
            tokio::time::sleep(policy.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    /// Send `request` with the file at `path` streamed as the body. Never retried,
    /// and only bounded by the request's own timeout.
    async fn upload_file(&self, request: HttpRequest, path: &Path) -> Result<HttpResponse>;

    /// Stream a 2xx response body. Other statuses are errors. Only the
    /// request's own timeout applies.
    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_basic_auth_header() {
        let request = HttpRequest::new(HttpMethod::Propfind, "https://dav.example.com/")
            .basic_auth("user", "pass")
            .timeout(Duration::from_secs(30));

        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Basic dXNlcjpwYXNz")
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_anonymous_has_no_auth_header() {
        let request = HttpRequest::new(HttpMethod::Get, "https://dav.example.com/").basic_auth("", "");
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_multistatus_is_success() {
        let response = HttpResponse {
            status: 207,
            headers: HashMap::new(),
            body: Bytes::from_static(b"<multistatus/>"),
        };
        assert!(response.is_success());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }

    #[test]
    fn test_retry_classification() {
        assert!(RetryPolicy::should_retry_status(503));
        assert!(RetryPolicy::should_retry_status(429));
        assert!(!RetryPolicy::should_retry_status(404));
        assert!(!HttpMethod::Put.is_idempotent());
        assert!(HttpMethod::Mkcol.is_idempotent());
        assert_eq!(RetryPolicy::default().attempts_for(HttpMethod::Put), 1);
        assert_eq!(RetryPolicy::default().attempts_for(HttpMethod::Get), 3);
    }

    /// Answers with the queued statuses in order, then 200.
    struct ScriptedClient {
        statuses: std::sync::Mutex<Vec<u16>>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(mut statuses: Vec<u16>) -> Self {
            statuses.reverse();
            Self {
                statuses: std::sync::Mutex::new(statuses),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.statuses.lock().unwrap().pop().unwrap_or(200);
            Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::new(),
            })
        }

        async fn upload_file(&self, _request: HttpRequest, _path: &Path) -> Result<HttpResponse> {
            unreachable!()
        }

        async fn download_stream(
            &self,
            _request: HttpRequest,
        ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            unreachable!()
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_default_retry_honours_policy() {
        let client = ScriptedClient::new(vec![503, 429]);
        let request = HttpRequest::new(HttpMethod::Get, "https://cookie.example.com/get/u");

        let response = client.execute_with_retry(request, fast_policy(3)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_default_retry_gives_up_after_max_attempts() {
        let client = ScriptedClient::new(vec![502, 502, 502, 502]);
        let request = HttpRequest::new(HttpMethod::Propfind, "https://dav.example.com/");

        let response = client.execute_with_retry(request, fast_policy(2)).await.unwrap();
        assert_eq!(response.status, 502);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_default_retry_sends_put_once() {
        let client = ScriptedClient::new(vec![503]);
        let request = HttpRequest::new(HttpMethod::Put, "https://dav.example.com/a.flac");

        let response = client.execute_with_retry(request, fast_policy(5)).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }
}

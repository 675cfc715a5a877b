//! CookieCloud HTTP client.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{CookieError, Result, SyncStage};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Bundle {
    #[serde(default)]
    encrypted: String,
}

/// Fetches encrypted bundles from `<base_url>/get/<uuid>`.
#[derive(Clone)]
pub struct CookieCloudClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    uuid: String,
}

impl CookieCloudClient {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: &str, uuid: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            uuid: uuid.to_string(),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn endpoint(&self) -> String {
        format!("{}/get/{}", self.base_url, urlencoding::encode(&self.uuid))
    }

    /// Fetch the base64 ciphertext.
    ///
    /// # Errors
    ///
    /// - `SyncFailed { stage: Fetch }` on transport failure
    /// - [`CookieError::CookieCloudUnavailable`] on a non-200 status, an
    ///   unreadable body or an empty `encrypted` field
    pub async fn fetch_encrypted(&self) -> Result<String> {
        let url = self.endpoint();
        debug!(url = %url, "Fetching cookie bundle");

        let request = HttpRequest::new(HttpMethod::Get, &url)
            .header("Accept", "application/json")
            .timeout(FETCH_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await
            .map_err(|e| CookieError::sync(SyncStage::Fetch, e))?;

        if response.status != 200 {
            return Err(CookieError::CookieCloudUnavailable(format!(
                "HTTP {}",
                response.status
            )));
        }

        let bundle: Bundle = response
            .json()
            .map_err(|e| CookieError::CookieCloudUnavailable(format!("unreadable body: {}", e)))?;

        if bundle.encrypted.trim().is_empty() {
            return Err(CookieError::CookieCloudUnavailable(
                "empty ciphertext".to_string(),
            ));
        }

        Ok(bundle.encrypted)
    }
}

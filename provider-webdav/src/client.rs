//! WebDAV client implementing [`RemoteStorage`].

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{RemoteFile, RemoteStorage};
use bytes::Bytes;
use core_runtime::config::WebDavConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Result, WebDavError};
use crate::path;
use crate::propfind::{self, PROPFIND_BODY};

/// How long a successful connection check is trusted.
pub const CONNECTION_CHECK_TTL: Duration = Duration::from_secs(60);

/// Timeout for metadata requests. Transfers are unbounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// WebDAV share rooted at a configured base directory.
///
/// # Example
///
/// ```ignore
/// use provider_webdav::WebDavClient;
/// use bridge_traits::storage::RemoteStorage;
///
/// let client = WebDavClient::from_config(&config.webdav, http_client)?;
/// client.check_connection().await?;
/// let remote = client.upload_to(Path::new("/tmp/a.flac"), "/").await?;
/// ```
pub struct WebDavClient {
    http_client: Arc<dyn HttpClient>,
    /// `scheme://host[:port]`
    origin: String,
    /// Decoded path component of the server URL
    endpoint_path: String,
    base_dir: String,
    user: String,
    pass: String,
    last_check: Mutex<Option<Instant>>,
    check_ttl: Duration,
}

impl WebDavClient {
    /// Create a client for `server_url` whose paths are rooted at `base_dir`.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        server_url: &str,
        user: &str,
        pass: &str,
        base_dir: &str,
    ) -> Result<Self> {
        let url = Url::parse(server_url.trim())
            .map_err(|e| WebDavError::InvalidConfig(format!("webdav_url {:?}: {}", server_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(WebDavError::InvalidConfig(format!(
                "webdav_url must be an http(s) URL, got {:?}",
                server_url
            )));
        }

        let decoded = urlencoding::decode(url.path())
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| url.path().to_string());

        Ok(Self {
            http_client,
            origin: url.origin().ascii_serialization(),
            endpoint_path: path::normalize(&decoded),
            base_dir: path::normalize(base_dir),
            user: user.to_string(),
            pass: pass.to_string(),
            last_check: Mutex::new(None),
            check_ttl: CONNECTION_CHECK_TTL,
        })
    }

    pub fn from_config(config: &WebDavConfig, http_client: Arc<dyn HttpClient>) -> Result<Self> {
        Self::new(
            http_client,
            &config.webdav_url,
            &config.webdav_user,
            &config.webdav_pass,
            &config.webdav_dir,
        )
    }

    /// Override how long a successful check is cached.
    pub fn with_check_ttl(mut self, ttl: Duration) -> Self {
        self.check_ttl = ttl;
        self
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    /// `base_dir + '/' + relative`, normalized.
    pub fn resolve(&self, relative: &str) -> String {
        path::join(&self.base_dir, relative)
    }

    /// Wire URL for a resolved path.
    fn url_for(&self, resolved: &str, collection: bool) -> String {
        let full = path::join(&self.endpoint_path, resolved);
        let mut url = format!("{}{}", self.origin, path::encode(&full));
        if collection && !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url).basic_auth(&self.user, &self.pass)
    }

    fn propfind(&self, resolved: &str, depth: &str) -> HttpRequest {
        self.request(HttpMethod::Propfind, self.url_for(resolved, true))
            .header("Depth", depth)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(Bytes::from_static(PROPFIND_BODY.as_bytes()))
            .timeout(REQUEST_TIMEOUT)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.http_client
            .execute(request)
            .await
            .map_err(|e| WebDavError::Transport(e.to_string()))
    }

    fn expect(
        response: &HttpResponse,
        method: &'static str,
        resolved: &str,
        accepted: &[u16],
    ) -> Result<()> {
        if accepted.contains(&response.status) {
            Ok(())
        } else {
            Err(WebDavError::Status {
                method,
                path: resolved.to_string(),
                status: response.status,
            })
        }
    }

    /// Map an href from a multistatus body back to a base-relative path.
    fn relative_from_href(&self, href: &str) -> Option<String> {
        let raw_path = if href.starts_with("http://") || href.starts_with("https://") {
            Url::parse(href).ok()?.path().to_string()
        } else {
            href.to_string()
        };
        let decoded = urlencoding::decode(&raw_path).ok()?.into_owned();

        let under_endpoint = path::strip_base(&decoded, &self.endpoint_path)?;
        path::strip_base(&under_endpoint, &self.base_dir)
    }

    async fn ping(&self) -> Result<()> {
        let response = self.send(self.propfind(&self.base_dir, "0")).await?;
        Self::expect(&response, "PROPFIND", &self.base_dir, &[200, 207])
    }

    async fn make_dirs(&self, remote_dir: &str) -> Result<()> {
        let resolved = self.resolve(remote_dir);
        for prefix in path::prefixes(&resolved) {
            let request = self
                .request(HttpMethod::Mkcol, self.url_for(&prefix, true))
                .timeout(REQUEST_TIMEOUT);
            let response = self.send(request).await?;
            // 405: collection already exists
            Self::expect(&response, "MKCOL", &prefix, &[200, 201, 204, 405])?;
        }
        Ok(())
    }

    async fn put(&self, local: &Path, remote_path: &str) -> Result<String> {
        let resolved = self.resolve(remote_path);
        let request = self
            .request(HttpMethod::Put, self.url_for(&resolved, false))
            .header("Content-Type", "application/octet-stream");

        let response = self
            .http_client
            .upload_file(request, local)
            .await
            .map_err(|e| WebDavError::Transport(e.to_string()))?;
        Self::expect(&response, "PUT", &resolved, &[200, 201, 204])?;

        Ok(resolved)
    }

    async fn get(&self, remote_path: &str, local: &Path) -> Result<()> {
        let resolved = self.resolve(remote_path);
        let request = self.request(HttpMethod::Get, self.url_for(&resolved, false));
        let mut stream = self
            .http_client
            .download_stream(request)
            .await
            .map_err(|e| WebDavError::Transport(e.to_string()))?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(local).await?;
        let bytes = tokio::io::copy(&mut stream, &mut file).await?;
        file.flush().await?;

        debug!(path = %resolved, bytes, "Downloaded remote file");
        Ok(())
    }

    async fn remove(&self, remote_path: &str) -> Result<()> {
        let resolved = self.resolve(remote_path);
        let request = self
            .request(HttpMethod::Delete, self.url_for(&resolved, false))
            .timeout(REQUEST_TIMEOUT);
        let response = self.send(request).await?;
        if response.status == 404 {
            debug!(path = %resolved, "Remote file already absent");
            return Ok(());
        }
        Self::expect(&response, "DELETE", &resolved, &[200, 202, 204])
    }

    async fn list_dir(&self, remote_dir: &str) -> Result<Vec<RemoteFile>> {
        let resolved = self.resolve(remote_dir);
        let response = self.send(self.propfind(&resolved, "1")).await?;
        Self::expect(&response, "PROPFIND", &resolved, &[207])?;

        let body = String::from_utf8_lossy(&response.body);
        let listed = path::strip_base(&resolved, &self.base_dir).unwrap_or_else(|| "/".to_string());

        let mut files = Vec::new();
        for entry in propfind::parse_multistatus(&body)? {
            let Some(relative) = self.relative_from_href(&entry.href) else {
                warn!(href = %entry.href, "Skipping entry outside the base directory");
                continue;
            };
            if relative == listed {
                continue;
            }

            let name = relative.rsplit('/').next().unwrap_or_default().to_string();
            files.push(RemoteFile {
                path: relative,
                name,
                size: entry.size,
                is_folder: entry.is_collection,
                modified_at: entry.modified,
            });
        }

        Ok(files)
    }
}

#[async_trait]
impl RemoteStorage for WebDavClient {
    #[instrument(skip(self))]
    async fn check_connection(&self) -> BridgeResult<()> {
        let mut last = self.last_check.lock().await;
        if let Some(at) = *last {
            if at.elapsed() < self.check_ttl {
                debug!("Using cached WebDAV connection check");
                return Ok(());
            }
        }

        match self.ping().await {
            Ok(()) => {
                *last = Some(Instant::now());
                debug!(base_dir = %self.base_dir, "WebDAV connection verified");
                Ok(())
            }
            Err(e) => {
                *last = None;
                warn!(error = %e, "WebDAV connection check failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self))]
    async fn mkdir_all(&self, remote_dir: &str) -> BridgeResult<()> {
        Ok(self.make_dirs(remote_dir).await?)
    }

    #[instrument(skip(self, local), fields(local = %local.display()))]
    async fn upload(&self, local: &Path, remote_path: &str) -> BridgeResult<()> {
        let resolved = self.put(local, remote_path).await?;
        info!(remote = %resolved, "Uploaded file");
        Ok(())
    }

    #[instrument(skip(self, local), fields(local = %local.display()))]
    async fn upload_to(&self, local: &Path, remote_dir: &str) -> BridgeResult<String> {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                WebDavError::InvalidConfig(format!("{} has no file name", local.display()))
            })?;

        let target = path::join(remote_dir, &name);
        let resolved = self.put(local, &target).await?;
        info!(remote = %resolved, "Uploaded file");
        Ok(target)
    }

    async fn download(&self, remote_path: &str, local: &Path) -> BridgeResult<()> {
        Ok(self.get(remote_path, local).await?)
    }

    #[instrument(skip(self))]
    async fn delete(&self, remote_path: &str) -> BridgeResult<()> {
        Ok(self.remove(remote_path).await?)
    }

    async fn list(&self, remote_dir: &str) -> BridgeResult<Vec<RemoteFile>> {
        Ok(self.list_dir(remote_dir).await?)
    }
}

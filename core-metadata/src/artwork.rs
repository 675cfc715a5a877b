//! Cover art download.
//!
//! Covers are fetched with a plain GET; anything other than `200 OK` with a
//! recognizable image body is a failure the caller downgrades to a warning.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use lofty::picture::MimeType;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{MetadataError, Result};

const COVER_TIMEOUT: Duration = Duration::from_secs(15);

/// A downloaded cover image.
#[derive(Debug, Clone)]
pub struct Cover {
    pub data: Bytes,
    pub mime_type: MimeType,
}

/// Fetches cover images over HTTP.
#[derive(Clone)]
pub struct CoverFetcher {
    http_client: Arc<dyn HttpClient>,
}

impl CoverFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    pub async fn fetch(&self, url: &str) -> Result<Cover> {
        debug!(url, "Fetching cover");

        let request = HttpRequest::new(HttpMethod::Get, url)
            .header("Accept", "image/*")
            .timeout(COVER_TIMEOUT);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| MetadataError::CoverFetchFailed(format!("{}: {}", url, e)))?;

        if response.status != 200 {
            return Err(MetadataError::CoverFetchFailed(format!(
                "{}: HTTP {}",
                url, response.status
            )));
        }

        let mime_type = detect_mime_type(&response.body).ok_or_else(|| {
            MetadataError::CoverFetchFailed(format!("{}: body is not an image", url))
        })?;

        Ok(Cover {
            data: response.body,
            mime_type,
        })
    }
}

/// Detects the image type from magic bytes.
pub fn detect_mime_type(data: &[u8]) -> Option<MimeType> {
    if data.len() < 12 {
        return None;
    }

    match &data[0..4] {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, _] => Some(MimeType::Jpeg),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47] => Some(MimeType::Png),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38] => Some(MimeType::Gif),
        // BMP: 42 4D
        [0x42, 0x4D, _, _] => Some(MimeType::Bmp),
        // WEBP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46] if &data[8..12] == b"WEBP" => {
            Some(MimeType::Unknown("image/webp".to_string()))
        }
        _ => None,
    }
}

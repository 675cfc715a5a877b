//! PROPFIND request body and multistatus parsing.
//!
//! Servers disagree on namespace prefixes (`d:`, `D:`, `lp1:` or none), so
//! elements are matched by local name.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, WebDavError};

/// Body sent with every PROPFIND.
pub const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

static RESPONSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:[a-z0-9_-]+:)?response\b[^>]*>(.*?)</(?:[a-z0-9_-]+:)?response\s*>")
        .expect("valid response regex")
});

static HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:[a-z0-9_-]+:)?href\b[^>]*>\s*(.*?)\s*</(?:[a-z0-9_-]+:)?href\s*>")
        .expect("valid href regex")
});

static LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:[a-z0-9_-]+:)?getcontentlength\b[^>]*>\s*(\d+)\s*<")
        .expect("valid length regex")
});

static MODIFIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:[a-z0-9_-]+:)?getlastmodified\b[^>]*>\s*(.*?)\s*<")
        .expect("valid modified regex")
});

static COLLECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:[a-z0-9_-]+:)?collection\b").expect("valid collection regex")
});

/// One `<response>` of a multistatus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Raw href, still percent-encoded
    pub href: String,
    pub size: Option<u64>,
    pub is_collection: bool,
    pub modified: Option<String>,
}

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#[xX]([0-9a-fA-F]+)|#([0-9]+)|(amp|lt|gt|quot|apos));")
        .expect("valid entity regex")
});

/// Decode XML entities in one pass, so `&amp;lt;` stays `&lt;`. Unknown or
/// out-of-range references are left as written.
fn unescape(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let decoded = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else {
                match &caps[3] {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    _ => Some('\''),
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Parse a 207 multistatus body.
pub fn parse_multistatus(body: &str) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for response in RESPONSE.captures_iter(body) {
        let block = &response[1];
        let href = HREF
            .captures(block)
            .map(|c| unescape(&c[1]))
            .ok_or_else(|| WebDavError::Parse("response without href".to_string()))?;

        entries.push(Entry {
            href,
            size: LENGTH.captures(block).and_then(|c| c[1].parse().ok()),
            is_collection: COLLECTION.is_match(block),
            modified: MODIFIED
                .captures(block)
                .map(|c| c[1].to_string())
                .filter(|m| !m.is_empty()),
        });
    }

    if entries.is_empty() && !body.to_ascii_lowercase().contains("multistatus") {
        return Err(WebDavError::Parse(
            "body is not a multistatus document".to_string(),
        ));
    }

    Ok(entries)
}

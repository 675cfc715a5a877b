use crate::matcher;
use crate::types::ClassifiedLink;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

// ASCII word class: CJK text glued to a link must not extend the match.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>"'()]*[A-Za-z0-9_/#?=&-]"#).expect("URL pattern is valid")
});

/// First `http(s)://` substring in `text`, before trimming.
pub fn extract_url(text: &str) -> Option<&str> {
    URL_PATTERN.find(text).map(|m| m.as_str())
}

fn is_trailing_junk(c: char) -> bool {
    if c.is_ascii() {
        c.is_ascii_punctuation() && !matches!(c, '/' | '#' | '?' | '=' | '&' | '-' | '_')
    } else {
        !c.is_alphanumeric()
    }
}

/// Trim trailing punctuation and parse; the serialized [`Url`] is canonical.
///
/// Returns `None` when the remainder does not parse or has no host.
pub fn canonicalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches(is_trailing_junk);
    let parsed = Url::parse(trimmed).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(parsed.to_string())
}

/// Classify the first link in `text`.
///
/// Host lookup wins when the owning matcher accepts the URL; otherwise every
/// matcher is tried in declaration order.
pub fn classify(text: &str) -> ClassifiedLink {
    let Some(raw) = extract_url(text) else {
        return ClassifiedLink::unknown();
    };

    let Some(url) = canonicalize(raw) else {
        debug!(raw, "Link did not parse");
        return ClassifiedLink::unknown();
    };

    let host = Url::parse(&url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();

    let by_host = matcher::for_host(&host).filter(|m| m.matches(&url));
    let Some(found) = by_host.or_else(|| matcher::fallback(&url)) else {
        debug!(%url, "No matcher accepted link");
        return ClassifiedLink::unknown();
    };

    ClassifiedLink {
        url,
        link_type: found.link_type,
    }
}

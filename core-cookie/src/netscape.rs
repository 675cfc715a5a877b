//! Netscape `cookies.txt` codec.
//!
//! One cookie per line, seven TAB-separated fields:
//! `domain  include_subdomains  path  secure  expiry  name  value`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::warn;

use crate::error::{CookieError, Result};

pub const HEADER: &str = "# Netscape HTTP Cookie File\n";

/// Cookie as exported by the browser extension.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCookie {
    pub domain: String,
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    /// Unix seconds; absent for session cookies
    #[serde(default)]
    pub expiration_date: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

/// Decrypted CookieCloud payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudPayload {
    pub cookie_data: BTreeMap<String, Vec<CloudCookie>>,
}

/// One row of a cookie file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetscapeCookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix seconds, 0 for session cookies
    pub expiry: i64,
    pub name: String,
    pub value: String,
}

impl NetscapeCookie {
    fn is_writable(&self) -> bool {
        let fields = [&self.domain, &self.path, &self.name, &self.value];
        !self.domain.is_empty()
            && !self.name.is_empty()
            && fields
                .iter()
                .all(|f| !f.contains(['\t', '\n', '\r']))
    }
}

impl From<&CloudCookie> for NetscapeCookie {
    fn from(cookie: &CloudCookie) -> Self {
        Self {
            domain: cookie.domain.clone(),
            include_subdomains: cookie.domain.starts_with('.'),
            path: if cookie.path.is_empty() {
                default_path()
            } else {
                cookie.path.clone()
            },
            secure: cookie.secure,
            expiry: cookie
                .expiration_date
                .map(|e| e.max(0.0).trunc() as i64)
                .unwrap_or(0),
            name: cookie.name.clone(),
            value: cookie.value.clone(),
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Flatten a payload into rows, in domain order.
///
/// Cookies whose fields would break the TAB/newline framing are skipped.
pub fn from_payload(payload: &CloudPayload) -> Vec<NetscapeCookie> {
    payload
        .cookie_data
        .values()
        .flatten()
        .map(NetscapeCookie::from)
        .filter(|cookie| {
            let keep = cookie.is_writable();
            if !keep {
                warn!(domain = %cookie.domain, name = %cookie.name, "Skipping unencodable cookie");
            }
            keep
        })
        .collect()
}

/// Render a cookie file.
pub fn render(cookies: &[NetscapeCookie]) -> String {
    let mut out = String::from(HEADER);
    for c in cookies {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            c.domain,
            flag(c.include_subdomains),
            c.path,
            flag(c.secure),
            c.expiry,
            c.name,
            c.value
        );
    }
    out
}

fn parse_flag(raw: &str, line: usize) -> Result<bool> {
    match raw {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        other => Err(CookieError::Format {
            line,
            reason: format!("expected TRUE/FALSE, got {:?}", other),
        }),
    }
}

/// Parse a cookie file. Comments and blank lines are ignored; curl's
/// `#HttpOnly_` domain prefix is accepted.
pub fn parse(text: &str) -> Result<Vec<NetscapeCookie>> {
    let mut cookies = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.strip_prefix("#HttpOnly_").unwrap_or(raw);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return Err(CookieError::Format {
                line: line_no,
                reason: format!("expected 7 fields, got {}", fields.len()),
            });
        }

        cookies.push(NetscapeCookie {
            domain: fields[0].to_string(),
            include_subdomains: parse_flag(fields[1], line_no)?,
            path: fields[2].to_string(),
            secure: parse_flag(fields[3], line_no)?,
            expiry: fields[4].parse().map_err(|_| CookieError::Format {
                line: line_no,
                reason: format!("invalid expiry {:?}", fields[4]),
            })?,
            name: fields[5].to_string(),
            value: fields[6].to_string(),
        });
    }

    Ok(cookies)
}

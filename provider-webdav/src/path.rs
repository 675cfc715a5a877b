//! Remote path helpers. Remote paths always use `/`.

/// Collapse slashes, drop `.` and resolve `..` without escaping the root.
///
/// Always returns a leading `/` and never a trailing one (root is `/`).
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// `base + '/' + relative`, normalized.
pub fn join(base: &str, relative: &str) -> String {
    normalize(&format!("{}/{}", base, relative))
}

/// Percent-encode each segment of a normalized path.
pub fn encode(path: &str) -> String {
    let encoded: Vec<String> = normalize(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect();
    format!("/{}", encoded.join("/"))
}

/// Every ancestor of `path` plus `path` itself, shortest first.
pub fn prefixes(path: &str) -> Vec<String> {
    let normalized = normalize(path);
    let mut out = Vec::new();
    let mut current = String::new();
    for segment in normalized.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

/// Strip `prefix` (a normalized directory) from `path`, keeping a leading `/`.
pub fn strip_base(path: &str, prefix: &str) -> Option<String> {
    let path = normalize(path);
    let prefix = normalize(prefix);
    if prefix == "/" {
        return Some(path);
    }
    if path == prefix {
        return Some("/".to_string());
    }
    path.strip_prefix(&prefix)
        .filter(|rest| rest.starts_with('/'))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Music/"), "/Music");
        assert_eq!(normalize("//Music///Albums/"), "/Music/Albums");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("/../../etc"), "/etc");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/Music/", "/a.flac"), "/Music/a.flac");
        assert_eq!(join("", "a.flac"), "/a.flac");
        assert_eq!(join("/Music", "/"), "/Music");
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode("/Music/My Song #1.flac"), "/Music/My%20Song%20%231.flac");
        assert_eq!(encode("/音乐"), "/%E9%9F%B3%E4%B9%90");
        assert_eq!(encode("/"), "/");
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(prefixes("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert!(prefixes("/").is_empty());
    }

    #[test]
    fn test_strip_base() {
        assert_eq!(strip_base("/dav/Music/a", "/dav").as_deref(), Some("/Music/a"));
        assert_eq!(strip_base("/dav", "/dav").as_deref(), Some("/"));
        assert_eq!(strip_base("/davx/a", "/dav"), None);
        assert_eq!(strip_base("/a", "/").as_deref(), Some("/a"));
    }
}

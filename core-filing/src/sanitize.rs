//! File-name sanitizer.

/// Characters rejected by Windows file systems in addition to separators.
const FORBIDDEN: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Name used when nothing printable survives.
pub const FALLBACK_NAME: &str = "untitled";

/// Strip path separators, control characters and Windows-forbidden
/// characters from a single file name.
///
/// Surrounding whitespace is trimmed and names that would resolve to the
/// current or parent directory become [`FALLBACK_NAME`]. Applying it twice
/// gives the same result as applying it once.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !FORBIDDEN.contains(c))
        .collect();
    let trimmed = cleaned.trim();

    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_examples() {
        assert_eq!(sanitize("example_track.m4a"), "example_track.m4a");
        assert_eq!(sanitize("a/b\\c.flac"), "abc.flac");
        assert_eq!(sanitize("what? <live> \"x\" | y*.mp3"), "what live x  y.mp3");
        assert_eq!(sanitize("tab\there\n.flac"), "tabhere.flac");
        assert_eq!(sanitize("晴天 - 周杰伦.flac"), "晴天 - 周杰伦.flac");
    }

    #[test]
    fn test_sanitize_degenerate_names() {
        assert_eq!(sanitize(""), FALLBACK_NAME);
        assert_eq!(sanitize("///"), FALLBACK_NAME);
        assert_eq!(sanitize(".."), FALLBACK_NAME);
        assert_eq!(sanitize(" / . "), FALLBACK_NAME);
        assert_eq!(sanitize("\u{7}"), FALLBACK_NAME);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let samples = [
            "",
            "  spaced  ",
            "a/b",
            " :: ",
            "x\u{0}y",
            "..hidden",
            "ok.flac",
            "\u{1b}[31mred\u{1b}[0m.mp3",
            "?.?",
            "中文：标点？.m4a",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "input {:?}", sample);
            assert!(!once.contains(FORBIDDEN));
            assert!(!once.chars().any(char::is_control));
        }
    }
}

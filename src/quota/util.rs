use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serializer;
use std::path::Path;

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

pub fn to_rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serializes timestamps as `2026-10-19T08:30:00.000Z`.
pub fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&to_rfc3339(ts))
}

/// Truncate `input` to at most `max_chars` Unicode characters, stripping
/// control characters and appending `…` when truncated.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input.chars().filter(|c| !c.is_control()).collect();
    if clean.chars().count() > max_chars {
        let mut s: String = clean.chars().take(max_chars).collect();
        s.push('…');
        s
    } else {
        clean
    }
}

pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::{file_name_lossy, truncate_with_ellipsis};
    use std::path::Path;

    #[test]
    fn truncate_strips_control_characters() {
        assert_eq!(truncate_with_ellipsis("a\nb\tc", 10), "abc");
    }

    #[test]
    fn truncate_appends_ellipsis_when_cut() {
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc…");
    }

    #[test]
    fn file_name_lossy_prefers_last_component() {
        assert_eq!(
            file_name_lossy(Path::new("/shots/claude_usage_1.png")),
            "claude_usage_1.png"
        );
    }
}

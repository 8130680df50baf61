use std::path::PathBuf;

use thiserror::Error;

use crate::quota::util::truncate_with_ellipsis;

const RAW_PREVIEW_CHARS: usize = 160;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("inference transport failed: {0}")]
    Transport(String),
    #[error("inference credential missing or rejected: {0}")]
    Auth(String),
    #[error("no JSON object found in model response: {}", preview(.raw))]
    Extraction { raw: String },
    #[error("filesystem operation failed on {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn preview(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "<empty>".to_string();
    }
    truncate_with_ellipsis(raw.trim(), RAW_PREVIEW_CHARS)
}

impl QuotaError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT",
            Self::Auth(_) => "E_AUTH",
            Self::Extraction { .. } => "E_EXTRACTION",
            Self::Filesystem { .. } => "E_FILESYSTEM",
            Self::InvalidConfig(_) => "E_CONFIG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QuotaError;

    #[test]
    fn extraction_error_previews_raw_text() {
        let err = QuotaError::Extraction {
            raw: format!("  {}  ", "x".repeat(400)),
        };
        let text = err.to_string();
        assert!(text.starts_with("no JSON object found in model response: xxx"));
        assert!(text.ends_with('…'));
        assert!(text.chars().count() < 260);
    }

    #[test]
    fn extraction_error_marks_empty_reply() {
        let err = QuotaError::Extraction {
            raw: "   ".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no JSON object found in model response: <empty>"
        );
    }

    #[test]
    fn invalid_config_message_does_not_blame_a_file() {
        let err = QuotaError::InvalidConfig("unknown inference provider `gemini`".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: unknown inference provider `gemini`"
        );
    }

    #[test]
    fn codes_are_distinct_per_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let codes = [
            QuotaError::Transport("t".into()).code(),
            QuotaError::Auth("a".into()).code(),
            QuotaError::Extraction { raw: String::new() }.code(),
            QuotaError::filesystem("/tmp/x", io).code(),
            QuotaError::InvalidConfig("c".into()).code(),
        ];
        let unique: std::collections::BTreeSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}

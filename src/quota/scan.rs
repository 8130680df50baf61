use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::QuotaError;

/// A screenshot in the watch directory. Ordering is by modification time,
/// then by file name, which makes "newest" deterministic when timestamps tie.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    pub modified: SystemTime,
    pub name: String,
    pub path: PathBuf,
}

/// Regular files directly inside `dir` whose name matches `pattern`, oldest first.
pub fn list_matching(dir: &Path, pattern: &Pattern) -> Result<Vec<Candidate>, QuotaError> {
    let read_dir = fs::read_dir(dir).map_err(|err| QuotaError::filesystem(dir, err))?;

    let mut out = Vec::new();
    for entry in read_dir {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !pattern.matches(name) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        out.push(Candidate {
            modified: meta.modified().unwrap_or(UNIX_EPOCH),
            name: name.to_string(),
            path,
        });
    }

    out.sort();
    Ok(out)
}

/// The newest candidate whose name is not excluded.
pub fn newest<'a, F>(candidates: &'a [Candidate], is_excluded: F) -> Option<&'a Candidate>
where
    F: Fn(&str) -> bool,
{
    candidates.iter().rev().find(|c| !is_excluded(&c.name))
}

#[cfg(test)]
mod tests {
    use super::{list_matching, newest};
    use glob::Pattern;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str, epoch_secs: u64) {
        let path = dir.join(name);
        fs::write(&path, b"png").expect("write");
        let file = File::options().write(true).open(&path).expect("open");
        file.set_modified(UNIX_EPOCH + Duration::from_secs(epoch_secs))
            .expect("set mtime");
    }

    #[test]
    fn lists_only_matching_regular_files_oldest_first() {
        let tmp = tempdir().expect("tempdir");
        touch(tmp.path(), "claude_usage_20261019_0902.png", 200);
        touch(tmp.path(), "claude_usage_20261019_0901.png", 100);
        touch(tmp.path(), "notes.txt", 300);
        fs::create_dir(tmp.path().join("claude_usage_dir.png")).expect("mkdir");

        let pattern = Pattern::new("claude_usage_*.png").expect("pattern");
        let got = list_matching(tmp.path(), &pattern).expect("list");
        let names = got.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "claude_usage_20261019_0901.png",
                "claude_usage_20261019_0902.png"
            ]
        );
    }

    #[test]
    fn equal_timestamps_break_ties_by_name() {
        let tmp = tempdir().expect("tempdir");
        touch(tmp.path(), "claude_usage_b.png", 100);
        touch(tmp.path(), "claude_usage_c.png", 100);
        touch(tmp.path(), "claude_usage_a.png", 100);

        let pattern = Pattern::new("claude_usage_*.png").expect("pattern");
        let got = list_matching(tmp.path(), &pattern).expect("list");
        assert_eq!(
            newest(&got, |_| false).map(|c| c.name.as_str()),
            Some("claude_usage_c.png")
        );
    }

    #[test]
    fn newest_skips_excluded_names() {
        let tmp = tempdir().expect("tempdir");
        touch(tmp.path(), "claude_usage_1.png", 100);
        touch(tmp.path(), "claude_usage_2.png", 200);

        let pattern = Pattern::new("claude_usage_*.png").expect("pattern");
        let got = list_matching(tmp.path(), &pattern).expect("list");
        let picked = newest(&got, |name| name == "claude_usage_2.png");
        assert_eq!(picked.map(|c| c.name.as_str()), Some("claude_usage_1.png"));
        assert!(newest(&got, |_| true).is_none());
    }

    #[test]
    fn missing_directory_is_a_filesystem_error() {
        let tmp = tempdir().expect("tempdir");
        let pattern = Pattern::new("*.png").expect("pattern");
        let err = list_matching(&tmp.path().join("gone"), &pattern).unwrap_err();
        assert_eq!(err.code(), "E_FILESYSTEM");
    }
}

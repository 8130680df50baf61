use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "QUOTA_";

fn rust_sources(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(next) = pending.pop() {
        for entry in fs::read_dir(&next)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                out.push(path);
            }
        }
    }
    Ok(out)
}

/// Every `QUOTA_[A-Z0-9_]+` token in `source`. A bare prefix is skipped.
fn env_keys_in(source: &str) -> impl Iterator<Item = String> + '_ {
    source.match_indices(ENV_PREFIX).filter_map(|(start, _)| {
        let tail = &source[start + ENV_PREFIX.len()..];
        let len = tail
            .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
            .unwrap_or(tail.len());
        (len > 0).then(|| source[start..start + ENV_PREFIX.len() + len].to_string())
    })
}

fn main() -> std::io::Result<()> {
    let mut keys = BTreeSet::new();
    for file in rust_sources(Path::new("src"))? {
        if let Ok(content) = fs::read_to_string(&file) {
            keys.extend(env_keys_in(&content));
        }
    }

    let body = keys
        .iter()
        .map(|key| format!("    \"{key}\",\n"))
        .collect::<String>();
    let out_dir = env::var("OUT_DIR").map_err(std::io::Error::other)?;
    fs::write(
        Path::new(&out_dir).join("quota_env_allowlist.rs"),
        format!("pub const GENERATED_QUOTA_ENV_ALLOWLIST: &[&str] = &[\n{body}];\n"),
    )?;

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
    Ok(())
}

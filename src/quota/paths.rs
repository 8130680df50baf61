use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct QuotaPaths {
    pub quota_home: PathBuf,
    pub config_file: PathBuf,
    pub status_file: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => expand_home(v.trim()),
        _ => fallback,
    }
}

/// Expands a leading `~/` against the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

pub fn default_quota_home(config_dir: Option<PathBuf>, home: &std::path::Path) -> PathBuf {
    config_dir
        .unwrap_or_else(|| home.join(".config"))
        .join("quotawatch")
}

pub fn resolve_paths() -> Result<QuotaPaths> {
    let home = required_home_dir()?;
    let quota_home = env_or_default_path("QUOTA_HOME", default_quota_home(dirs::config_dir(), &home));
    let config_file = env_or_default_path("QUOTA_CONFIG_PATH", quota_home.join("config.toml"));
    let status_file = home.join(".claude").join("quota-data.json");

    Ok(QuotaPaths {
        quota_home,
        config_file,
        status_file,
    })
}

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::quota::inference::parse_provider_alias;

include!(concat!(env!("OUT_DIR"), "/quota_env_allowlist.rs"));

pub const DEFAULT_PROVIDER: &str = "ollama";
pub const DEFAULT_MODEL: &str = "qwen3-vl:235b-cloud";
pub const DEFAULT_HOST: &str = "https://ollama.com";
pub const DEFAULT_PATTERN: &str = "claude_usage_*.png";
pub const MIN_POLL_INTERVAL_SECS: f64 = 0.5;
pub const MAX_POLL_INTERVAL_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub provider: String,
    pub host: String,
    pub model: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub watch_dir: Option<String>,
    pub pattern: String,
    pub poll_interval_secs: f64,
    pub status_file: Option<String>,
    pub full_output: Option<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watch_dir: None,
            pattern: DEFAULT_PATTERN.to_string(),
            poll_interval_secs: 10.0,
            status_file: None,
            full_output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuotaConfig {
    pub inference: InferenceConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialQuotaConfig {
    inference: Option<InferenceConfig>,
    watch: Option<WatchConfig>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub host: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub watch_dir: Option<String>,
    pub pattern: Option<String>,
    pub poll_interval_secs: Option<f64>,
    pub status_file: Option<String>,
    pub full_output: Option<String>,
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<f64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_non_empty(var).unwrap_or_else(|| fallback.to_string())
}

fn validate(cfg: &QuotaConfig) -> Result<()> {
    if parse_provider_alias(&cfg.inference.provider).is_none() {
        return Err(anyhow!(
            "invalid inference provider `{}`: use `ollama` or `openai-compatible`",
            cfg.inference.provider
        ));
    }
    if cfg.inference.host.trim().is_empty() {
        return Err(anyhow!("invalid inference host: cannot be empty"));
    }
    if cfg.inference.model.trim().is_empty() {
        return Err(anyhow!("invalid inference model: cannot be empty"));
    }
    if cfg.inference.timeout_secs == 0 {
        return Err(anyhow!("invalid inference timeout: must be >= 1 second"));
    }
    if cfg.watch.pattern.trim().is_empty() {
        return Err(anyhow!("invalid watch pattern: cannot be empty"));
    }
    glob::Pattern::new(&cfg.watch.pattern)
        .map_err(|err| anyhow!("invalid watch pattern `{}`: {err}", cfg.watch.pattern))?;
    if !cfg.watch.poll_interval_secs.is_finite() || cfg.watch.poll_interval_secs <= 0.0 {
        return Err(anyhow!("invalid poll interval: must be a positive number of seconds"));
    }
    if cfg.watch.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
        return Err(anyhow!(
            "invalid poll interval: must be at most {MAX_POLL_INTERVAL_SECS} seconds"
        ));
    }
    Ok(())
}

fn merge_file_config(base: &mut QuotaConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| anyhow!("failed to read quotawatch config {}: {err}", path.display()))?;
    let parsed: PartialQuotaConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse quotawatch config {}: {err}", path.display()))?;
    if let Some(inference) = parsed.inference {
        base.inference = inference;
    }
    if let Some(watch) = parsed.watch {
        base.watch = watch;
    }
    Ok(())
}

fn merge_env(cfg: &mut QuotaConfig) {
    cfg.inference.provider = env_or_string("QUOTA_PROVIDER", &cfg.inference.provider);
    cfg.inference.host = env_or_string("QUOTA_HOST", &cfg.inference.host);
    cfg.inference.model = env_or_string("QUOTA_MODEL", &cfg.inference.model);
    cfg.inference.timeout_secs = env_or_u64("QUOTA_TIMEOUT_SECS", cfg.inference.timeout_secs);
    cfg.inference.api_key = env_non_empty("QUOTA_API_KEY")
        .or_else(|| env_non_empty("OLLAMA_API_KEY"))
        .or(cfg.inference.api_key.take());

    cfg.watch.watch_dir = env_non_empty("QUOTA_WATCH_DIR").or(cfg.watch.watch_dir.take());
    cfg.watch.pattern = env_or_string("QUOTA_PATTERN", &cfg.watch.pattern);
    cfg.watch.poll_interval_secs =
        env_or_f64("QUOTA_POLL_INTERVAL_SECS", cfg.watch.poll_interval_secs);
    cfg.watch.status_file = env_non_empty("QUOTA_STATUS_FILE").or(cfg.watch.status_file.take());
    cfg.watch.full_output = env_non_empty("QUOTA_FULL_OUTPUT").or(cfg.watch.full_output.take());
}

pub fn apply_overrides(cfg: &mut QuotaConfig, overrides: &ConfigOverrides) {
    fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
        if let Some(v) = value {
            *slot = v.clone();
        }
    }
    fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
        if value.is_some() {
            *slot = value.clone();
        }
    }

    set(&mut cfg.inference.provider, &overrides.provider);
    set(&mut cfg.inference.host, &overrides.host);
    set(&mut cfg.inference.model, &overrides.model);
    set_opt(&mut cfg.inference.api_key, &overrides.api_key);
    set(&mut cfg.inference.timeout_secs, &overrides.timeout_secs);
    set_opt(&mut cfg.watch.watch_dir, &overrides.watch_dir);
    set(&mut cfg.watch.pattern, &overrides.pattern);
    set(&mut cfg.watch.poll_interval_secs, &overrides.poll_interval_secs);
    set_opt(&mut cfg.watch.status_file, &overrides.status_file);
    set_opt(&mut cfg.watch.full_output, &overrides.full_output);
}

/// `QUOTA_*` variables in the environment that nothing reads, usually typos.
pub fn unknown_env_keys<I>(keys: I, allowlist: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = keys
        .into_iter()
        .filter(|key| key.starts_with("QUOTA_") && !allowlist.contains(&key.as_str()))
        .collect::<Vec<_>>();
    out.sort();
    out
}

pub fn load_config(config_file: &Path, overrides: &ConfigOverrides) -> Result<QuotaConfig> {
    for key in unknown_env_keys(env::vars().map(|(k, _)| k), GENERATED_QUOTA_ENV_ALLOWLIST) {
        tracing::warn!(key = %key, "ignoring unknown quotawatch environment variable");
    }

    let mut cfg = QuotaConfig::default();
    merge_file_config(&mut cfg, config_file)?;
    merge_env(&mut cfg);
    apply_overrides(&mut cfg, overrides);
    cfg.watch.poll_interval_secs = cfg.watch.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS);

    validate(&cfg)?;
    Ok(cfg)
}

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::QuotaError;
use crate::quota::config::InferenceConfig;
use crate::quota::util::{file_name_lossy, truncate_with_ellipsis};

pub const QUOTA_PROMPT: &str = r#"Analyze this Claude.ai usage settings screenshot and extract quota information.

Return ONLY valid JSON with this exact structure:
{
  "current_session": {
    "percent_used": <number>,
    "resets_in": "<time string>"
  },
  "weekly_limits": {
    "percent_used": <number>,
    "resets": "<time string>"
  }
}

If a value is unclear, use null."#;

const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAiCompatible,
}

impl Provider {
    pub fn label(self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAiCompatible => "openai-compatible",
        }
    }
}

pub fn parse_provider_alias(raw: &str) -> Option<Provider> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ollama" => Some(Provider::Ollama),
        "openai" | "openai-compatible" | "compatible" => Some(Provider::OpenAiCompatible),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub file_name: String,
    pub media_type: &'static str,
    pub base64: String,
}

impl ImagePayload {
    pub fn from_path(path: &Path) -> Result<Self, QuotaError> {
        let bytes = fs::read(path).map_err(|err| QuotaError::filesystem(path, err))?;
        Ok(Self {
            file_name: file_name_lossy(path),
            media_type: media_type_for(path),
            base64: BASE64.encode(bytes),
        })
    }

    fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

/// A vision endpoint that answers a prompt about one image with free-form text.
pub trait VisionClient {
    fn label(&self) -> &'static str;
    fn describe(&self, image: &ImagePayload, prompt: &str) -> Result<String, QuotaError>;
}

pub struct OllamaClient {
    pub host: String,
    pub model: String,
    pub api_key: Option<String>,
    http: Client,
}

pub struct OpenAiCompatClient {
    pub host: String,
    pub model: String,
    pub api_key: Option<String>,
    http: Client,
}

pub fn build_client(cfg: &InferenceConfig) -> Result<Box<dyn VisionClient>, QuotaError> {
    let provider = parse_provider_alias(&cfg.provider).ok_or_else(|| {
        QuotaError::InvalidConfig(format!(
            "unknown inference provider `{}`; use `ollama` or `openai-compatible`",
            cfg.provider
        ))
    })?;
    let http = Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .map_err(|err| QuotaError::Transport(format!("failed to build http client: {err}")))?;
    let host = cfg.host.trim().trim_end_matches('/').to_string();
    let api_key = cfg.api_key.clone().filter(|k| !k.trim().is_empty());

    Ok(match provider {
        Provider::Ollama => Box::new(OllamaClient {
            host,
            model: cfg.model.clone(),
            api_key,
            http,
        }),
        Provider::OpenAiCompatible => Box::new(OpenAiCompatClient {
            host,
            model: cfg.model.clone(),
            api_key,
            http,
        }),
    })
}

pub fn is_local_host(host: &str) -> bool {
    let Ok(url) = Url::parse(host) else {
        return false;
    };
    let Some(name) = url.host_str() else {
        return false;
    };
    let name = name.trim_start_matches('[').trim_end_matches(']');
    LOCAL_HOSTS.iter().any(|local| name.eq_ignore_ascii_case(local))
}

/// Non-local hosts need a bearer credential.
pub fn require_credential(host: &str, api_key: Option<&str>) -> Result<(), QuotaError> {
    if api_key.is_some() || is_local_host(host) {
        return Ok(());
    }
    Err(QuotaError::Auth(format!(
        "an API key is required for non-local host {host}; set QUOTA_API_KEY or OLLAMA_API_KEY"
    )))
}

/// JSON schema describing the reply shape, sent as a structured-output hint.
pub fn quota_schema() -> Value {
    let percent = json!({"type": ["number", "null"], "minimum": 0, "maximum": 100});
    json!({
        "type": "object",
        "properties": {
            "current_session": {
                "type": "object",
                "properties": {
                    "percent_used": percent,
                    "resets_in": {"type": "string"}
                },
                "required": ["percent_used", "resets_in"]
            },
            "weekly_limits": {
                "type": "object",
                "properties": {
                    "percent_used": percent,
                    "resets": {"type": "string"}
                },
                "required": ["percent_used", "resets"]
            }
        },
        "required": ["current_session", "weekly_limits"]
    })
}

fn post_json(
    http: &Client,
    url: &str,
    api_key: Option<&str>,
    payload: &Value,
) -> Result<Value, QuotaError> {
    let mut request = http.post(url).json(payload);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().map_err(|err| {
        if err.is_timeout() {
            QuotaError::Transport(format!("request to {url} timed out"))
        } else {
            QuotaError::Transport(format!("request to {url} failed: {err}"))
        }
    })?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(QuotaError::Auth(format!("{url} rejected credential with {status}")));
    }
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(QuotaError::Transport(format!(
            "{url} returned {status}: {}",
            truncate_with_ellipsis(body.trim(), MAX_ERROR_BODY_CHARS)
        )));
    }

    response
        .json::<Value>()
        .map_err(|err| QuotaError::Transport(format!("invalid response envelope from {url}: {err}")))
}

pub fn ollama_payload(model: &str, image: &ImagePayload, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": prompt,
                "images": [image.base64]
            }
        ],
        "stream": false,
        "format": quota_schema(),
        "options": {"temperature": 0.0}
    })
}

pub fn openai_compatible_payload(model: &str, image: &ImagePayload, prompt: &str) -> Value {
    json!({
        "model": model,
        "temperature": 0.0,
        "response_format": {"type": "json_object"},
        "messages": [
            {
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": image.data_uri()}}
                ]
            }
        ]
    })
}

pub fn extract_ollama_text(json: &Value) -> Option<String> {
    let content = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    content
        .or_else(|| json.get("response").and_then(Value::as_str))
        .map(ToOwned::to_owned)
}

pub fn extract_openai_compatible_text(json: &Value) -> Option<String> {
    let choices = json.get("choices").and_then(Value::as_array)?;
    let first = choices.first()?;
    let content = first.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.to_string()),
        Value::Array(parts) => {
            let chunks = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>();
            if chunks.is_empty() {
                None
            } else {
                Some(chunks.join("\n"))
            }
        }
        _ => None,
    }
}

impl VisionClient for OllamaClient {
    fn label(&self) -> &'static str {
        Provider::Ollama.label()
    }

    fn describe(&self, image: &ImagePayload, prompt: &str) -> Result<String, QuotaError> {
        require_credential(&self.host, self.api_key.as_deref())?;
        let url = format!("{}/api/chat", self.host);
        let payload = ollama_payload(&self.model, image, prompt);
        let json = post_json(&self.http, &url, self.api_key.as_deref(), &payload)?;
        extract_ollama_text(&json).ok_or_else(|| {
            QuotaError::Transport(format!("{url} response missing message content"))
        })
    }
}

impl VisionClient for OpenAiCompatClient {
    fn label(&self) -> &'static str {
        Provider::OpenAiCompatible.label()
    }

    fn describe(&self, image: &ImagePayload, prompt: &str) -> Result<String, QuotaError> {
        require_credential(&self.host, self.api_key.as_deref())?;
        let url = format!("{}/v1/chat/completions", self.host);
        let payload = openai_compatible_payload(&self.model, image, prompt);
        let json = post_json(&self.http, &url, self.api_key.as_deref(), &payload)?;
        extract_openai_compatible_text(&json).ok_or_else(|| {
            QuotaError::Transport(format!("{url} response missing choices[0].message.content"))
        })
    }
}

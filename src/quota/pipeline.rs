use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::QuotaError;
use crate::quota::extract::extract_json;
use crate::quota::inference::{ImagePayload, QUOTA_PROMPT, VisionClient};
use crate::quota::reading::QuotaReading;
use crate::quota::util::now_utc;
use crate::quota::validate::validate;

/// When the screenshot was taken, as far as the filesystem knows.
pub(crate) fn capture_time(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| now_utc())
}

/// Reads one screenshot: inference, then extraction, then validation.
pub fn read_quota(client: &dyn VisionClient, image_path: &Path) -> Result<QuotaReading, QuotaError> {
    let image = ImagePayload::from_path(image_path)?;
    let captured_at = capture_time(image_path);

    let reply = client.describe(&image, QUOTA_PROMPT)?;
    debug!(
        provider = client.label(),
        image = %image.file_name,
        reply = %reply,
        "raw model reply"
    );

    let raw = extract_json(&reply)?;
    Ok(validate(&raw, captured_at))
}

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::quota::config::{ConfigOverrides, load_config};
use crate::quota::inference::build_client;
use crate::quota::output::write_json_atomic;
use crate::quota::paths::resolve_paths;
use crate::quota::pipeline::{capture_time, read_quota};
use crate::quota::reading::QuotaReading;

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub image: PathBuf,
    pub output: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

/// Reads one screenshot and emits the full reading. A failed read still
/// emits the all-null shape so consumers never see a partial document.
pub fn run(opts: &ParseOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths.config_file, &opts.overrides)?;
    let client = build_client(&cfg.inference)?;
    let mut report = CommandReport::new("parse");
    report.detail(format!("image={}", opts.image.display()));
    report.detail(format!("provider={} model={}", client.label(), cfg.inference.model));

    let reading = match read_quota(client.as_ref(), &opts.image) {
        Ok(reading) => reading,
        Err(err) => {
            report.issue(format!("{}: {err}", err.code()));
            QuotaReading::empty(capture_time(&opts.image))
        }
    };
    if report.ok && !reading.has_session() {
        report.issue("session percentage could not be read");
    }

    match &opts.output {
        Some(path) => {
            write_json_atomic(path, &reading)?;
            report.detail(format!("output={}", path.display()));
        }
        None => {
            let json = serde_json::to_string_pretty(&reading)
                .context("failed to serialize quota reading")?;
            println!("{json}");
        }
    }

    Ok(report)
}

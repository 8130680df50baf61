use anyhow::Result;
use tracing::info;

use crate::commands::CommandReport;
use crate::quota::config::{ConfigOverrides, load_config};
use crate::quota::inference::build_client;
use crate::quota::paths::resolve_paths;
use crate::quota::signal::{install_stop_handlers, stop_flag};
use crate::quota::watcher::{CycleStatus, WatchCycleOutcome, WatchSettings, Watcher};

#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub once: bool,
    pub overrides: ConfigOverrides,
}

fn describe_cycle(report: &mut CommandReport, outcome: &WatchCycleOutcome) {
    report.detail(format!("cycle={}", outcome.status.label()));
    if let Some(image) = &outcome.image {
        report.detail(format!("image={image}"));
    }
    match &outcome.status {
        CycleStatus::Idle => {}
        CycleStatus::Updated(status) | CycleStatus::Unreadable(status) => {
            let pct = |v: Option<u8>| v.map_or_else(|| "null".to_string(), |v| v.to_string());
            report.detail(format!(
                "quota_used_pct={} weekly_used_pct={} valid={}",
                pct(status.quota_used_pct),
                pct(status.weekly_used_pct),
                status.valid
            ));
        }
        CycleStatus::Failed { code, message } => {
            report.issue(format!("{code}: {message}"));
        }
    }
    if matches!(outcome.status, CycleStatus::Unreadable(_)) {
        report.issue("session percentage could not be read");
    }
    if !outcome.pruned.is_empty() {
        report.detail(format!("pruned={}", outcome.pruned.join(",")));
    }
    for name in &outcome.prune_failures {
        report.detail(format!("prune_failed={name}"));
    }
    if !outcome.retained_failures.is_empty() {
        report.detail(format!("retained={}", outcome.retained_failures.join(",")));
    }
}

pub fn run(opts: &MonitorOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths.config_file, &opts.overrides)?;
    let settings = WatchSettings::from_config(&cfg.watch, &paths.status_file)?;
    let client = build_client(&cfg.inference)?;

    let mut report = CommandReport::new("monitor");
    let mut watcher = Watcher::new(settings, client);
    watcher.prepare()?;

    let settings = watcher.settings();
    report.detail(format!("quota_home={}", paths.quota_home.display()));
    report.detail(format!("config_file={}", paths.config_file.display()));
    report.detail(format!("watch_dir={}", settings.watch_dir.display()));
    report.detail(format!("pattern={}", settings.pattern.as_str()));
    report.detail(format!("status_file={}", settings.status_file.display()));
    if let Some(full) = &settings.full_output {
        report.detail(format!("full_output={}", full.display()));
    }

    if opts.once {
        let outcome = watcher.run_cycle();
        describe_cycle(&mut report, &outcome);
        return Ok(report);
    }

    install_stop_handlers()?;
    info!(
        watch_dir = %watcher.settings().watch_dir.display(),
        poll_secs = watcher.settings().poll_interval.as_secs_f64(),
        "monitoring for screenshots"
    );
    let cycles = watcher.run_until_stopped(stop_flag());
    info!(cycles, "stop requested; exiting");
    report.detail(format!("cycles={cycles}"));
    Ok(report)
}

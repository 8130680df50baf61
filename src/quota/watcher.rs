use anyhow::{Context, Result, anyhow};
use glob::Pattern;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::QuotaError;
use crate::quota::config::WatchConfig;
use crate::quota::inference::VisionClient;
use crate::quota::output::write_json_atomic;
use crate::quota::paths::expand_home;
use crate::quota::pipeline::read_quota;
use crate::quota::reading::CompactStatus;
use crate::quota::retention::prune;
use crate::quota::scan::{Candidate, list_matching, newest};
use crate::quota::state::WatchState;
use crate::quota::util::now_utc;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub watch_dir: PathBuf,
    pub pattern: Pattern,
    pub poll_interval: Duration,
    pub status_file: PathBuf,
    pub full_output: Option<PathBuf>,
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(env::current_dir()
        .context("failed to resolve current directory")?
        .join(path))
}

impl WatchSettings {
    pub fn from_config(cfg: &WatchConfig, default_status_file: &Path) -> Result<Self> {
        let watch_dir = match cfg.watch_dir.as_deref() {
            Some(dir) => absolute(expand_home(dir))?,
            None => env::current_dir().context("failed to resolve current directory")?,
        };
        let pattern = Pattern::new(&cfg.pattern)
            .with_context(|| format!("invalid watch pattern `{}`", cfg.pattern))?;
        let poll_interval = Duration::try_from_secs_f64(cfg.poll_interval_secs).map_err(|_| {
            anyhow!(
                "invalid poll interval `{}`: must be a positive number of seconds",
                cfg.poll_interval_secs
            )
        })?;
        let status_file = cfg
            .status_file
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| default_status_file.to_path_buf());

        Ok(Self {
            watch_dir,
            pattern,
            poll_interval,
            status_file,
            full_output: cfg.full_output.as_deref().map(expand_home),
        })
    }
}

#[derive(Debug, Clone)]
pub enum CycleStatus {
    /// No unprocessed screenshot in the watch directory.
    Idle,
    /// Status written with a session percentage.
    Updated(CompactStatus),
    /// Status written but the session percentage could not be read.
    Unreadable(CompactStatus),
    Failed {
        code: &'static str,
        message: String,
    },
}

impl CycleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CycleStatus::Idle => "idle",
            CycleStatus::Updated(_) => "updated",
            CycleStatus::Unreadable(_) => "unreadable",
            CycleStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CycleStatus::Unreadable(_) | CycleStatus::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct WatchCycleOutcome {
    pub image: Option<String>,
    pub status: CycleStatus,
    pub pruned: Vec<String>,
    pub prune_failures: Vec<String>,
    pub retained_failures: Vec<String>,
}

impl WatchCycleOutcome {
    fn without_image(status: CycleStatus) -> Self {
        Self {
            image: None,
            status,
            pruned: Vec::new(),
            prune_failures: Vec::new(),
            retained_failures: Vec::new(),
        }
    }
}

fn failed(err: &QuotaError) -> CycleStatus {
    CycleStatus::Failed {
        code: err.code(),
        message: err.to_string(),
    }
}

pub struct Watcher {
    settings: WatchSettings,
    client: Box<dyn VisionClient>,
    state: WatchState,
}

impl Watcher {
    pub fn new(settings: WatchSettings, client: Box<dyn VisionClient>) -> Self {
        Self {
            settings,
            client,
            state: WatchState::default(),
        }
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    /// Creates the watch directory if needed and checks it can be listed.
    pub fn prepare(&self) -> Result<()> {
        let dir = &self.settings.watch_dir;
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create watch dir {}", dir.display()))?;
        fs::read_dir(dir).with_context(|| format!("failed to read watch dir {}", dir.display()))?;
        Ok(())
    }

    pub fn run_cycle(&mut self) -> WatchCycleOutcome {
        let candidates = match list_matching(&self.settings.watch_dir, &self.settings.pattern) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(code = err.code(), error = %err, "scan failed");
                return WatchCycleOutcome::without_image(failed(&err));
            }
        };

        let present = candidates
            .iter()
            .map(|c| c.name.clone())
            .collect::<BTreeSet<_>>();
        self.state.reconcile(&present);
        debug!(
            candidates = candidates.len(),
            known_failures = self.state.failure_count(),
            "scanned watch dir"
        );

        let Some(selected) = newest(&candidates, |name| self.state.is_known_failure(name)).cloned()
        else {
            return self.prune_idle(&candidates);
        };

        let status = self.process(&selected);
        if status.is_failure() {
            self.state.record_failure(&selected.name);
        }

        let keep = self.state.retained();
        let pruned = prune(&candidates, &keep, &selected);
        for name in &pruned.deleted {
            self.state.forget(name);
        }

        WatchCycleOutcome {
            image: Some(selected.name),
            status,
            pruned: pruned.deleted,
            prune_failures: pruned.failed,
            retained_failures: keep.into_iter().collect(),
        }
    }

    /// Only known failures are left. Deletes that failed earlier are retried
    /// here so the directory settles without waiting for a new screenshot.
    fn prune_idle(&mut self, candidates: &[Candidate]) -> WatchCycleOutcome {
        let mut outcome = WatchCycleOutcome::without_image(CycleStatus::Idle);
        let Some(last) = candidates.last() else {
            return outcome;
        };

        let keep = self.state.retained();
        let pruned = prune(candidates, &keep, last);
        for name in &pruned.deleted {
            self.state.forget(name);
        }
        outcome.pruned = pruned.deleted;
        outcome.prune_failures = pruned.failed;
        outcome.retained_failures = keep.into_iter().collect();
        outcome
    }

    fn process(&self, selected: &Candidate) -> CycleStatus {
        let reading = match read_quota(self.client.as_ref(), &selected.path) {
            Ok(reading) => reading,
            Err(err) => {
                if matches!(err, QuotaError::Auth(_)) {
                    error!(image = %selected.name, code = err.code(), error = %err, "inference credential problem");
                } else {
                    warn!(image = %selected.name, code = err.code(), error = %err, "could not read screenshot");
                }
                return failed(&err);
            }
        };

        let status = CompactStatus::from_reading(&reading, selected.name.as_str(), now_utc());
        if let Err(err) = write_json_atomic(&self.settings.status_file, &status) {
            error!(code = err.code(), error = %err, "failed to write status file");
            return failed(&err);
        }
        if let Some(full_output) = &self.settings.full_output
            && let Err(err) = write_json_atomic(full_output, &reading)
        {
            error!(code = err.code(), error = %err, "failed to write full reading");
            return failed(&err);
        }

        if status.valid {
            CycleStatus::Updated(status)
        } else {
            warn!(image = %selected.name, "session percentage unreadable; keeping screenshot");
            CycleStatus::Unreadable(status)
        }
    }

    /// Runs cycles until `stop` is set. Returns the number of completed cycles.
    pub fn run_until_stopped(&mut self, stop: &AtomicBool) -> usize {
        let mut cycles = 0usize;
        while !stop.load(Ordering::SeqCst) {
            let outcome = self.run_cycle();
            cycles += 1;
            log_outcome(&outcome);
            if !sleep_unless_stopped(self.settings.poll_interval, stop) {
                break;
            }
        }
        cycles
    }
}

fn log_outcome(outcome: &WatchCycleOutcome) {
    let image = outcome.image.as_deref().unwrap_or("-");
    match &outcome.status {
        CycleStatus::Idle if !outcome.pruned.is_empty() => info!(
            pruned = ?outcome.pruned,
            "removed leftover screenshots"
        ),
        CycleStatus::Idle => {}
        CycleStatus::Updated(status) => info!(
            image,
            session_pct = ?status.quota_used_pct,
            weekly_pct = ?status.weekly_used_pct,
            pruned = outcome.pruned.len(),
            "status updated"
        ),
        other => info!(
            image,
            outcome = other.label(),
            pruned = outcome.pruned.len(),
            retained = ?outcome.retained_failures,
            "cycle finished without a usable reading"
        ),
    }
}

/// Sleeps in short slices; returns false as soon as `stop` is observed.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(STOP_POLL_INTERVAL.min(deadline - now));
    }
}

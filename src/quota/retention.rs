use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;

use crate::quota::scan::Candidate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Files to delete: every candidate not in `keep` that sorts at or before
/// `through`. Newer files arrived while the cycle ran and wait for the next one.
pub fn plan<'a>(
    candidates: &'a [Candidate],
    keep: &BTreeSet<String>,
    through: &Candidate,
) -> Vec<&'a Candidate> {
    candidates
        .iter()
        .filter(|c| *c <= through && !keep.contains(&c.name))
        .collect()
}

pub fn prune(candidates: &[Candidate], keep: &BTreeSet<String>, through: &Candidate) -> PruneOutcome {
    let mut out = PruneOutcome::default();
    for candidate in plan(candidates, keep, through) {
        match fs::remove_file(&candidate.path) {
            Ok(()) => out.deleted.push(candidate.name.clone()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(
                    file = %candidate.name,
                    error = %err,
                    "could not delete screenshot; will retry next cycle"
                );
                out.failed.push(candidate.name.clone());
            }
        }
    }
    out
}

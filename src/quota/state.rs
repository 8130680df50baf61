use indexmap::IndexSet;
use std::collections::BTreeSet;

/// Failing screenshots seen by this process, in the order they failed.
///
/// Lives only in memory. Each cycle reconciles it against the directory
/// listing so names of files that disappeared are forgotten.
#[derive(Debug, Clone, Default)]
pub struct WatchState {
    failures: IndexSet<String>,
}

impl WatchState {
    pub fn record_failure(&mut self, name: &str) {
        self.failures.insert(name.to_string());
    }

    pub fn is_known_failure(&self, name: &str) -> bool {
        self.failures.contains(name)
    }

    pub fn reconcile(&mut self, present: &BTreeSet<String>) {
        self.failures.retain(|name| present.contains(name));
    }

    pub fn forget(&mut self, name: &str) {
        self.failures.shift_remove(name);
    }

    /// The earliest- and latest-seen failures; the only files retention keeps.
    pub fn retained(&self) -> BTreeSet<String> {
        self.failures
            .first()
            .into_iter()
            .chain(self.failures.last())
            .cloned()
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::WatchState;
    use std::collections::BTreeSet;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn retained_keeps_first_and_last_failure() {
        let mut state = WatchState::default();
        assert!(state.retained().is_empty());

        state.record_failure("a.png");
        assert_eq!(state.retained(), set(&["a.png"]));

        state.record_failure("b.png");
        state.record_failure("c.png");
        assert_eq!(state.retained(), set(&["a.png", "c.png"]));
        assert_eq!(state.failure_count(), 3);
    }

    #[test]
    fn reconcile_forgets_files_that_vanished() {
        let mut state = WatchState::default();
        state.record_failure("a.png");
        state.record_failure("b.png");
        state.record_failure("c.png");

        state.reconcile(&set(&["b.png", "c.png"]));
        assert!(!state.is_known_failure("a.png"));
        assert_eq!(state.retained(), set(&["b.png", "c.png"]));
    }

    #[test]
    fn forget_keeps_insertion_order() {
        let mut state = WatchState::default();
        state.record_failure("a.png");
        state.record_failure("b.png");
        state.record_failure("c.png");
        state.forget("b.png");
        assert_eq!(state.retained(), set(&["a.png", "c.png"]));
        assert_eq!(state.failure_count(), 2);
    }
}

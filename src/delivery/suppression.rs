//! Duplicate-delivery suppression.
//!
//! [`SuppressionTable`] remembers when each `(hash, target)` pair was last
//! attempted. A repeat attempt inside [`SUPPRESSION_WINDOW`] is skipped.
//! The lock is only held for the map access, so two requests racing in the
//! same instant can both pass the gate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};

use tracing::debug;

/// How long a recorded attempt suppresses repeats.
pub const SUPPRESSION_WINDOW: Duration = Duration::from_secs(30);

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Source of the current instant, injectable for tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds the suppression key for a hash and resolved target.
#[must_use]
pub fn suppression_key(hash: &str, target: &str) -> String {
    format!("{hash}:{target}")
}

/// Process-local table of recent delivery attempts.
pub struct SuppressionTable {
    entries: RwLock<HashMap<String, Instant>>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SuppressionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressionTable")
            .field("entries", &self.len())
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl Default for SuppressionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SuppressionTable {
    /// Creates a table on the system clock with the default window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a table on an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            window: SUPPRESSION_WINDOW,
            clock,
        }
    }

    /// Returns true and leaves the table untouched if `key` was attempted
    /// within the window; otherwise records now under `key` and returns false.
    pub fn check_and_record(&self, key: &str) -> bool {
        let now = self.clock.now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(last) = entries.get(key)
                && now.saturating_duration_since(*last) < self.window
            {
                debug!(key, "suppressing duplicate delivery");
                return true;
            }
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), now);
        false
    }

    /// Removes entries older than twice the window. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let max_age = self.window * 2;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, last| now.saturating_duration_since(*last) <= max_age);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "swept suppression table");
        }
        removed
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns the periodic sweep on the current tokio runtime.
    ///
    /// The task holds a weak reference and exits once the table is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let table: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(table) = table.upgrade() else {
                    break;
                };
                table.sweep();
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table() -> (Arc<ManualClock>, SuppressionTable) {
        let clock = Arc::new(ManualClock::new());
        let table = SuppressionTable::with_clock(clock.clone());
        (clock, table)
    }

    #[test]
    fn test_first_attempt_passes_and_records() {
        let (_clock, table) = table();
        assert!(!table.check_and_record("h:a@kindle.com"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_repeat_within_window_is_suppressed() {
        let (clock, table) = table();
        assert!(!table.check_and_record("h:"));
        clock.advance(Duration::from_secs(29));
        assert!(table.check_and_record("h:"));
    }

    #[test]
    fn test_repeat_after_window_passes_again() {
        let (clock, table) = table();
        assert!(!table.check_and_record("h:"));
        clock.advance(SUPPRESSION_WINDOW);
        assert!(!table.check_and_record("h:"));
        clock.advance(Duration::from_secs(1));
        assert!(table.check_and_record("h:"));
    }

    #[test]
    fn test_suppressed_attempt_does_not_refresh_timestamp() {
        let (clock, table) = table();
        assert!(!table.check_and_record("k"));
        clock.advance(Duration::from_secs(20));
        assert!(table.check_and_record("k"));
        clock.advance(Duration::from_secs(11));
        assert!(!table.check_and_record("k"));
    }

    #[test]
    fn test_different_targets_are_independent() {
        let (_clock, table) = table();
        assert!(!table.check_and_record(&suppression_key("h", "a@kindle.com")));
        assert!(!table.check_and_record(&suppression_key("h", "b@kindle.com")));
        assert!(!table.check_and_record(&suppression_key("h", "")));
        assert!(table.check_and_record(&suppression_key("h", "a@kindle.com")));
    }

    #[test]
    fn test_sweep_removes_only_stale_entries() {
        let (clock, table) = table();
        table.check_and_record("old");
        clock.advance(SUPPRESSION_WINDOW * 2 + Duration::from_secs(1));
        table.check_and_record("fresh");
        assert_eq!(table.sweep(), 1);
        assert_eq!(table.len(), 1);
        assert!(table.check_and_record("fresh"));
    }
}

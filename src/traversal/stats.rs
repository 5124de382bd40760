//! Per-run counters.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why traversal stopped. Both are normal termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HaltReason {
    /// The sample reached the target count.
    TargetReached,
    /// Every listed prefix and object was visited.
    Exhausted,
}

/// What one traversal did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalStats {
    pub pages_listed: usize,
    pub prefixes_visited: usize,
    /// Objects seen in listings, whether or not they were fetched.
    pub objects_seen: usize,
    /// Objects skipped for not carrying the record extension.
    pub objects_skipped: usize,
    pub objects_fetched: usize,
    pub parse_failures: usize,
    /// Objects listed but gone by the time they were fetched.
    pub missing_objects: usize,
    pub rejected: usize,
    pub accepted: usize,
    pub halt_reason: Option<HaltReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for TraversalStats {
    fn default() -> Self {
        Self {
            pages_listed: 0,
            prefixes_visited: 0,
            objects_seen: 0,
            objects_skipped: 0,
            objects_fetched: 0,
            parse_failures: 0,
            missing_objects: 0,
            rejected: 0,
            accepted: 0,
            halt_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

impl TraversalStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_reached(&self) -> bool {
        self.halt_reason == Some(HaltReason::TargetReached)
    }

    pub(crate) fn finish(&mut self, reason: HaltReason) {
        self.halt_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock run time in milliseconds, once finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

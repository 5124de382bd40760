//! Per-field record of values already observed.

use std::collections::{HashMap, HashSet};

use super::canonical::CanonicalValue;

/// Grows monotonically for the lifetime of one run; values are never removed.
#[derive(Debug, Default)]
pub struct NoveltyTracker {
    seen: HashMap<String, HashSet<CanonicalValue>>,
}

impl NoveltyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time `(field, value)` is observed and records it.
    pub fn is_novel(&mut self, field: &str, value: CanonicalValue) -> bool {
        match self.seen.get_mut(field) {
            Some(values) => values.insert(value),
            None => {
                self.seen.insert(field.to_string(), HashSet::from([value]));
                true
            }
        }
    }

    pub fn has_seen(&self, field: &str, value: &CanonicalValue) -> bool {
        self.seen.get(field).is_some_and(|values| values.contains(value))
    }

    /// Number of distinct values recorded for `field`.
    pub fn distinct_values(&self, field: &str) -> usize {
        self.seen.get(field).map_or(0, HashSet::len)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.seen.keys().map(String::as_str)
    }
}

//! Accept/reject decision for one extracted record.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::canonical::{canonicalize, SequencePolicy};
use super::novelty::NoveltyTracker;
use crate::metadata::MetadataRecord;

/// Which records enter the sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Accept records contributing at least one unseen field value.
    #[default]
    Diverse,
    /// Accept every well-formed record.
    First,
}

/// Novelty-based diversity filter.
///
/// A record is diverse when any of its fields canonicalizes to a value not
/// yet seen for that field name. Every field is registered, whether or not
/// the record is accepted.
#[derive(Debug)]
pub struct DiversityFilter {
    tracker: NoveltyTracker,
    sequence_policy: SequencePolicy,
    selection: SelectionPolicy,
    excluded_fields: Vec<String>,
}

impl Default for DiversityFilter {
    fn default() -> Self {
        Self::new(SequencePolicy::default(), SelectionPolicy::default())
    }
}

impl DiversityFilter {
    /// Creates a filter that checks every field.
    pub fn new(sequence_policy: SequencePolicy, selection: SelectionPolicy) -> Self {
        Self {
            tracker: NoveltyTracker::new(),
            sequence_policy,
            selection,
            excluded_fields: Vec::new(),
        }
    }

    /// Replaces the set of fields left out of the novelty check.
    pub fn with_excluded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// True iff at least one field of `record` is novel. All fields not
    /// excluded are registered with the tracker; there is no short-circuit.
    pub fn is_diverse(&mut self, record: &MetadataRecord) -> bool {
        let mut diverse = false;
        for (field, value) in record.iter() {
            if self.excluded_fields.iter().any(|f| f == field) {
                continue;
            }
            let novel = self
                .tracker
                .is_novel(field, canonicalize(value, self.sequence_policy));
            trace!(field, novel, "Novelty check");
            diverse |= novel;
        }
        diverse
    }

    /// Applies the selection policy to `record`.
    pub fn admit(&mut self, record: &MetadataRecord) -> bool {
        match self.selection {
            SelectionPolicy::Diverse => self.is_diverse(record),
            SelectionPolicy::First => true,
        }
    }

    pub fn tracker(&self) -> &NoveltyTracker {
        &self.tracker
    }

    pub fn selection(&self) -> SelectionPolicy {
        self.selection
    }

    pub fn excluded_fields(&self) -> &[String] {
        &self.excluded_fields
    }
}

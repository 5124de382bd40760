//! Diversity selection for sampled records.
//!
//! Three pieces, leaves first:
//!
//! 1. **Canonicalization** - turns a [`FieldValue`](crate::metadata::FieldValue)
//!    into a hashable [`CanonicalValue`]
//! 2. **Novelty tracking** - remembers, per field name, every canonical value
//!    observed during a run
//! 3. **Decision** - a record is diverse when at least one of its fields is
//!    novel
//!
//! # Usage
//!
//! ```rust
//! use idc_sampler::diversity::DiversityFilter;
//! use idc_sampler::metadata::{FieldValue, MetadataRecord};
//!
//! let mut filter = DiversityFilter::default();
//! let mut record = MetadataRecord::new();
//! record.insert("Modality", FieldValue::text("CT"));
//!
//! assert!(filter.is_diverse(&record));
//! assert!(!filter.is_diverse(&record));
//! ```

pub mod canonical;
pub mod decision;
pub mod novelty;

pub use canonical::{canonicalize, CanonicalValue, Scalar, SequencePolicy};
pub use decision::{DiversityFilter, SelectionPolicy};
pub use novelty::NoveltyTracker;

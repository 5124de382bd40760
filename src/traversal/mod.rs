//! Depth-first traversal of an object namespace.
//!
//! The driver keeps an explicit stack of prefix frames instead of recursing,
//! so namespace depth never grows the call stack. Each frame holds the
//! unvisited entries of its current listing page and the continuation token
//! for the next one. A single accepted count spans every frame: once it
//! reaches the target, the remaining stack is dropped unvisited.
//!
//! With `random_prefix` set, each start prefix is first replaced by one of
//! its sub-prefixes, chosen with a ChaCha8 RNG (seeded when `seed` is set).
//!
//! Per object the driver fetches bytes, extracts a record and asks the
//! diversity filter whether to keep it. Missing objects and unreadable
//! records are logged and skipped; any other store failure ends the run.

mod stats;

use std::collections::VecDeque;

use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use crate::config::SamplerConfig;
use crate::dicom::{DicomReader, RecordParser};
use crate::diversity::DiversityFilter;
use crate::error::{SamplerError, StoreError};
use crate::export::{CsvExporter, ExportSummary};
use crate::metadata::{MetadataRecord, RecordExtractor};
use crate::store::{list_prefixes, ObjectEntry, ObjectStore, PageEntry};

pub use stats::{HaltReason, TraversalStats};

/// Where the driver currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    /// Not started.
    Idle,
    Listing(String),
    ProcessingObject(String),
    Recursing(String),
    Halted(HaltReason),
}

/// Accepted records plus what it took to find them.
#[derive(Debug, Clone)]
pub struct SampleRun {
    pub records: Vec<MetadataRecord>,
    /// Object key of each accepted record, index-aligned with `records`.
    pub keys: Vec<String>,
    /// Prefixes the run actually started from.
    pub start_prefixes: Vec<String>,
    pub stats: TraversalStats,
}

impl SampleRun {
    /// Accepted records paired with the key they were read from.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataRecord)> {
        self.keys.iter().map(String::as_str).zip(self.records.iter())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Visit {
    Continue,
    Halt,
}

/// One prefix level on the work stack.
#[derive(Debug)]
struct Frame {
    prefix: String,
    token: Option<String>,
    pending: VecDeque<PageEntry>,
    /// No further pages to list for this prefix.
    exhausted: bool,
}

impl Frame {
    fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            token: None,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }
}

/// Bounded diverse sampler over an [`ObjectStore`].
///
/// The novelty state lives as long as the `Sampler`: a second
/// [`Sampler::run`] on the same value only accepts records that are new
/// relative to every earlier run.
pub struct Sampler<P: RecordParser = DicomReader> {
    extractor: RecordExtractor<P>,
    filter: DiversityFilter,
    target_count: usize,
    extension: String,
    prefixes: Vec<String>,
    rng: Option<ChaCha8Rng>,
    state: DriverState,
}

impl Sampler<DicomReader> {
    pub fn new(config: &SamplerConfig) -> Self {
        Self::with_parser(DicomReader::new(), config)
    }
}

impl<P: RecordParser> Sampler<P> {
    /// Builds a sampler that parses objects with `parser`.
    pub fn with_parser(parser: P, config: &SamplerConfig) -> Self {
        let rng = config.random_prefix.then(|| match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        });
        Self {
            extractor: RecordExtractor::with_parser(parser, config.profile),
            filter: DiversityFilter::new(config.sequence_policy, config.selection)
                .with_excluded_fields(config.excluded_fields.iter().cloned()),
            target_count: config.target_count,
            extension: config.extension.clone(),
            prefixes: config.prefixes.clone(),
            rng,
            state: DriverState::Idle,
        }
    }

    pub fn filter(&self) -> &DiversityFilter {
        &self.filter
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    fn transition(&mut self, state: DriverState) {
        trace!(?state, "Driver state");
        self.state = state;
    }

    /// Walks the start prefixes in order until the target is reached or
    /// the namespace is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] that is not a missing object.
    pub async fn run(&mut self, store: &dyn ObjectStore) -> Result<SampleRun, StoreError> {
        let start_prefixes = self.start_prefixes(store).await?;
        let mut sample = SampleRun {
            records: Vec::new(),
            keys: Vec::new(),
            start_prefixes,
            stats: TraversalStats::new(),
        };

        info!(
            store = %store.describe(),
            target = self.target_count,
            prefixes = ?sample.start_prefixes,
            profile = ?self.extractor.profile(),
            selection = ?self.filter.selection(),
            "Starting sample run"
        );

        let mut stack: Vec<Frame> = sample
            .start_prefixes
            .iter()
            .rev()
            .map(Frame::new)
            .collect();
        let mut reason = HaltReason::Exhausted;

        while let Some(frame) = stack.last_mut() {
            if let Some(entry) = frame.pending.pop_front() {
                match entry {
                    PageEntry::Prefix(prefix) => {
                        self.transition(DriverState::Recursing(prefix.clone()));
                        stack.push(Frame::new(prefix));
                    }
                    PageEntry::Object(object) => {
                        let visit = self.visit_object(store, &object, &mut sample).await?;
                        if visit == Visit::Halt {
                            reason = HaltReason::TargetReached;
                            break;
                        }
                    }
                }
                continue;
            }

            if frame.exhausted {
                stack.pop();
                continue;
            }

            let prefix = frame.prefix.clone();
            let token = frame.token.take();
            if token.is_none() {
                sample.stats.prefixes_visited += 1;
            }
            self.transition(DriverState::Listing(prefix.clone()));

            let listing = store.list_page(&prefix, token.as_deref()).await?;
            sample.stats.pages_listed += 1;
            debug!(
                prefix = %prefix,
                objects = listing.objects.len(),
                prefixes = listing.prefixes.len(),
                more = listing.next_token.is_some(),
                "Listed page"
            );

            frame.exhausted = listing.next_token.is_none();
            frame.token = listing.next_token.clone();
            frame.pending.extend(listing.into_entries());
        }

        self.transition(DriverState::Halted(reason));
        sample.stats.finish(reason);
        info!(
            accepted = sample.stats.accepted,
            objects_seen = sample.stats.objects_seen,
            parse_failures = sample.stats.parse_failures,
            halt = ?reason,
            "Sample run finished"
        );

        Ok(sample)
    }

    /// Configured prefixes, each swapped for a random sub-prefix when the
    /// sampler has an RNG. A prefix without sub-prefixes is kept as is.
    async fn start_prefixes(&mut self, store: &dyn ObjectStore) -> Result<Vec<String>, StoreError> {
        let Some(rng) = self.rng.as_mut() else {
            return Ok(self.prefixes.clone());
        };
        let mut chosen = Vec::with_capacity(self.prefixes.len());
        for prefix in &self.prefixes {
            let children = list_prefixes(store, prefix).await?;
            match children.choose(rng) {
                Some(child) => {
                    info!(
                        parent = %prefix,
                        prefix = %child,
                        candidates = children.len(),
                        "Chose random start prefix"
                    );
                    chosen.push(child.clone());
                }
                None => {
                    warn!(prefix = %prefix, "No sub-prefixes to choose from; using the prefix itself");
                    chosen.push(prefix.clone());
                }
            }
        }
        Ok(chosen)
    }

    async fn visit_object(
        &mut self,
        store: &dyn ObjectStore,
        object: &ObjectEntry,
        sample: &mut SampleRun,
    ) -> Result<Visit, StoreError> {
        let key = object.key.as_str();
        let stats = &mut sample.stats;
        stats.objects_seen += 1;

        if !key.ends_with(&self.extension) {
            stats.objects_skipped += 1;
            trace!(key, "Skipping object without record extension");
            return Ok(Visit::Continue);
        }

        self.transition(DriverState::ProcessingObject(key.to_string()));
        debug!(key, "Processing object");

        let bytes = match store.get_object_bytes(key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                warn!(key, "Object vanished before fetch; skipping");
                stats.missing_objects += 1;
                return Ok(Visit::Continue);
            }
            Err(e) => return Err(e),
        };
        stats.objects_fetched += 1;

        let record = match self.extractor.extract(&bytes, key) {
            Ok(record) => record,
            Err(failure) => {
                warn!(key, error = %failure.source, "Skipping unreadable object");
                stats.parse_failures += 1;
                return Ok(Visit::Continue);
            }
        };

        if !self.filter.admit(&record) {
            debug!(key, "Record adds no new field values");
            stats.rejected += 1;
            return Ok(Visit::Continue);
        }

        sample.records.push(record);
        sample.keys.push(key.to_string());
        sample.stats.accepted = sample.records.len();
        info!(key, accepted = sample.stats.accepted, "Accepted record");

        if sample.records.len() >= self.target_count {
            Ok(Visit::Halt)
        } else {
            Ok(Visit::Continue)
        }
    }
}

/// Result of [`sample_to_csv`].
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub run: SampleRun,
    /// `None` when the sample was empty and nothing was written.
    pub export: Option<ExportSummary>,
}

/// Runs one sampling pass over `store` and writes the sample to
/// `config.output_path`. Export happens once, after traversal halts.
pub async fn sample_to_csv(
    config: &SamplerConfig,
    store: &dyn ObjectStore,
) -> Result<SampleReport, SamplerError> {
    config.validate()?;
    let run = Sampler::new(config).run(store).await?;
    let export = CsvExporter::new(&config.output_path, config.header_policy).export(&run.records)?;
    Ok(SampleReport { run, export })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::{DicomFileBuilder, Tag, Vr};
    use crate::diversity::SelectionPolicy;
    use crate::metadata::{ExtractionProfile, FieldValue};
    use crate::store::MemoryStore;

    fn dicom(modality: &str, manufacturer: &str) -> Vec<u8> {
        DicomFileBuilder::new()
            .text("Modality", modality)
            .text("Manufacturer", manufacturer)
            .texts("ImageType", &["ORIGINAL", "PRIMARY"])
            .build()
            .unwrap()
    }

    fn config(target: usize) -> SamplerConfig {
        SamplerConfig::default()
            .with_target_count(target)
            .with_profile(ExtractionProfile::Basic)
    }

    fn modalities(run: &SampleRun) -> Vec<String> {
        run.records
            .iter()
            .map(|r| r.get("Modality").map(FieldValue::to_string).unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn test_halts_at_target() {
        let mut store = MemoryStore::new();
        for i in 0..8 {
            store.insert(format!("series/{i}.dcm"), dicom(&format!("M{i}"), "GE"));
        }

        let run = Sampler::new(&config(3)).run(&store).await.unwrap();
        assert_eq!(run.records.len(), 3);
        assert_eq!(modalities(&run), vec!["M0", "M1", "M2"]);
        assert_eq!(store.fetched().len(), 3);
        assert_eq!(run.stats.halt_reason, Some(HaltReason::TargetReached));
    }

    #[tokio::test]
    async fn test_bound_is_global_across_prefixes() {
        let mut store = MemoryStore::new();
        for i in 0..5 {
            store.insert(format!("a/{i}.dcm"), dicom(&format!("A{i}"), "GE"));
            store.insert(format!("b/{i}.dcm"), dicom(&format!("B{i}"), "GE"));
        }

        let run = Sampler::new(&config(5)).run(&store).await.unwrap();
        assert_eq!(run.records.len(), 5);
        assert!(store.fetched().iter().all(|k| k.starts_with("a/")));
    }

    #[tokio::test]
    async fn test_skips_unparseable_object() {
        let store = MemoryStore::new()
            .with_object("s/0.dcm", dicom("CT", "GE"))
            .with_object("s/1.dcm", b"garbage bytes".to_vec())
            .with_object("s/2.dcm", dicom("MR", "GE"))
            .with_object("s/3.dcm", dicom("PT", "GE"))
            .with_object("s/4.dcm", dicom("US", "GE"));

        let run = Sampler::new(&config(4)).run(&store).await.unwrap();
        assert_eq!(modalities(&run), vec!["CT", "MR", "PT", "US"]);
        assert_eq!(run.stats.parse_failures, 1);
        assert!(run.stats.target_reached());
    }

    #[tokio::test]
    async fn test_duplicates_rejected_and_namespace_exhausted() {
        let store = MemoryStore::new()
            .with_object("0.dcm", dicom("CT", "GE"))
            .with_object("1.dcm", dicom("CT", "GE"))
            .with_object("2.dcm", dicom("CT", "Siemens"));

        let run = Sampler::new(&config(5)).run(&store).await.unwrap();
        assert_eq!(run.records.len(), 2);
        assert_eq!(run.stats.rejected, 1);
        assert_eq!(run.stats.halt_reason, Some(HaltReason::Exhausted));
    }

    #[tokio::test]
    async fn test_first_selection_keeps_duplicates() {
        let store = MemoryStore::new()
            .with_object("0.dcm", dicom("CT", "GE"))
            .with_object("1.dcm", dicom("CT", "GE"));

        let config = config(5).with_selection(SelectionPolicy::First);
        let run = Sampler::new(&config).run(&store).await.unwrap();
        assert_eq!(run.records.len(), 2);
    }

    #[tokio::test]
    async fn test_multi_page_listing() {
        let mut store = MemoryStore::new().with_page_size(2);
        for i in 0..5 {
            store.insert(format!("p/{i}.dcm"), dicom(&format!("M{i}"), "GE"));
        }

        let run = Sampler::new(&config(10)).run(&store).await.unwrap();
        assert_eq!(run.records.len(), 5);
        // root page + three pages under p/
        assert_eq!(run.stats.pages_listed, 4);
        assert_eq!(run.stats.prefixes_visited, 2);
    }

    #[tokio::test]
    async fn test_missing_object_and_extension_filter() {
        let store = MemoryStore::new()
            .with_missing("x/0.dcm")
            .with_object("x/1.dcm", dicom("CT", "GE"))
            .with_object("x/notes.txt", b"hello".to_vec());

        let run = Sampler::new(&config(5)).run(&store).await.unwrap();
        assert_eq!(run.records.len(), 1);
        assert_eq!(run.stats.missing_objects, 1);
        assert_eq!(run.stats.objects_skipped, 1);
        assert!(!store.fetched().contains(&"x/notes.txt".to_string()));
    }

    #[tokio::test]
    async fn test_depth_first_order() {
        let store = MemoryStore::new()
            .with_object("a/deep/0.dcm", dicom("A", "GE"))
            .with_object("a/z.dcm", dicom("B", "GE"))
            .with_object("b/0.dcm", dicom("C", "GE"));

        let run = Sampler::new(&config(5)).run(&store).await.unwrap();
        assert_eq!(
            store.fetched(),
            vec!["a/z.dcm", "a/deep/0.dcm", "b/0.dcm"]
        );
        assert_eq!(run.records.len(), 3);
    }

    #[tokio::test]
    async fn test_halt_stops_page_listing() {
        let mut store = MemoryStore::new().with_page_size(2);
        for i in 0..6 {
            store.insert(format!("p/{i}.dcm"), dicom(&format!("M{i}"), "GE"));
        }

        let run = Sampler::new(&config(2)).run(&store).await.unwrap();
        // root page, then the first page under p/; the two pages after it are never listed
        assert_eq!(run.stats.pages_listed, 2);
        assert_eq!(store.fetched(), vec!["p/0.dcm", "p/1.dcm"]);
        assert!(run.stats.target_reached());
    }

    #[tokio::test]
    async fn test_state_and_novelty_span_runs() {
        let store = MemoryStore::new()
            .with_object("0.dcm", dicom("CT", "GE"))
            .with_object("1.dcm", dicom("MR", "GE"));
        let mut sampler = Sampler::new(&config(1));
        assert_eq!(sampler.state(), &DriverState::Idle);

        let first = sampler.run(&store).await.unwrap();
        assert_eq!(modalities(&first), vec!["CT"]);
        assert_eq!(
            sampler.state(),
            &DriverState::Halted(HaltReason::TargetReached)
        );

        // 0.dcm adds nothing the first run has not seen.
        let second = sampler.run(&store).await.unwrap();
        assert_eq!(modalities(&second), vec!["MR"]);
        assert_eq!(second.stats.rejected, 1);
        assert_eq!(sampler.filter().tracker().distinct_values("Modality"), 2);
    }

    #[tokio::test]
    async fn test_exhausted_state() {
        let store = MemoryStore::new().with_object("0.dcm", dicom("CT", "GE"));
        let mut sampler = Sampler::new(&config(5));
        sampler.run(&store).await.unwrap();
        assert_eq!(sampler.state(), &DriverState::Halted(HaltReason::Exhausted));
    }

    #[tokio::test]
    async fn test_source_key_makes_identical_objects_novel() {
        let bytes = DicomFileBuilder::new()
            .text("Modality", "CT")
            .text("PatientID", "TCGA-01")
            .build()
            .unwrap();
        let store = MemoryStore::new()
            .with_object("a.dcm", bytes.clone())
            .with_object("b.dcm", bytes);

        let run = Sampler::new(&SamplerConfig::default()).run(&store).await.unwrap();
        assert_eq!(run.keys, vec!["a.dcm", "b.dcm"]);

        let config = SamplerConfig::default().with_excluded_fields(["S3Key"]);
        let run = Sampler::new(&config).run(&store).await.unwrap();
        assert_eq!(run.keys, vec!["a.dcm"]);
        assert_eq!(run.stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_random_prefix_is_reproducible_with_seed() {
        let collections = ["cptac_ccrcc/", "lidc_idri/", "nlst/", "tcga_kirc/"];
        let mut store = MemoryStore::new();
        for collection in collections {
            for i in 0..3 {
                store.insert(
                    format!("{collection}{i}.dcm"),
                    dicom(&format!("{collection}{i}"), "GE"),
                );
            }
        }

        let config = config(10).with_random_prefix(Some(7));
        let first = Sampler::new(&config).run(&store).await.unwrap();
        let again = Sampler::new(&config).run(&store).await.unwrap();

        assert_eq!(first.start_prefixes.len(), 1);
        assert_eq!(first.start_prefixes, again.start_prefixes);
        let chosen = first.start_prefixes[0].as_str();
        assert!(collections.contains(&chosen));
        assert_eq!(first.records.len(), 3);
        assert!(first.keys.iter().all(|k| k.starts_with(chosen)));
    }

    #[tokio::test]
    async fn test_random_prefix_without_children_keeps_prefix() {
        let store = MemoryStore::new()
            .with_object("0.dcm", dicom("CT", "GE"))
            .with_object("1.dcm", dicom("MR", "GE"));

        let config = config(5).with_random_prefix(None);
        let run = Sampler::new(&config).run(&store).await.unwrap();
        assert_eq!(run.start_prefixes, vec![String::new()]);
        assert_eq!(run.records.len(), 2);
    }

    #[tokio::test]
    async fn test_latin1_values_stay_distinct() {
        let latin1 = |manufacturer: &[u8]| {
            DicomFileBuilder::new()
                .text("SpecificCharacterSet", "ISO_IR 100")
                .text("Modality", "CT")
                .raw(Tag(0x0008, 0x0070), Vr::LO, manufacturer.to_vec())
                .build()
                .unwrap()
        };
        let store = MemoryStore::new()
            .with_object("0.dcm", latin1(b"Si\xE9n"))
            .with_object("1.dcm", latin1(b"Si\xEDn"));

        let run = Sampler::new(&config(5)).run(&store).await.unwrap();
        assert_eq!(run.records.len(), 2);
        assert_eq!(
            run.records[1].get("Manufacturer"),
            Some(&FieldValue::text("Si\u{ed}n"))
        );
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl ObjectStore for FailingStore {
        async fn list_page(
            &self,
            prefix: &str,
            _token: Option<&str>,
        ) -> Result<crate::store::ObjectListing, StoreError> {
            Err(StoreError::Http {
                status: 403,
                target: prefix.to_string(),
                message: "AccessDenied".to_string(),
            })
        }

        async fn get_object_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::NotFound(key.to_string()))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[tokio::test]
    async fn test_access_error_is_fatal() {
        let err = Sampler::new(&config(5)).run(&FailingStore).await.unwrap_err();
        assert!(matches!(err, StoreError::Http { status: 403, .. }));
    }
}

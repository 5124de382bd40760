//! idc-sampler: diverse DICOM metadata sampling from object stores.
//!
//! Walks a hierarchical, paginated object store depth-first, extracts
//! metadata from each DICOM object and keeps records that contribute at
//! least one previously unseen field value, stopping once a target count
//! is reached. The sample is exported as CSV.
//!
//! ```rust,no_run
//! use idc_sampler::store::S3Store;
//! use idc_sampler::{sample_to_csv, SamplerConfig};
//!
//! # async fn example() -> Result<(), idc_sampler::SamplerError> {
//! let config = SamplerConfig::default().with_prefixes(["cptac_ccrcc/"]);
//! let store = S3Store::new(config.s3.clone());
//! let report = sample_to_csv(&config, &store).await?;
//! println!("accepted {}", report.run.records.len());
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod cli;
pub mod config;
pub mod dicom;
pub mod diversity;
pub mod error;
pub mod export;
pub mod metadata;
pub mod store;
pub mod traversal;

// Re-export commonly used types
pub use config::{ConfigError, SamplerConfig};
pub use error::{DicomParseError, ExportError, ExtractionFailure, SamplerError, StoreError};
pub use traversal::{sample_to_csv, SampleReport, SampleRun, Sampler};

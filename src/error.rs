//! Error types for idc-sampler operations.
//!
//! Defines error types for the major subsystems:
//! - Object-store listing and fetching
//! - DICOM Part-10 parsing
//! - Per-record metadata extraction
//! - CSV export
//! - Run-level failures surfaced by the traversal driver

use thiserror::Error;

/// Errors that can occur while talking to an object store.
///
/// Only [`StoreError::NotFound`] is recoverable during a run: it means the
/// object disappeared between listing and fetching. Everything else is an
/// access failure and aborts the traversal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object '{0}' does not exist")]
    NotFound(String),

    #[error("Store returned HTTP {status} for '{target}': {message}")]
    Http {
        status: u16,
        target: String,
        message: String,
    },

    #[error("Store request failed: {0}")]
    Transport(String),

    #[error("Failed to decode listing response: {0}")]
    Decode(String),

    #[error("Invalid continuation token '{0}'")]
    InvalidToken(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns true when the error only concerns one missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// Errors raised by the DICOM reader.
#[derive(Debug, Error)]
pub enum DicomParseError {
    #[error("Missing DICM magic marker after the preamble")]
    MissingMagic,

    #[error("Unexpected end of data at offset {offset} (needed {needed} more bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("Invalid value representation {vr:?} for tag {tag}")]
    InvalidVr { tag: String, vr: [u8; 2] },

    #[error("Unsupported transfer syntax '{0}'")]
    UnsupportedTransferSyntax(String),

    #[error("Malformed element {tag}: {reason}")]
    Malformed { tag: String, reason: String },

    #[error("Failed to inflate deflated dataset: {0}")]
    Inflate(#[from] std::io::Error),
}

/// A single object that could not be turned into a metadata record.
///
/// Recoverable: the traversal logs it and moves on to the next object.
#[derive(Debug, Error)]
#[error("Failed to extract metadata from '{key}': {source}")]
pub struct ExtractionFailure {
    pub key: String,
    #[source]
    pub source: DicomParseError,
}

/// Errors that can occur while writing the sample to disk.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run-level failures: anything that stops a sampling run.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("Object store access failed: {0}")]
    Store(#[from] StoreError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

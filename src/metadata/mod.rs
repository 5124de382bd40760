//! Metadata records and their extraction from raw objects.
//!
//! [`RecordExtractor`] wraps a [`crate::dicom::RecordParser`] and produces
//! a flat, insertion-ordered [`MetadataRecord`] for one object. The field
//! set depends on the [`ExtractionProfile`].

mod extractor;
mod record;
mod value;

pub use extractor::{
    derive_collection_name, validate_study_date, ExtractionProfile, RecordExtractor, BASE_FIELDS,
    OPTIONAL_FIELDS, SOURCE_KEY_FIELD,
};
pub use record::MetadataRecord;
pub use value::{FieldValue, UNKNOWN};

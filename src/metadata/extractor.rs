//! Record extraction: parsed DICOM attributes to a flat metadata record.

use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::record::MetadataRecord;
use super::value::FieldValue;
use crate::dicom::{DicomReader, FieldMap, RecordParser};
use crate::error::ExtractionFailure;

/// Field holding the object key the record was read from.
pub const SOURCE_KEY_FIELD: &str = "S3Key";

/// Fields every record carries; missing ones become `Unknown`.
pub const BASE_FIELDS: &[&str] = &[
    "Modality",
    "StudyDescription",
    "SeriesDescription",
    "Manufacturer",
    "ImageType",
];

/// Fields included only when present in the source.
pub const OPTIONAL_FIELDS: &[&str] = &["PathologyNumber", "ImageComments"];

/// Which field set the extractor produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionProfile {
    /// Base descriptive fields plus optional fields.
    Basic,
    /// Source key, base fields, patient/collection/study derivations and
    /// series/instance details.
    #[default]
    Enriched,
}

/// Turns raw object bytes into a [`MetadataRecord`].
pub struct RecordExtractor<P: RecordParser = DicomReader> {
    parser: P,
    profile: ExtractionProfile,
}

impl RecordExtractor<DicomReader> {
    pub fn new(profile: ExtractionProfile) -> Self {
        Self::with_parser(DicomReader::new(), profile)
    }
}

impl<P: RecordParser> RecordExtractor<P> {
    pub fn with_parser(parser: P, profile: ExtractionProfile) -> Self {
        Self { parser, profile }
    }

    pub fn profile(&self) -> ExtractionProfile {
        self.profile
    }

    /// Parses `bytes` and lays out the profile's fields.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Raw object contents
    /// * `key` - Object key, carried into failures and the `S3Key` field
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionFailure`] when the parser rejects the bytes.
    pub fn extract(&self, bytes: &[u8], key: &str) -> Result<MetadataRecord, ExtractionFailure> {
        let mut fields = self.parser.parse(bytes).map_err(|source| ExtractionFailure {
            key: key.to_string(),
            source,
        })?;
        Ok(self.layout(&mut fields, key))
    }

    fn layout(&self, fields: &mut FieldMap, key: &str) -> MetadataRecord {
        let mut record = MetadataRecord::new();

        if self.profile == ExtractionProfile::Enriched {
            record.insert(SOURCE_KEY_FIELD, FieldValue::text(key));
        }

        for name in BASE_FIELDS {
            let value = match fields.remove(*name) {
                Some(value) => value,
                None if *name == "ImageType" => FieldValue::List(vec![FieldValue::Unknown]),
                None => FieldValue::Unknown,
            };
            record.insert(*name, value);
        }

        if self.profile == ExtractionProfile::Enriched {
            let patient_id = fields.remove("PatientID").unwrap_or(FieldValue::Unknown);
            let collection = match &patient_id {
                FieldValue::Text(id) => FieldValue::Text(derive_collection_name(id)),
                _ => FieldValue::Unknown,
            };
            record.insert("PatientID", patient_id);
            record.insert("CollectionName", collection);
            record.insert("StudyDate", validate_study_date(fields.get("StudyDate")));
            for name in [
                "SeriesNumber",
                "InstanceNumber",
                "BodyPartExamined",
                "SliceThickness",
            ] {
                record.insert(name, fields.remove(name).unwrap_or(FieldValue::Unknown));
            }
        }

        for name in OPTIONAL_FIELDS {
            if let Some(value) = fields.remove(*name) {
                record.insert(*name, value);
            }
        }

        record
    }
}

/// Patient identifier with every digit run removed and trailing hyphens
/// stripped: `"TCGA-001"` becomes `"TCGA"`.
pub fn derive_collection_name(patient_id: &str) -> String {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| Regex::new(r"\d+").expect("Invalid regex for digit runs"));
    digits
        .replace_all(patient_id, "")
        .trim_end_matches('-')
        .to_string()
}

/// Keeps a study date whose leading four characters are a year in
/// [1900, 2100]; anything else becomes `Unknown`. The value is never
/// reformatted.
pub fn validate_study_date(value: Option<&FieldValue>) -> FieldValue {
    let raw = match value {
        Some(FieldValue::Text(s)) | Some(FieldValue::Date(s)) => s.clone(),
        Some(FieldValue::Integer(n)) => n.to_string(),
        _ => return FieldValue::Unknown,
    };
    let year: String = raw.chars().take(4).collect();
    match year.trim().parse::<i64>() {
        Ok(year) if (1900..=2100).contains(&year) => match value {
            Some(original) => original.clone(),
            None => FieldValue::Unknown,
        },
        _ => FieldValue::Unknown,
    }
}

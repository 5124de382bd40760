//! CSV writer for accepted records.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::metadata::MetadataRecord;

/// How the column set is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderPolicy {
    /// Columns are the first record's keys; extra fields in later records
    /// are dropped.
    #[default]
    FirstRecord,
    /// Columns are the union of all keys, in first-seen order.
    Union,
}

/// Result of a successful export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Writes a sample as comma-delimited UTF-8 text with a header row.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    path: PathBuf,
    header_policy: HeaderPolicy,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>, header_policy: HeaderPolicy) -> Self {
        Self {
            path: path.into(),
            header_policy,
        }
    }

    /// Column names for `records` under the configured policy.
    pub fn header(&self, records: &[MetadataRecord]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let sources = match self.header_policy {
            HeaderPolicy::FirstRecord => &records[..records.len().min(1)],
            HeaderPolicy::Union => records,
        };
        for record in sources {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }
        columns
    }

    /// Writes `records`, replacing any existing file.
    ///
    /// An empty sample is a no-op: nothing is created and an existing file
    /// is left untouched. Returns `None` in that case.
    pub fn export(&self, records: &[MetadataRecord]) -> Result<Option<ExportSummary>, ExportError> {
        if records.is_empty() {
            tracing::info!(path = %self.path.display(), "Empty sample; nothing exported");
            return Ok(None);
        }

        let columns = self.header(records);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&columns)?;
        for record in records {
            let row = columns
                .iter()
                .map(|column| record.get(column).map(|v| v.to_string()).unwrap_or_default());
            writer.write_record(row)?;
        }
        writer.flush()?;

        tracing::info!(
            path = %self.path.display(),
            rows = records.len(),
            columns = columns.len(),
            "CSV file written"
        );

        Ok(Some(ExportSummary {
            path: self.path.clone(),
            rows: records.len(),
            columns,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldValue;
    use tempfile::TempDir;

    fn record(fields: &[(&str, FieldValue)]) -> MetadataRecord {
        fields.iter().cloned().collect()
    }

    #[test]
    fn test_header_from_first_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            record(&[
                ("Modality", FieldValue::text("CT")),
                ("ImageType", FieldValue::text_list(["ORIGINAL", "PRIMARY"])),
            ]),
            record(&[
                ("Modality", FieldValue::text("MR")),
                ("ImageComments", FieldValue::text("dropped")),
            ]),
        ];

        let summary = CsvExporter::new(&path, HeaderPolicy::FirstRecord)
            .export(&records)
            .unwrap()
            .unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns, vec!["Modality", "ImageType"]);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Modality,ImageType\nCT,ORIGINAL\\PRIMARY\nMR,\n");
    }

    #[test]
    fn test_union_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            record(&[("Modality", FieldValue::text("CT"))]),
            record(&[
                ("Modality", FieldValue::text("MR")),
                ("PathologyNumber", FieldValue::text("P-1")),
            ]),
        ];

        CsvExporter::new(&path, HeaderPolicy::Union)
            .export(&records)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Modality,PathologyNumber\nCT,\nMR,P-1\n");
    }

    #[test]
    fn test_quoting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![record(&[
            ("StudyDescription", FieldValue::text("CHEST, ABD")),
            ("ImageComments", FieldValue::text("say \"hi\"")),
            ("SeriesNumber", FieldValue::Integer(4)),
        ])];

        CsvExporter::new(&path, HeaderPolicy::FirstRecord)
            .export(&records)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "StudyDescription,ImageComments,SeriesNumber\n\"CHEST, ABD\",\"say \"\"hi\"\"\",4\n"
        );
    }

    #[test]
    fn test_empty_sample_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let exporter = CsvExporter::new(&path, HeaderPolicy::FirstRecord);

        assert_eq!(exporter.export(&[]).unwrap(), None);
        assert!(!path.exists());

        std::fs::write(&path, "previous run\n").unwrap();
        assert_eq!(exporter.export(&[]).unwrap(), None);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous run\n");
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let exporter = CsvExporter::new(&path, HeaderPolicy::FirstRecord);

        exporter
            .export(&[record(&[("Modality", FieldValue::text("CT"))])])
            .unwrap();
        exporter
            .export(&[record(&[("Manufacturer", FieldValue::Unknown)])])
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Manufacturer\nUnknown\n"
        );
    }
}

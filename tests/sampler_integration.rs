//! End-to-end tests: store traversal, extraction, diversity and CSV export.
//!
//! The live bucket test makes real requests to the public IDC bucket.
//! Run with: cargo test --test sampler_integration -- --ignored

use std::fs;
use std::path::Path;

use idc_sampler::dicom::{DicomFileBuilder, TransferSyntax};
use idc_sampler::diversity::SequencePolicy;
use idc_sampler::export::HeaderPolicy;
use idc_sampler::metadata::{ExtractionProfile, FieldValue};
use idc_sampler::store::{first_object_key, LocalStore, MemoryStore, S3Store, S3StoreConfig};
use idc_sampler::traversal::HaltReason;
use idc_sampler::{sample_to_csv, SamplerConfig};
use tempfile::TempDir;

fn dicom_file(modality: &str, patient_id: &str, study_date: &str) -> Vec<u8> {
    DicomFileBuilder::new()
        .text("Modality", modality)
        .text("StudyDescription", "ABDOMEN")
        .text("SeriesDescription", "AXIAL 5mm")
        .text("Manufacturer", "GE MEDICAL SYSTEMS")
        .texts("ImageType", &["ORIGINAL", "PRIMARY", "AXIAL"])
        .text("PatientID", patient_id)
        .text("StudyDate", study_date)
        .text("SeriesNumber", "2")
        .build()
        .expect("fixture should encode")
}

fn write_object(root: &Path, key: &str, bytes: &[u8]) {
    let path = root.join(key);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

fn write_collection_tree(root: &Path) {
    write_object(root, "tcga_kirc/s1/0.dcm", &dicom_file("CT", "TCGA-B0-4710", "19980101"));
    write_object(root, "tcga_kirc/s1/1.dcm", &dicom_file("CT", "TCGA-B0-4710", "19980101"));
    write_object(root, "tcga_kirc/s2/0.dcm", &dicom_file("MR", "TCGA-B0-4710", "18500101"));
    write_object(root, "tcga_kirc/s2/broken.dcm", b"DICM but not really");
    write_object(root, "tcga_kirc/readme.txt", b"not a record");
    write_object(root, "lidc/0.dcm", &dicom_file("PT", "LIDC-IDRI-0001", "20040101"));
}

#[tokio::test]
async fn test_local_tree_sample_and_export() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let output = out.path().join("dicom_metadata.csv");
    write_collection_tree(data.path());

    let config = SamplerConfig::default()
        .with_local_root(data.path())
        .with_target_count(5)
        .with_output_path(&output);
    let store = LocalStore::new(data.path());

    let report = sample_to_csv(&config, &store).await.unwrap();
    let run = &report.run;

    // s1/1.dcm repeats s1/0.dcm except for its key, which is a novel S3Key value.
    assert_eq!(
        run.keys,
        vec![
            "lidc/0.dcm",
            "tcga_kirc/s1/0.dcm",
            "tcga_kirc/s1/1.dcm",
            "tcga_kirc/s2/0.dcm"
        ]
    );
    assert_eq!(run.stats.rejected, 0);
    assert_eq!(run.stats.parse_failures, 1);
    assert_eq!(run.stats.objects_skipped, 1);
    assert_eq!(run.stats.halt_reason, Some(HaltReason::Exhausted));

    let tcga = &run.records[1];
    assert_eq!(tcga.get("CollectionName"), Some(&FieldValue::text("TCGA-B")));
    let invalid_date = &run.records[3];
    assert_eq!(invalid_date.get("StudyDate"), Some(&FieldValue::Unknown));

    let csv = fs::read_to_string(&output).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "S3Key,Modality,StudyDescription,SeriesDescription,Manufacturer,ImageType,PatientID,CollectionName,StudyDate,SeriesNumber,InstanceNumber,BodyPartExamined,SliceThickness"
    );
    assert_eq!(
        lines.next().unwrap(),
        "lidc/0.dcm,PT,ABDOMEN,AXIAL 5mm,GE MEDICAL SYSTEMS,ORIGINAL\\PRIMARY\\AXIAL,LIDC-IDRI-0001,LIDC-IDRI,20040101,2,Unknown,Unknown,Unknown"
    );
    assert_eq!(lines.count(), 3);
    assert_eq!(report.export.unwrap().rows, 4);
}

#[tokio::test]
async fn test_local_tree_with_source_key_excluded() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_collection_tree(data.path());

    let config = SamplerConfig::default()
        .with_local_root(data.path())
        .with_excluded_fields(["S3Key"])
        .with_output_path(out.path().join("sample.csv"));
    let store = LocalStore::new(data.path());

    let report = sample_to_csv(&config, &store).await.unwrap();
    assert_eq!(
        report.run.keys,
        vec!["lidc/0.dcm", "tcga_kirc/s1/0.dcm", "tcga_kirc/s2/0.dcm"]
    );
    assert_eq!(report.run.stats.rejected, 1);
    // Excluded from novelty, still exported.
    assert_eq!(
        report.run.records[0].get("S3Key"),
        Some(&FieldValue::text("lidc/0.dcm"))
    );
}

#[tokio::test]
async fn test_random_start_collection() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_collection_tree(data.path());

    let config = SamplerConfig::default()
        .with_local_root(data.path())
        .with_random_prefix(Some(3))
        .with_output_path(out.path().join("sample.csv"));
    let store = LocalStore::new(data.path());

    let report = sample_to_csv(&config, &store).await.unwrap();
    let start = &report.run.start_prefixes;
    assert_eq!(start.len(), 1);
    assert!(start[0] == "lidc/" || start[0] == "tcga_kirc/");
    assert!(report.run.keys.iter().all(|k| k.starts_with(start[0].as_str())));
    assert!(!report.run.records.is_empty());
}

#[tokio::test]
async fn test_target_bound_spans_start_prefixes() {
    let out = TempDir::new().unwrap();
    let mut store = MemoryStore::new().with_page_size(3);
    for i in 0..5 {
        store.insert(
            format!("first/{i}.dcm"),
            dicom_file(&format!("M{i}"), "A-1", "20000101"),
        );
        store.insert(
            format!("second/{i}.dcm"),
            dicom_file(&format!("N{i}"), "B-1", "20000101"),
        );
    }

    let config = SamplerConfig::default()
        .with_prefixes(["second/", "first/"])
        .with_target_count(5)
        .with_profile(ExtractionProfile::Basic)
        .with_output_path(out.path().join("sample.csv"));

    let report = sample_to_csv(&config, &store).await.unwrap();
    assert_eq!(report.run.records.len(), 5);
    assert!(report.run.stats.target_reached());
    assert!(store.fetched().iter().all(|k| k.starts_with("second/")));
    assert_eq!(store.fetched().len(), 5);
}

#[tokio::test]
async fn test_empty_sample_leaves_output_alone() {
    let out = TempDir::new().unwrap();
    let output = out.path().join("dicom_metadata.csv");
    fs::write(&output, "from an earlier run\n").unwrap();

    let store = MemoryStore::new()
        .with_object("bad/0.dcm", b"garbage".to_vec())
        .with_missing("bad/1.dcm");
    let config = SamplerConfig::default().with_output_path(&output);

    let report = sample_to_csv(&config, &store).await.unwrap();
    assert!(report.run.records.is_empty());
    assert!(report.export.is_none());
    assert_eq!(report.run.stats.missing_objects, 1);
    assert_eq!(fs::read_to_string(&output).unwrap(), "from an earlier run\n");
}

#[tokio::test]
async fn test_mixed_transfer_syntaxes_and_union_header() {
    let out = TempDir::new().unwrap();
    let output = out.path().join("sample.csv");

    let implicit = DicomFileBuilder::new()
        .transfer_syntax(TransferSyntax::ImplicitVrLittleEndian)
        .text("Modality", "CT")
        .text("PathologyNumber", "P-77")
        .build()
        .unwrap();
    let big_endian = DicomFileBuilder::new()
        .transfer_syntax(TransferSyntax::ExplicitVrBigEndian)
        .text("Modality", "SM")
        .text("ImageComments", "H&E, 20x")
        .build()
        .unwrap();
    let store = MemoryStore::new()
        .with_object("a.dcm", implicit)
        .with_object("b.dcm", big_endian);

    let config = SamplerConfig::default()
        .with_profile(ExtractionProfile::Basic)
        .with_header_policy(HeaderPolicy::Union)
        .with_sequence_policy(SequencePolicy::Unordered)
        .with_output_path(&output);

    let report = sample_to_csv(&config, &store).await.unwrap();
    assert_eq!(report.run.records.len(), 2);

    let csv = fs::read_to_string(&output).unwrap();
    assert_eq!(
        csv,
        "Modality,StudyDescription,SeriesDescription,Manufacturer,ImageType,PathologyNumber,ImageComments\n\
         CT,Unknown,Unknown,Unknown,Unknown,P-77,\n\
         SM,Unknown,Unknown,Unknown,Unknown,,\"H&E, 20x\"\n"
    );
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let store = MemoryStore::new();
    let config = SamplerConfig::default().with_target_count(0);
    let err = sample_to_csv(&config, &store).await.unwrap_err();
    assert!(err.to_string().contains("target_count"));
}

#[tokio::test]
#[ignore] // Run with: cargo test --test sampler_integration -- --ignored
async fn test_public_bucket_is_reachable() {
    let store = S3Store::new(S3StoreConfig::default().with_page_size(10));
    let first = first_object_key(&store, "").await;
    assert!(first.is_ok(), "Listing failed: {:?}", first.err());
    assert!(first.unwrap().is_some(), "Bucket should not be empty");
}

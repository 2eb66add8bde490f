use std::fs;

use collector_core::ExtractedRecord;
use collector_engine::{export_records, record_filename, ExportError, ExportOptions};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

fn sample() -> Vec<ExtractedRecord> {
    vec![
        ExtractedRecord::from_value(json!({
            "id": 1, "title": "Sea view flat", "content_type": "real_estate",
            "url": "https://listing.test/1", "price": 250000
        })),
        ExtractedRecord::from_value(json!({
            "id": 2, "title": "Ha Long cruise", "content_type": "tour"
        })),
        ExtractedRecord::from_value(json!({"id": 3, "title": "Untyped"})),
        ExtractedRecord::from_value(json!({
            "id": 4, "title": "Studio", "content_type": "real_estate"
        })),
    ]
}

#[test]
fn export_writes_array_and_manifest() {
    let temp = TempDir::new().unwrap();
    let records = sample();
    let summary = export_records(&records, temp.path(), &ExportOptions::default()).unwrap();

    assert_eq!(summary.record_count, 4);
    assert_eq!(summary.content_types.get("real_estate"), Some(&2));
    assert_eq!(summary.content_types.get("unknown"), Some(&1));
    assert!(summary.record_paths.is_empty());

    let exported: Value =
        serde_json::from_str(&fs::read_to_string(&summary.output_path).unwrap()).unwrap();
    assert_eq!(exported[0]["price"], json!(250000));
    assert_eq!(exported.as_array().map(Vec::len), Some(4));

    let manifest_path = summary.manifest_path.expect("manifest requested by default");
    let manifest: Value = serde_json::from_str(&fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest["record_count"], json!(4));
    assert_eq!(manifest["content_types"]["tour"], json!(1));
    assert_eq!(manifest["records"][0]["url"], json!("https://listing.test/1"));
    assert_eq!(manifest["records"][0]["filename"], Value::Null);
}

#[test]
fn per_record_files_use_deterministic_names() {
    let temp = TempDir::new().unwrap();
    let options = ExportOptions {
        per_record_files: true,
        manifest_filename: None,
        ..ExportOptions::default()
    };
    let summary = export_records(&sample(), temp.path(), &options).unwrap();

    assert_eq!(summary.manifest_path, None);
    assert_eq!(summary.record_paths.len(), 4);
    let expected = temp.path().join(record_filename(Some("Sea view flat"), "1"));
    assert_eq!(summary.record_paths[0], expected);
    let single: Value = serde_json::from_str(&fs::read_to_string(expected).unwrap()).unwrap();
    assert_eq!(single["title"], json!("Sea view flat"));
}

#[test]
fn nothing_to_export_is_an_error() {
    let temp = TempDir::new().unwrap();
    let err = export_records(&[], temp.path(), &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, ExportError::Empty));
}

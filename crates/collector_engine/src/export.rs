use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use collector_core::ExtractedRecord;
use collector_logging::collector_info;
use serde_json::json;

use crate::filename::record_filename;
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_filename: String,
    pub manifest_filename: Option<String>,
    /// Also write each record to its own `{title}--{hash}.json` file.
    pub per_record_files: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_filename: "records.json".to_string(),
            manifest_filename: Some("manifest.json".to_string()),
            per_record_files: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub record_count: usize,
    /// Records per content type; untyped records count as `unknown`.
    pub content_types: BTreeMap<String, usize>,
    pub output_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub record_paths: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

const UNKNOWN_CONTENT_TYPE: &str = "unknown";

/// Writes `records` as one JSON array plus an optional manifest into
/// `output_dir`. Every file is written atomically.
pub fn export_records(
    records: &[ExtractedRecord],
    output_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    let writer = AtomicFileWriter::new(output_dir);
    let output_path = writer.write_json(&options.output_filename, records)?;

    let mut content_types = BTreeMap::new();
    for record in records {
        let key = record
            .content_type()
            .unwrap_or_else(|| UNKNOWN_CONTENT_TYPE.to_string());
        *content_types.entry(key).or_insert(0usize) += 1;
    }

    let mut record_paths = Vec::new();
    let mut filenames = Vec::with_capacity(records.len());
    for record in records {
        let filename = record_filename(record.title().as_deref(), &record_key(record));
        if options.per_record_files {
            record_paths.push(writer.write_json(&filename, record)?);
        }
        filenames.push(filename);
    }

    let manifest_path = match &options.manifest_filename {
        Some(name) => {
            let manifest = json!({
                "record_count": records.len(),
                "exported_utc": chrono::Utc::now().to_rfc3339(),
                "output": options.output_filename,
                "content_types": content_types,
                "records": records.iter().zip(&filenames).map(|(record, filename)| {
                    json!({
                        "id": record.id(),
                        "title": record.title(),
                        "url": record.url(),
                        "content_type": record.content_type(),
                        "filename": options.per_record_files.then_some(filename),
                    })
                }).collect::<Vec<_>>()
            });
            Some(writer.write_json(name, &manifest)?)
        }
        None => None,
    };

    collector_info!(
        "exported {} records to {}",
        records.len(),
        output_path.display()
    );
    Ok(ExportSummary {
        record_count: records.len(),
        content_types,
        output_path,
        manifest_path,
        record_paths,
    })
}

/// Stable identity used for per-record filenames.
fn record_key(record: &ExtractedRecord) -> String {
    record
        .id()
        .or_else(|| record.url())
        .unwrap_or_else(|| serde_json::Value::Object(record.fields().clone()).to_string())
}

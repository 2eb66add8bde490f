use std::fmt::Write;

use chrono::{DateTime, Utc};
use collector_core::{
    format_relative_time, present, BatchStatus, BatchView, CatalogView, Classification,
    ExtractedRecord, OutcomeView, ProgressEvent, RecordView, SaveState,
};

pub fn render_progress(event: &ProgressEvent) -> String {
    let stage = if event.stage.trim().is_empty() {
        "Working"
    } else {
        event.stage.as_str()
    };
    match event.progress {
        Some(percent) => format!("[{percent:>3}%] {stage}"),
        None => format!("[ .. ] {stage}"),
    }
}

pub fn render_record_view(view: &RecordView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.title);
    if !view.badge.is_empty() {
        let _ = writeln!(out, "  [{}]", view.badge);
    }
    if let Some(url) = &view.url {
        let _ = writeln!(out, "  {url}");
    }
    if let Some(extracted) = &view.extracted {
        let _ = writeln!(out, "  extracted {extracted}");
    }
    for section in &view.sections {
        let _ = writeln!(out, "\n{}", section.heading);
        let width = section
            .rows
            .iter()
            .map(|row| row.label.chars().count())
            .max()
            .unwrap_or(0);
        for row in &section.rows {
            let _ = writeln!(out, "  {:<width$}  {}", row.label, row.value);
        }
    }
    out
}

pub fn render_record(
    record: &ExtractedRecord,
    classification: &Classification,
    now: DateTime<Utc>,
) -> String {
    render_record_view(&present(record, classification, now))
}

/// Text for a finished foreground job.
pub fn render_outcome(outcome: &OutcomeView, now: DateTime<Utc>) -> String {
    match outcome {
        OutcomeView::Completed {
            record,
            classification,
            ..
        } => render_record(record, classification, now),
        OutcomeView::Failed { message } => format!("Extraction failed: {message}\n"),
    }
}

pub fn render_save(save: &SaveState) -> Option<String> {
    match save {
        SaveState::NotSaved | SaveState::Saving => None,
        SaveState::Saved { id: Some(id) } => Some(format!("Saved as record {id}")),
        SaveState::Saved { id: None } => Some("Saved".to_string()),
        SaveState::Duplicate { message } => Some(format!("Not saved: {message}")),
        SaveState::Failed { message } => Some(format!("Save failed: {message}")),
    }
}

pub fn render_batch(batch: &BatchView) -> String {
    let mut out = String::new();
    for item in &batch.items {
        let line = match &item.status {
            BatchStatus::Pending => "pending".to_string(),
            BatchStatus::Running => "running".to_string(),
            BatchStatus::Succeeded {
                title,
                content_type,
            } => match (title, content_type) {
                (Some(title), Some(ct)) => format!("OK   {title} ({ct})"),
                (Some(title), None) => format!("OK   {title}"),
                (None, Some(ct)) => format!("OK   ({ct})"),
                (None, None) => "OK".to_string(),
            },
            BatchStatus::Failed { message } => format!("ERR  {message}"),
            BatchStatus::Cancelled => "cancelled".to_string(),
        };
        let _ = writeln!(out, "{}  {}", item.source, line);
    }
    let _ = writeln!(
        out,
        "{} succeeded, {} failed, {} skipped as already done",
        batch.succeeded(),
        batch.failed(),
        batch.skipped_duplicates
    );
    out
}

/// One line per saved record: id, age, content type and title.
pub fn render_history(records: &[ExtractedRecord], total: usize, now: DateTime<Utc>) -> String {
    if records.is_empty() {
        return "No saved records\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        let age = record
            .timestamp()
            .map(|ts| format_relative_time(ts, now))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>6}  {:<16}  {:<14}  {}",
            record.id().unwrap_or_else(|| "?".to_string()),
            age,
            record.content_type().unwrap_or_else(|| "-".to_string()),
            record.title().unwrap_or_else(|| "Untitled".to_string()),
        );
    }
    let _ = writeln!(out, "{} of {} records", records.len(), total);
    out
}

pub fn render_stats(catalog: &CatalogView, now: DateTime<Utc>) -> String {
    let Some(stats) = &catalog.stats else {
        return String::new();
    };
    let mut out = format!("Records ingested today: {}\n", stats.properties_today);
    if !stats.recent_properties.is_empty() {
        out.push_str("Recent:\n");
        out.push_str(&render_history(
            &stats.recent_properties,
            stats.recent_properties.len(),
            now,
        ));
    }
    out
}

pub fn render_content_types(catalog: &CatalogView) -> String {
    let mut out = String::new();
    for info in &catalog.content_types {
        let _ = write!(out, "{}", info.id);
        if let Some(name) = &info.name {
            let _ = write!(out, "  {name}");
        }
        if let Some(description) = &info.description {
            let _ = write!(out, "  ({description})");
        }
        out.push('\n');
    }
    out
}

pub fn render_sites(catalog: &CatalogView) -> String {
    let mut out = String::new();
    for site in &catalog.supported_sites {
        let _ = write!(out, "{}", site.name);
        if let Some(url) = &site.url {
            let _ = write!(out, "  {url}");
        }
        if !site.content_types.is_empty() {
            let _ = write!(out, "  [{}]", site.content_types.join(", "));
        }
        out.push('\n');
    }
    out
}

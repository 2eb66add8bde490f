use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Hint value that asks the backend to detect the content type itself.
pub const AUTO_CONTENT_TYPE: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Url,
    Text,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("please enter a URL or some text to analyze")]
    EmptySource,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// A single submission to the ingestion backend.
///
/// Built once per user action and consumed by the submission client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionRequest {
    kind: SourceKind,
    payload: String,
    content_type: Option<String>,
}

impl IngestionRequest {
    /// Builds a request, trimming the payload and mapping an `auto` (or blank)
    /// hint to `None` so the backend performs detection.
    pub fn new(kind: SourceKind, payload: &str, hint: &str) -> Result<Self, ValidationError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(ValidationError::EmptySource);
        }
        let hint = hint.trim();
        let content_type = if hint.is_empty() || hint.eq_ignore_ascii_case(AUTO_CONTENT_TYPE) {
            None
        } else {
            Some(hint.to_string())
        };
        Ok(Self {
            kind,
            payload: payload.to_string(),
            content_type,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// JSON body sent to the ingestion endpoint. Asynchronous tracking is
    /// always requested.
    pub fn to_body(&self) -> Value {
        let source_key = match self.kind {
            SourceKind::Url => "url",
            SourceKind::Text => "text",
        };
        let mut body = Map::new();
        body.insert(source_key.to_string(), Value::String(self.payload.clone()));
        body.insert(
            "content_type".to_string(),
            self.content_type
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        body.insert("use_websocket".to_string(), Value::Bool(true));
        Value::Object(body)
    }
}

/// Opaque identifier of a server-side extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlates a submission request with its reply, so a reply to an
/// abandoned submission cannot be mistaken for the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(u64);

impl SubmissionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub progress: Option<u8>,
}

impl ProgressEvent {
    pub fn new(stage: impl Into<String>, progress: Option<f64>) -> Self {
        Self {
            stage: stage.into(),
            progress: progress.map(|p| p.clamp(0.0, 100.0).round() as u8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub content_type: Option<String>,
    pub page_type: Option<String>,
    pub confidence: Option<f64>,
}

/// Final outcome of one job. Exactly one is applied per job.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalResult {
    Success {
        record: ExtractedRecord,
        classification: Classification,
    },
    Failure {
        message: String,
    },
}

/// Loosely typed bag of extracted fields.
///
/// The schema varies by content type; accessors return `None` for absent or
/// empty values so callers can include groups conditionally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord(Map<String, Value>);

impl ExtractedRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Accepts any JSON value; non-objects yield an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Resolves a dotted path (`pricing.price`) through nested objects.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        if is_empty_value(current) {
            None
        } else {
            Some(current)
        }
    }

    /// First non-empty value among `paths`, rendered as display text.
    pub fn text(&self, paths: &[&str]) -> Option<String> {
        paths
            .iter()
            .find_map(|path| self.lookup(path).and_then(display_value))
    }

    /// First value among `paths` that is a number or a numeric string.
    pub fn number(&self, paths: &[&str]) -> Option<f64> {
        paths.iter().find_map(|path| match self.lookup(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number(s),
            _ => None,
        })
    }

    /// List of display strings from an array field (strings, numbers, or
    /// objects with a `name`/`title`/`url` member).
    pub fn list(&self, paths: &[&str]) -> Vec<String> {
        paths
            .iter()
            .find_map(|path| match self.lookup(path)? {
                Value::Array(items) => Some(
                    items
                        .iter()
                        .filter_map(|item| match item {
                            Value::Object(obj) => ["name", "title", "url", "text"]
                                .iter()
                                .find_map(|k| obj.get(*k).and_then(display_value)),
                            other => display_value(other),
                        })
                        .collect::<Vec<_>>(),
                ),
                Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn id(&self) -> Option<String> {
        self.text(&["id", "pk"])
    }

    pub fn title(&self) -> Option<String> {
        self.text(&["title", "name"])
    }

    pub fn url(&self) -> Option<String> {
        self.text(&["url", "source_url"])
    }

    pub fn content_type(&self) -> Option<String> {
        self.text(&["content_type"])
    }

    pub fn page_type(&self) -> Option<String> {
        self.text(&["page_type"])
    }

    pub fn images(&self) -> Vec<String> {
        self.list(&["images", "image_urls"])
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.text(&["timestamp", "created_at", "extracted_at"])?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl From<Map<String, Value>> for ExtractedRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Scalar values as display text; arrays and objects are not scalars.
pub(crate) fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "yes" } else { "no" }.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// One page of saved records from the history endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryPage {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<ExtractedRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IngestStats {
    #[serde(default)]
    pub properties_today: u64,
    #[serde(default)]
    pub recent_properties: Vec<ExtractedRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeInfo {
    #[serde(alias = "value", alias = "key")]
    pub id: String,
    #[serde(default, alias = "label")]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedWebsite {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content_types: Vec<String>,
}

/// Result of asking the backend to store an extracted record.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(ExtractedRecord),
    Duplicate { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_hint_becomes_null_in_body() {
        let request = IngestionRequest::new(SourceKind::Url, " https://x.test/a ", "AUTO").unwrap();
        assert_eq!(request.payload(), "https://x.test/a");
        assert_eq!(
            request.to_body(),
            json!({"url": "https://x.test/a", "content_type": null, "use_websocket": true})
        );
    }

    #[test]
    fn explicit_hint_is_forwarded_for_text() {
        let request = IngestionRequest::new(SourceKind::Text, "Nice flat", "restaurant").unwrap();
        assert_eq!(
            request.to_body(),
            json!({"text": "Nice flat", "content_type": "restaurant", "use_websocket": true})
        );
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(
            IngestionRequest::new(SourceKind::Text, "  \n ", "auto"),
            Err(ValidationError::EmptySource)
        );
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(ProgressEvent::new("x", Some(140.0)).progress, Some(100));
        assert_eq!(ProgressEvent::new("x", Some(-3.0)).progress, Some(0));
        assert_eq!(ProgressEvent::new("x", None).progress, None);
    }

    #[test]
    fn record_accessors_skip_empty_values_and_follow_paths() {
        let record = ExtractedRecord::from_value(json!({
            "title": "  ",
            "name": "Sunny loft",
            "pricing": {"price": "1,200,000", "currency": "USD"},
            "images": [{"url": "https://img/1.jpg"}, "https://img/2.jpg"],
            "id": 42,
            "created_at": "2024-05-01T10:00:00Z"
        }));
        assert_eq!(record.title().as_deref(), Some("Sunny loft"));
        assert_eq!(record.number(&["pricing.price"]), Some(1_200_000.0));
        assert_eq!(record.images(), vec!["https://img/1.jpg", "https://img/2.jpg"]);
        assert_eq!(record.id().as_deref(), Some("42"));
        assert!(record.timestamp().is_some());
        assert!(record.lookup("pricing.missing").is_none());
    }
}

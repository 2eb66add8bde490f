use std::time::Duration;

use collector_core::{
    ContentTypeInfo, ExtractedRecord, HistoryPage, IngestStats, IngestionRequest, SaveOutcome,
    SourceKind, SupportedWebsite, TaskId,
};
use collector_logging::{collector_debug, collector_info, collector_warn};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{ClientError, FailureKind, SubmitResponse};

/// Notice used when the backend reports a duplicate without explaining it.
pub const DUPLICATE_NOTICE: &str = "This record has already been saved";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Root of the backend API, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Longest gap tolerated between two progress frames; `None` waits forever.
    pub progress_idle_timeout: Option<Duration>,
    /// Where the backend publishes a job's progress as server-sent events,
    /// relative to `base_url`; the task id is appended as the last segment.
    /// The submission body still asks for live updates with
    /// `use_websocket: true`, which is what makes the backend publish them.
    pub progress_path: String,
}

/// Default progress stream location, `{base}/ingest/progress/{task_id}/`.
pub const DEFAULT_PROGRESS_PATH: &str = "ingest/progress/";

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            progress_idle_timeout: Some(Duration::from_secs(120)),
            progress_path: DEFAULT_PROGRESS_PATH.to_string(),
        }
    }
}

impl ClientSettings {
    /// Parses `base_url`, forcing a trailing slash so relative joins keep
    /// every path segment.
    pub(crate) fn base(&self) -> Result<Url, ClientError> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw)
            .map_err(|err| ClientError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::new(
                FailureKind::InvalidUrl,
                format!("{raw} cannot be used as an API base"),
            ));
        }
        Ok(base)
    }
}

/// The backend's HTTP surface.
#[async_trait::async_trait]
pub trait IngestApi: Send + Sync {
    async fn submit(&self, request: &IngestionRequest) -> Result<SubmitResponse, ClientError>;
    async fn save(&self, record: &ExtractedRecord) -> Result<SaveOutcome, ClientError>;
    async fn history(&self, page_size: usize, ordering: &str) -> Result<HistoryPage, ClientError>;
    async fn record(&self, id: &str) -> Result<ExtractedRecord, ClientError>;
    async fn delete_record(&self, id: &str) -> Result<(), ClientError>;
    async fn stats(&self) -> Result<IngestStats, ClientError>;
    async fn content_types(&self) -> Result<Vec<ContentTypeInfo>, ClientError>;
    async fn supported_websites(&self) -> Result<Vec<SupportedWebsite>, ClientError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestIngestClient {
    client: reqwest::Client,
    base: Url,
}

impl ReqwestIngestClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            base: settings.base()?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|err| ClientError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    fn record_endpoint(&self, id: &str) -> Result<Url, ClientError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ClientError::new(FailureKind::InvalidUrl, "record id is empty"));
        }
        let mut url = self.endpoint("properties/")?;
        url.path_segments_mut()
            .map_err(|()| ClientError::new(FailureKind::InvalidUrl, "invalid API base"))?
            .pop_if_empty()
            .push(id)
            .push("");
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        collector_debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl IngestApi for ReqwestIngestClient {
    async fn submit(&self, request: &IngestionRequest) -> Result<SubmitResponse, ClientError> {
        let url = match request.kind() {
            SourceKind::Url => self.endpoint("ingest/url/")?,
            SourceKind::Text => self.endpoint("ingest/text/")?,
        };
        collector_info!(
            "POST {} kind={:?} payload_len={} content_type={:?}",
            url,
            request.kind(),
            request.payload().len(),
            request.content_type()
        );
        let response = self
            .client
            .post(url)
            .json(&request.to_body())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body: Value = read_json(response).await?;
        parse_submit_response(body)
    }

    async fn save(&self, record: &ExtractedRecord) -> Result<SaveOutcome, ClientError> {
        let url = self.endpoint("ingest/save/")?;
        collector_info!("POST {} title={:?}", url, record.title());
        let response = self
            .client
            .post(url)
            .json(&json!({ "property_data": record }))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            let message = backend_message(&body).unwrap_or_else(|| DUPLICATE_NOTICE.to_string());
            return Ok(SaveOutcome::Duplicate { message });
        }
        let body: Value = read_json(response).await?;
        Ok(parse_save_response(body))
    }

    async fn history(&self, page_size: usize, ordering: &str) -> Result<HistoryPage, ClientError> {
        let mut url = self.endpoint("properties/")?;
        url.query_pairs_mut()
            .append_pair("page_size", &page_size.to_string())
            .append_pair("ordering", ordering);
        let body: Value = self.get_json(url).await?;
        match body {
            Value::Array(items) => {
                let results: Vec<ExtractedRecord> =
                    items.into_iter().map(ExtractedRecord::from_value).collect();
                Ok(HistoryPage {
                    count: results.len(),
                    results,
                    ..HistoryPage::default()
                })
            }
            other => serde_json::from_value(other)
                .map_err(|err| ClientError::new(FailureKind::Decode, err.to_string())),
        }
    }

    async fn record(&self, id: &str) -> Result<ExtractedRecord, ClientError> {
        let url = self.record_endpoint(id)?;
        self.get_json(url).await
    }

    async fn delete_record(&self, id: &str) -> Result<(), ClientError> {
        let url = self.record_endpoint(id)?;
        collector_info!("DELETE {}", url);
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status, &body))
    }

    async fn stats(&self) -> Result<IngestStats, ClientError> {
        let url = self.endpoint("ingest/stats/")?;
        self.get_json(url).await
    }

    async fn content_types(&self) -> Result<Vec<ContentTypeInfo>, ClientError> {
        let url = self.endpoint("ingest/content-types/")?;
        let body: Value = self.get_json(url).await?;
        if body.get("status").and_then(Value::as_str) == Some("error") {
            let message = string_field(&body, &["error", "message"])
                .unwrap_or_else(|| "Could not load content types".to_string());
            return Err(ClientError::new(FailureKind::Decode, message));
        }
        Ok(named_items(&body, "content_types", |id| ContentTypeInfo {
            id,
            name: None,
            description: None,
        }))
    }

    async fn supported_websites(&self) -> Result<Vec<SupportedWebsite>, ClientError> {
        let url = self.endpoint("ingest/supported-websites/")?;
        let body: Value = self.get_json(url).await?;
        Ok(named_items(&body, "websites", |name| SupportedWebsite {
            name,
            url: None,
            content_types: Vec::new(),
        }))
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let err = error_from_body(status, &body);
        collector_warn!("request failed: {} ({})", err.message, err.kind);
        return Err(err);
    }
    response.json::<T>().await.map_err(map_reqwest_error)
}

/// Prefers the backend's own message over the generic status text.
pub(crate) fn error_from_body(status: StatusCode, body: &str) -> ClientError {
    match backend_message(body) {
        Some(message) => ClientError::new(FailureKind::HttpStatus(status.as_u16()), message),
        None => ClientError::status(status.as_u16()),
    }
}

fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    string_field(&value, &["error", "message", "detail"])
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    })
}

fn parse_submit_response(body: Value) -> Result<SubmitResponse, ClientError> {
    let task_id = match body.get("task_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    if let Some(task_id) = task_id {
        return Ok(SubmitResponse::Accepted {
            task_id: TaskId::new(task_id),
        });
    }
    match body.get("property") {
        Some(property @ Value::Object(_)) => Ok(SubmitResponse::Completed {
            record: ExtractedRecord::from_value(property.clone()),
        }),
        _ => {
            let message = string_field(&body, &["error", "message"])
                .unwrap_or_else(|| "Unexpected response from ingestion endpoint".to_string());
            Err(ClientError::new(FailureKind::Decode, message))
        }
    }
}

fn parse_save_response(body: Value) -> SaveOutcome {
    let duplicate = body.get("duplicate").and_then(Value::as_bool) == Some(true)
        || body.get("status").and_then(Value::as_str) == Some("duplicate");
    if duplicate {
        let message =
            string_field(&body, &["message", "error"]).unwrap_or_else(|| DUPLICATE_NOTICE.to_string());
        return SaveOutcome::Duplicate { message };
    }
    match body.get("property") {
        Some(property @ Value::Object(_)) => {
            SaveOutcome::Saved(ExtractedRecord::from_value(property.clone()))
        }
        _ => SaveOutcome::Saved(ExtractedRecord::from_value(body)),
    }
}

/// Reads `body[key]` as a list whose items are either bare names or objects.
fn named_items<T, F>(body: &Value, key: &str, from_name: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: Fn(String) -> T,
{
    let items = match body.get(key).or(Some(body)) {
        Some(Value::Array(items)) => items,
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(from_name(name.clone())),
            other => match serde_json::from_value(other.clone()) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    collector_warn!("skipping malformed {} entry: {}", key, err);
                    None
                }
            },
        })
        .collect()
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::new(FailureKind::Timeout, "The request timed out");
    }
    if err.is_decode() {
        return ClientError::new(FailureKind::Decode, err.to_string());
    }
    if err.is_builder() {
        return ClientError::new(FailureKind::InvalidUrl, err.to_string());
    }
    ClientError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_its_path_when_joining() {
        let settings = ClientSettings {
            base_url: "http://backend.test/api".into(),
            ..ClientSettings::default()
        };
        let client = ReqwestIngestClient::new(&settings).unwrap();
        assert_eq!(
            client.endpoint("ingest/url/").unwrap().as_str(),
            "http://backend.test/api/ingest/url/"
        );
        assert_eq!(
            client.record_endpoint("42").unwrap().as_str(),
            "http://backend.test/api/properties/42/"
        );
        assert_eq!(
            client.record_endpoint("a/b").unwrap().as_str(),
            "http://backend.test/api/properties/a%2Fb/"
        );
    }

    #[test]
    fn submit_response_shapes() {
        assert_eq!(
            parse_submit_response(json!({"task_id": "abc123"})).unwrap(),
            SubmitResponse::Accepted {
                task_id: TaskId::new("abc123")
            }
        );
        assert!(matches!(
            parse_submit_response(json!({"property": {"title": "X"}})).unwrap(),
            SubmitResponse::Completed { .. }
        ));
        let err = parse_submit_response(json!({"status": "ok"})).unwrap_err();
        assert_eq!(err.kind, FailureKind::Decode);
    }

    #[test]
    fn backend_message_prefers_error_then_message_then_detail() {
        assert_eq!(backend_message(r#"{"detail":"d","message":"m"}"#).as_deref(), Some("m"));
        assert_eq!(backend_message(r#"{"detail":"Not found."}"#).as_deref(), Some("Not found."));
        assert_eq!(backend_message("<html>oops</html>"), None);
        assert_eq!(
            error_from_body(StatusCode::BAD_GATEWAY, "").message,
            "Request failed with status 502"
        );
    }
}

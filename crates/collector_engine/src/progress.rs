use std::time::Duration;

use collector_core::{Classification, ExtractedRecord, ProgressEvent, TaskId, TerminalResult};
use collector_logging::{collector_debug, collector_info, collector_trace, collector_warn};
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::{error_from_body, map_reqwest_error, ClientSettings};
use crate::sse::{SseDecoder, SseFrame};
use crate::{ClientError, EngineEvent, FailureKind};

/// Message used when the stream ends without a terminal frame.
pub const CHANNEL_CLOSED_MESSAGE: &str = "Connection to progress channel lost";

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// How a followed channel stopped when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEnd {
    /// The terminal frame was delivered to the sink.
    Terminal,
    /// The caller cancelled; nothing terminal was emitted.
    Cancelled,
}

/// A live per-job status feed.
#[async_trait::async_trait]
pub trait ProgressChannel: Send + Sync {
    /// Emits `Progress` events in arrival order followed by at most one
    /// `Finished` event. Returns once the terminal frame has been emitted,
    /// on cancellation, or with the connection error.
    async fn follow(
        &self,
        task_id: &TaskId,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<ChannelEnd, ClientError>;
}

/// Progress channel backed by a server-sent event stream at
/// `GET {base}/{progress_path}/{task_id}/`.
#[derive(Debug, Clone)]
pub struct SseProgressChannel {
    client: reqwest::Client,
    base: Url,
    path: Vec<String>,
    idle_timeout: Option<Duration>,
}

impl SseProgressChannel {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        // No overall timeout: the stream stays open for the whole job.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            base: settings.base()?,
            path: settings
                .progress_path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            idle_timeout: settings.progress_idle_timeout,
        })
    }

    fn channel_url(&self, task_id: &TaskId) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::new(FailureKind::InvalidUrl, "invalid API base"))?
            .pop_if_empty()
            .extend(&self.path)
            .push(task_id.as_str())
            .push("");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl ProgressChannel for SseProgressChannel {
    async fn follow(
        &self,
        task_id: &TaskId,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<ChannelEnd, ClientError> {
        let url = self.channel_url(task_id)?;
        collector_info!(task = task_id; "subscribing to {}", url);

        let request = self.client.get(url).header(ACCEPT, "text/event-stream").send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(ChannelEnd::Cancelled),
            response = request => response.map_err(map_reqwest_error)?,
        };
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }

        let mut stream = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    collector_debug!(task = task_id; "channel cancelled");
                    return Ok(ChannelEnd::Cancelled);
                }
                next = next_chunk(&mut stream, self.idle_timeout) => next,
            };
            match next {
                Err(_elapsed) => {
                    return Err(ClientError::new(
                        FailureKind::IdleTimeout,
                        "No progress received from the server in time",
                    ))
                }
                Ok(Some(Ok(chunk))) => {
                    for frame in decoder.push(&chunk) {
                        if dispatch_frame(task_id, &frame, sink) {
                            return Ok(ChannelEnd::Terminal);
                        }
                    }
                }
                Ok(Some(Err(err))) => return Err(map_reqwest_error(err)),
                Ok(None) => {
                    if let Some(frame) = decoder.finish() {
                        if dispatch_frame(task_id, &frame, sink) {
                            return Ok(ChannelEnd::Terminal);
                        }
                    }
                    return Err(ClientError::new(
                        FailureKind::ChannelClosed,
                        CHANNEL_CLOSED_MESSAGE,
                    ));
                }
            }
        }
    }
}

async fn next_chunk<S>(
    stream: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<S::Item>, tokio::time::error::Elapsed>
where
    S: Stream + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next()).await,
        None => Ok(stream.next().await),
    }
}

/// Decoded channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Progress(ProgressEvent),
    Terminal(TerminalResult),
}

// Backends disagree on key names, and some send several of them at once
// (`stage` next to a human `message`, `property` next to `data`). Each key is
// read on its own and the first present one wins, in declaration order.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFrame {
    #[serde(alias = "status")]
    Progress {
        #[serde(default)]
        stage: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        percent: Option<f64>,
        #[serde(default)]
        percentage: Option<f64>,
    },
    #[serde(alias = "completed", alias = "completion", alias = "done")]
    Complete {
        #[serde(default)]
        property: Option<Value>,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        record: Option<Value>,
        #[serde(default)]
        content_type: Option<String>,
        #[serde(default)]
        page_type: Option<String>,
        #[serde(default)]
        confidence: Option<f64>,
        #[serde(default)]
        classification: Option<Classification>,
    },
    #[serde(alias = "failed", alias = "failure")]
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}

fn first_label(candidates: [Option<String>; 3]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|label| !label.trim().is_empty())
}

/// Message shown when an error frame carries no text.
pub const EXTRACTION_FAILED_MESSAGE: &str = "Extraction failed";

/// Decodes one frame. Unknown frame types (heartbeats, connection notices)
/// and malformed payloads yield `None`. When the JSON payload has no `type`,
/// the SSE event name is used instead.
pub fn decode_frame(frame: &SseFrame) -> Option<ChannelMessage> {
    let mut value: Value = match serde_json::from_str(&frame.data) {
        Ok(value) => value,
        Err(err) => {
            collector_warn!("ignoring malformed progress frame: {}", err);
            return None;
        }
    };
    if let (Value::Object(map), Some(event)) = (&mut value, frame.event.as_deref()) {
        map.entry("type")
            .or_insert_with(|| Value::String(event.to_string()));
    }

    let wire: WireFrame = match serde_json::from_value(value) {
        Ok(wire) => wire,
        Err(err) => {
            collector_trace!("skipping frame: {}", err);
            return None;
        }
    };

    let message = match wire {
        WireFrame::Progress {
            stage,
            status,
            message,
            progress,
            percent,
            percentage,
        } => ChannelMessage::Progress(ProgressEvent::new(
            first_label([stage, message, status]).unwrap_or_default(),
            progress.or(percent).or(percentage),
        )),
        WireFrame::Complete {
            property,
            data,
            record,
            content_type,
            page_type,
            confidence,
            classification,
        } => {
            let record = property
                .or(data)
                .or(record)
                .filter(|value| !value.is_null())
                .map(ExtractedRecord::from_value)
                .unwrap_or_default();
            let nested = classification.unwrap_or_default();
            let classification = Classification {
                content_type: content_type
                    .or(nested.content_type)
                    .or_else(|| record.content_type()),
                page_type: page_type.or(nested.page_type).or_else(|| record.page_type()),
                confidence: confidence.or(nested.confidence),
            };
            ChannelMessage::Terminal(TerminalResult::Success {
                record,
                classification,
            })
        }
        WireFrame::Error { message, error } => ChannelMessage::Terminal(TerminalResult::Failure {
            message: message
                .or(error)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| EXTRACTION_FAILED_MESSAGE.to_string()),
        }),
    };
    Some(message)
}

/// Emits the frame's event; returns true for a terminal frame.
fn dispatch_frame(task_id: &TaskId, frame: &SseFrame, sink: &dyn ProgressSink) -> bool {
    match decode_frame(frame) {
        Some(ChannelMessage::Progress(event)) => {
            collector_debug!(task = task_id; "progress {:?} {}", event.progress, event.stage);
            sink.emit(EngineEvent::Progress {
                task_id: task_id.clone(),
                event,
            });
            false
        }
        Some(ChannelMessage::Terminal(result)) => {
            collector_info!(
                task = task_id;
                "finished: {}",
                match &result {
                    TerminalResult::Success { .. } => "success",
                    TerminalResult::Failure { .. } => "failure",
                }
            );
            sink.emit(EngineEvent::Finished {
                task_id: task_id.clone(),
                result,
            });
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: Option<&str>, data: Value) -> SseFrame {
        SseFrame {
            event: event.map(ToOwned::to_owned),
            data: data.to_string(),
        }
    }

    #[test]
    fn progress_frame_decodes_with_clamped_percentage() {
        let decoded = decode_frame(&frame(
            None,
            json!({"type": "progress", "stage": "Extracting", "progress": 130}),
        ));
        assert_eq!(
            decoded,
            Some(ChannelMessage::Progress(ProgressEvent {
                stage: "Extracting".into(),
                progress: Some(100)
            }))
        );
    }

    #[test]
    fn event_name_is_used_when_type_is_missing() {
        let decoded = decode_frame(&frame(Some("error"), json!({"message": "boom"})));
        assert_eq!(
            decoded,
            Some(ChannelMessage::Terminal(TerminalResult::Failure {
                message: "boom".into()
            }))
        );
    }

    #[test]
    fn completion_merges_classification_sources() {
        let decoded = decode_frame(&frame(
            None,
            json!({
                "type": "complete",
                "property": {"title": "T", "page_type": "detail"},
                "classification": {"content_type": "tour", "confidence": 0.8}
            }),
        ));
        let Some(ChannelMessage::Terminal(TerminalResult::Success {
            record,
            classification,
        })) = decoded
        else {
            panic!("expected completion");
        };
        assert_eq!(record.title().as_deref(), Some("T"));
        assert_eq!(classification.content_type.as_deref(), Some("tour"));
        assert_eq!(classification.page_type.as_deref(), Some("detail"));
        assert_eq!(classification.confidence, Some(0.8));
    }

    #[test]
    fn progress_frame_with_stage_and_message_keeps_the_stage() {
        let decoded = decode_frame(&frame(
            None,
            json!({
                "type": "progress",
                "stage": "extracting",
                "message": "Extracting content",
                "progress": 40,
                "percent": 90
            }),
        ));
        assert_eq!(
            decoded,
            Some(ChannelMessage::Progress(ProgressEvent {
                stage: "extracting".into(),
                progress: Some(40)
            }))
        );
    }

    #[test]
    fn progress_label_falls_back_to_message_then_status() {
        let decoded = decode_frame(&frame(
            Some("progress"),
            json!({"stage": "", "message": "Fetching page", "status": "running", "percentage": 12}),
        ));
        assert_eq!(
            decoded,
            Some(ChannelMessage::Progress(ProgressEvent {
                stage: "Fetching page".into(),
                progress: Some(12)
            }))
        );
    }

    #[test]
    fn completion_with_property_and_data_is_terminal() {
        let decoded = decode_frame(&frame(
            None,
            json!({
                "type": "complete",
                "property": {"title": "Sea view flat"},
                "data": {"title": "raw payload"},
                "content_type": "real_estate"
            }),
        ));
        let Some(ChannelMessage::Terminal(TerminalResult::Success {
            record,
            classification,
        })) = decoded
        else {
            panic!("expected completion");
        };
        assert_eq!(record.title().as_deref(), Some("Sea view flat"));
        assert_eq!(classification.content_type.as_deref(), Some("real_estate"));
    }

    #[test]
    fn completion_reads_data_when_property_is_missing() {
        let decoded = decode_frame(&frame(
            Some("complete"),
            json!({"data": {"title": "Alpine tour"}, "record": {"title": "other"}}),
        ));
        let Some(ChannelMessage::Terminal(TerminalResult::Success { record, .. })) = decoded
        else {
            panic!("expected completion");
        };
        assert_eq!(record.title().as_deref(), Some("Alpine tour"));
    }

    #[test]
    fn unknown_and_malformed_frames_are_skipped() {
        assert_eq!(decode_frame(&frame(None, json!({"type": "heartbeat"}))), None);
        let garbage = SseFrame {
            event: None,
            data: "not json".into(),
        };
        assert_eq!(decode_frame(&garbage), None);
    }

    #[test]
    fn error_frame_without_text_gets_generic_message() {
        assert_eq!(
            decode_frame(&frame(None, json!({"type": "error"}))),
            Some(ChannelMessage::Terminal(TerminalResult::Failure {
                message: EXTRACTION_FAILED_MESSAGE.into()
            }))
        );
    }
}

use std::fmt;

use collector_core::{
    ContentTypeInfo, ExtractedRecord, HistoryPage, IngestStats, ProgressEvent, SaveOutcome,
    SubmissionId, SupportedWebsite, TaskId, TerminalResult,
};

/// What the ingestion endpoint answered to a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResponse {
    /// Job accepted; results arrive on the progress channel.
    Accepted { task_id: TaskId },
    /// Extraction finished inside the request.
    Completed { record: ExtractedRecord },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Submitted {
        submission: SubmissionId,
        result: Result<SubmitResponse, ClientError>,
    },
    Progress {
        task_id: TaskId,
        event: ProgressEvent,
    },
    Finished {
        task_id: TaskId,
        result: TerminalResult,
    },
    ChannelFailed {
        task_id: TaskId,
        error: ClientError,
    },
    Saved {
        result: Result<SaveOutcome, ClientError>,
    },
    HistoryLoaded {
        result: Result<HistoryPage, ClientError>,
    },
    RecordLoaded {
        result: Result<ExtractedRecord, ClientError>,
    },
    RecordDeleted {
        id: String,
        result: Result<(), ClientError>,
    },
    StatsLoaded {
        result: Result<IngestStats, ClientError>,
    },
    ContentTypesLoaded {
        result: Result<Vec<ContentTypeInfo>, ClientError>,
    },
    SupportedSitesLoaded {
        result: Result<Vec<SupportedWebsite>, ClientError>,
    },
}

/// Transport or decoding failure; `message` is what the user gets to see.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: FailureKind,
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Generic message for a non-success status without a backend message.
    pub(crate) fn status(code: u16) -> Self {
        Self::new(
            FailureKind::HttpStatus(code),
            format!("Request failed with status {code}"),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    /// Progress stream ended before a terminal frame.
    ChannelClosed,
    /// No progress frame arrived within the idle timeout.
    IdleTimeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::ChannelClosed => write!(f, "progress channel closed"),
            FailureKind::IdleTimeout => write!(f, "progress channel idle"),
        }
    }
}

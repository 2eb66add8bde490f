use crate::model::{
    ContentTypeInfo, ExtractedRecord, HistoryPage, IngestStats, ProgressEvent, SaveOutcome,
    SourceKind, SubmissionId, SupportedWebsite, TaskId, TerminalResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User edited the source input box.
    InputChanged(String),
    /// User switched between URL and raw text input.
    SourceKindChanged(SourceKind),
    /// User picked a content-type hint; `"auto"` lets the backend decide.
    ContentTypeHintChanged(String),
    /// User submitted the current input for ingestion.
    Submitted,
    /// Backend accepted the submission and will report through the channel.
    SubmissionAccepted {
        submission: SubmissionId,
        task_id: TaskId,
    },
    /// Backend answered the submission synchronously.
    SubmissionCompleted {
        submission: SubmissionId,
        record: ExtractedRecord,
    },
    /// Submission request failed before any job was created.
    SubmissionFailed {
        submission: SubmissionId,
        message: String,
    },
    /// Progress channel delivered an intermediate status.
    JobProgress { task_id: TaskId, event: ProgressEvent },
    /// Progress channel delivered the terminal outcome.
    JobFinished { task_id: TaskId, result: TerminalResult },
    /// Progress channel broke before a terminal outcome.
    ChannelFailed {
        task_id: TaskId,
        message: Option<String>,
    },
    /// User abandoned the running job.
    DisconnectClicked,
    /// User cleared a finished job.
    ResetClicked,
    /// User asked to store the extracted record.
    SaveClicked,
    SaveFinished { result: Result<SaveOutcome, String> },
    /// Load a page of saved records.
    HistoryRequested { page_size: usize, ordering: String },
    HistoryLoaded { result: Result<HistoryPage, String> },
    RecordRequested { id: String },
    RecordLoaded { result: Result<ExtractedRecord, String> },
    DeleteClicked { id: String },
    RecordDeleted { id: String, result: Result<(), String> },
    /// Load stats, known content types and supported websites.
    CatalogRequested,
    StatsLoaded { result: Result<IngestStats, String> },
    ContentTypesLoaded { result: Result<Vec<ContentTypeInfo>, String> },
    SupportedSitesLoaded { result: Result<Vec<SupportedWebsite>, String> },
    /// User submitted a list of URLs, one per line.
    BatchSubmitted { raw: String, auto_save: bool },
    /// Restore batch items completed by an earlier run.
    RestoreCompletedBatch(Vec<crate::CompletedSourceSnapshot>),
}

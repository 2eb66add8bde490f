use crate::model::{ExtractedRecord, IngestionRequest, SubmissionId, TaskId};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Post the request to the ingestion endpoint for its source kind.
    Submit {
        submission: SubmissionId,
        request: IngestionRequest,
    },
    /// Attach the progress channel for an accepted job.
    Subscribe { task_id: TaskId },
    /// Tear the progress channel down without waiting for an outcome.
    Unsubscribe { task_id: TaskId },
    SaveRecord { record: ExtractedRecord },
    FetchHistory { page_size: usize, ordering: String },
    FetchRecord { id: String },
    DeleteRecord { id: String },
    FetchStats,
    FetchContentTypes,
    FetchSupportedSites,
}

use std::collections::BTreeSet;

use crate::content_type::select_template;
use crate::model::{
    Classification, ContentTypeInfo, ExtractedRecord, IngestStats, ProgressEvent, SourceKind,
    SubmissionId, SupportedWebsite, TaskId, AUTO_CONTENT_TYPE,
};
use crate::view_model::{
    AppViewModel, BatchItemView, BatchView, CatalogView, HistoryView, OutcomeView,
};

/// Lifecycle of the single foreground ingestion job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Waiting for the submission acknowledgement.
    Submitting,
    /// Progress channel attached to `task_id`.
    Connected { task_id: TaskId },
    /// A terminal outcome has been applied.
    Terminal,
}

impl Phase {
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Submitting | Phase::Connected { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed {
        record: ExtractedRecord,
        classification: Classification,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    NotSaved,
    Saving,
    Saved { id: Option<String> },
    Duplicate { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    Pending,
    Running,
    Succeeded {
        title: Option<String>,
        content_type: Option<String>,
    },
    Failed { message: String },
    Cancelled,
}

impl BatchStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, BatchStatus::Pending | BatchStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BatchItem {
    pub(crate) source: String,
    pub(crate) status: BatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Batch {
    pub(crate) items: Vec<BatchItem>,
    pub(crate) running: Option<usize>,
    pub(crate) auto_save: bool,
    pub(crate) skipped_duplicates: usize,
}

/// A batch source that finished successfully in an earlier run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSourceSnapshot {
    pub source: String,
    pub title: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    input: String,
    source_kind: SourceKind,
    content_type_hint: String,
    validation_error: Option<String>,
    phase: Phase,
    /// Submission awaiting its reply while `phase` is `Submitting`.
    pending_submission: Option<SubmissionId>,
    submissions_issued: u64,
    progress: Option<ProgressEvent>,
    outcome: Option<Outcome>,
    save: SaveState,
    history: Vec<ExtractedRecord>,
    history_count: usize,
    selected_record: Option<ExtractedRecord>,
    stats: Option<IngestStats>,
    content_types: Vec<ContentTypeInfo>,
    supported_sites: Vec<SupportedWebsite>,
    last_error: Option<String>,
    batch: Option<Batch>,
    completed_sources: Vec<CompletedSourceSnapshot>,
    seen_sources: BTreeSet<String>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            input: String::new(),
            source_kind: SourceKind::Url,
            content_type_hint: AUTO_CONTENT_TYPE.to_string(),
            validation_error: None,
            phase: Phase::Idle,
            pending_submission: None,
            submissions_issued: 0,
            progress: None,
            outcome: None,
            save: SaveState::NotSaved,
            history: Vec::new(),
            history_count: 0,
            selected_record: None,
            stats: None,
            content_types: Vec::new(),
            supported_sites: Vec::new(),
            last_error: None,
            batch: None,
            completed_sources: Vec::new(),
            seen_sources: BTreeSet::new(),
            dirty: false,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            phase: self.phase.clone(),
            loading: self.phase.is_busy(),
            input: self.input.clone(),
            source_kind: self.source_kind,
            content_type_hint: self.content_type_hint.clone(),
            validation_error: self.validation_error.clone(),
            progress: self.progress.clone(),
            outcome: self.outcome.as_ref().map(|outcome| match outcome {
                Outcome::Completed {
                    record,
                    classification,
                } => OutcomeView::Completed {
                    template: select_template(
                        classification
                            .content_type
                            .clone()
                            .or_else(|| record.content_type())
                            .as_deref(),
                    ),
                    record: record.clone(),
                    classification: classification.clone(),
                },
                Outcome::Failed { message } => OutcomeView::Failed {
                    message: message.clone(),
                },
            }),
            save: self.save.clone(),
            history: HistoryView {
                records: self.history.clone(),
                total: self.history_count,
                selected: self.selected_record.clone(),
            },
            catalog: CatalogView {
                stats: self.stats.clone(),
                content_types: self.content_types.clone(),
                supported_sites: self.supported_sites.clone(),
            },
            last_error: self.last_error.clone(),
            batch: self.batch.as_ref().map(|batch| BatchView {
                items: batch
                    .items
                    .iter()
                    .map(|item| BatchItemView {
                        source: item.source.clone(),
                        status: item.status.clone(),
                    })
                    .collect(),
                finished: batch.items.iter().all(|item| item.status.is_finished()),
                skipped_duplicates: batch.skipped_duplicates,
            }),
            dirty: self.dirty,
        }
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn attached_task(&self) -> Option<&TaskId> {
        match &self.phase {
            Phase::Connected { task_id } => Some(task_id),
            _ => None,
        }
    }

    pub(crate) fn input(&self) -> &str {
        &self.input
    }

    pub(crate) fn set_input(&mut self, input: String) {
        self.input = input;
        self.validation_error = None;
        self.mark_dirty();
    }

    pub(crate) fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub(crate) fn set_source_kind(&mut self, kind: SourceKind) {
        self.source_kind = kind;
        self.validation_error = None;
        self.mark_dirty();
    }

    pub(crate) fn content_type_hint(&self) -> &str {
        &self.content_type_hint
    }

    pub(crate) fn set_content_type_hint(&mut self, hint: String) {
        self.content_type_hint = hint;
        self.mark_dirty();
    }

    pub(crate) fn set_validation_error(&mut self, message: String) {
        self.validation_error = Some(message);
        self.mark_dirty();
    }

    /// Starts a new foreground job, clearing whatever the previous one left.
    pub(crate) fn begin_submission(&mut self) -> SubmissionId {
        self.submissions_issued += 1;
        let submission = SubmissionId::new(self.submissions_issued);
        self.phase = Phase::Submitting;
        self.pending_submission = Some(submission);
        self.validation_error = None;
        self.progress = None;
        self.outcome = None;
        self.save = SaveState::NotSaved;
        self.mark_dirty();
        submission
    }

    /// True when `submission` is the one the current `Submitting` phase waits for.
    pub(crate) fn awaits(&self, submission: SubmissionId) -> bool {
        self.phase == Phase::Submitting && self.pending_submission == Some(submission)
    }

    pub(crate) fn attach(&mut self, task_id: TaskId) {
        self.phase = Phase::Connected { task_id };
        self.pending_submission = None;
        self.mark_dirty();
    }

    pub(crate) fn apply_progress(&mut self, event: ProgressEvent) {
        self.progress = Some(event);
        self.mark_dirty();
    }

    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.phase = Phase::Terminal;
        self.pending_submission = None;
        self.outcome = Some(outcome);
        self.mark_dirty();
    }

    pub(crate) fn detach(&mut self) {
        self.phase = Phase::Idle;
        self.pending_submission = None;
        self.progress = None;
        self.mark_dirty();
    }

    pub(crate) fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.progress = None;
        self.outcome = None;
        self.save = SaveState::NotSaved;
        self.mark_dirty();
    }

    pub(crate) fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub(crate) fn save_state(&self) -> &SaveState {
        &self.save
    }

    pub(crate) fn set_save_state(&mut self, save: SaveState) {
        self.save = save;
        self.mark_dirty();
    }

    pub(crate) fn set_history(&mut self, records: Vec<ExtractedRecord>, total: usize) {
        self.history = records;
        self.history_count = total;
        self.mark_dirty();
    }

    pub(crate) fn set_selected_record(&mut self, record: ExtractedRecord) {
        self.selected_record = Some(record);
        self.mark_dirty();
    }

    pub(crate) fn remove_record(&mut self, id: &str) {
        let before = self.history.len();
        self.history.retain(|record| record.id().as_deref() != Some(id));
        let removed = before - self.history.len();
        self.history_count = self.history_count.saturating_sub(removed);
        if self
            .selected_record
            .as_ref()
            .is_some_and(|record| record.id().as_deref() == Some(id))
        {
            self.selected_record = None;
        }
        self.mark_dirty();
    }

    pub(crate) fn set_stats(&mut self, stats: IngestStats) {
        self.stats = Some(stats);
        self.mark_dirty();
    }

    pub(crate) fn set_content_types(&mut self, content_types: Vec<ContentTypeInfo>) {
        self.content_types = content_types;
        self.mark_dirty();
    }

    pub(crate) fn set_supported_sites(&mut self, sites: Vec<SupportedWebsite>) {
        self.supported_sites = sites;
        self.mark_dirty();
    }

    pub(crate) fn set_last_error(&mut self, message: String) {
        self.last_error = Some(message);
        self.mark_dirty();
    }

    pub(crate) fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn batch_mut(&mut self) -> Option<&mut Batch> {
        self.batch.as_mut()
    }

    pub(crate) fn set_batch(&mut self, batch: Batch) {
        self.batch = Some(batch);
        self.mark_dirty();
    }

    /// Records `source` as seen; returns false when it was already known.
    pub(crate) fn remember_source(&mut self, source: &str) -> bool {
        self.seen_sources.insert(normalize_url_for_dedupe(source))
    }

    pub(crate) fn record_completed_source(&mut self, snapshot: CompletedSourceSnapshot) {
        self.completed_sources.push(snapshot);
    }

    pub(crate) fn restore_completed_sources(&mut self, snapshots: Vec<CompletedSourceSnapshot>) {
        for snapshot in snapshots {
            if self.remember_source(&snapshot.source) {
                self.completed_sources.push(snapshot);
            }
        }
        self.mark_dirty();
    }

    /// Batch sources that completed successfully, for persistence across runs.
    pub fn completed_sources_snapshot(&self) -> Vec<CompletedSourceSnapshot> {
        self.completed_sources.clone()
    }
}

/// Normalizes URLs so trivially different spellings de-duplicate:
/// surrounding whitespace, scheme/host case and a trailing slash are ignored.
pub fn normalize_url_for_dedupe(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(parsed) => {
            let mut normalized = parsed.to_string();
            if normalized.ends_with('/') && parsed.query().is_none() && parsed.fragment().is_none()
            {
                normalized.pop();
            }
            normalized
        }
        Err(_) => trimmed.trim_end_matches('/').to_ascii_lowercase(),
    }
}

use collector_logging::{collector_debug, collector_info, collector_warn};

use crate::model::{
    Classification, IngestionRequest, SaveOutcome, SourceKind, TaskId, TerminalResult,
    ValidationError,
};
use crate::state::{Batch, BatchItem, BatchStatus, CompletedSourceSnapshot, Outcome, SaveState};
use crate::{AppState, Effect, Msg, Phase};

/// Message shown when the progress channel drops without saying why.
pub const CHANNEL_LOST_MESSAGE: &str = "Connection to progress channel lost";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(input) => {
            state.set_input(input);
            Vec::new()
        }
        Msg::SourceKindChanged(kind) => {
            state.set_source_kind(kind);
            Vec::new()
        }
        Msg::ContentTypeHintChanged(hint) => {
            state.set_content_type_hint(hint);
            Vec::new()
        }
        Msg::Submitted => {
            if state.phase().is_busy() {
                collector_debug!("submission ignored: a job is already running");
                return (state, Vec::new());
            }
            match build_request(state.source_kind(), state.input(), state.content_type_hint()) {
                Ok(request) => {
                    let submission = state.begin_submission();
                    vec![Effect::Submit {
                        submission,
                        request,
                    }]
                }
                Err(err) => {
                    state.set_validation_error(err.to_string());
                    Vec::new()
                }
            }
        }
        Msg::SubmissionAccepted {
            submission,
            task_id,
        } => {
            if !state.awaits(submission) {
                // No channel was opened for it, so there is nothing to tear down.
                collector_warn!(
                    task = task_id;
                    "ignoring acceptance of stale submission {}",
                    submission
                );
                return (state, Vec::new());
            }
            collector_info!(task = task_id; "accepted, attaching progress channel");
            state.attach(task_id.clone());
            vec![Effect::Subscribe { task_id }]
        }
        Msg::SubmissionCompleted { submission, record } => {
            if !state.awaits(submission) {
                collector_debug!("dropping result of stale submission {}", submission);
                return (state, Vec::new());
            }
            let classification = Classification {
                content_type: record.content_type(),
                page_type: record.page_type(),
                confidence: record.number(&["confidence"]),
            };
            finish_job(
                &mut state,
                Outcome::Completed {
                    record,
                    classification,
                },
            )
        }
        Msg::SubmissionFailed {
            submission,
            message,
        } => {
            if !state.awaits(submission) {
                collector_debug!("dropping failure of stale submission {}", submission);
                return (state, Vec::new());
            }
            finish_job(&mut state, Outcome::Failed { message })
        }
        Msg::JobProgress { task_id, event } => {
            if !is_attached(&state, &task_id) {
                collector_debug!(task = task_id; "dropping progress for a detached task");
                return (state, Vec::new());
            }
            state.apply_progress(event);
            Vec::new()
        }
        Msg::JobFinished { task_id, result } => {
            if !is_attached(&state, &task_id) {
                collector_debug!(task = task_id; "dropping terminal event for a detached task");
                return (state, Vec::new());
            }
            let outcome = match result {
                TerminalResult::Success {
                    record,
                    classification,
                } => Outcome::Completed {
                    record,
                    classification,
                },
                TerminalResult::Failure { message } => Outcome::Failed { message },
            };
            finish_job(&mut state, outcome)
        }
        Msg::ChannelFailed { task_id, message } => {
            if !is_attached(&state, &task_id) {
                return (state, Vec::new());
            }
            let message = message.unwrap_or_else(|| CHANNEL_LOST_MESSAGE.to_string());
            finish_job(&mut state, Outcome::Failed { message })
        }
        Msg::DisconnectClicked => disconnect(&mut state),
        Msg::ResetClicked => {
            if *state.phase() == Phase::Terminal {
                state.reset();
            }
            Vec::new()
        }
        Msg::SaveClicked => {
            let record = match state.outcome() {
                Some(Outcome::Completed { record, .. }) => record.clone(),
                _ => return (state, Vec::new()),
            };
            match state.save_state() {
                SaveState::Saving | SaveState::Saved { .. } | SaveState::Duplicate { .. } => {
                    Vec::new()
                }
                SaveState::NotSaved | SaveState::Failed { .. } => {
                    state.set_save_state(SaveState::Saving);
                    vec![Effect::SaveRecord { record }]
                }
            }
        }
        Msg::SaveFinished { result } => {
            let next = match result {
                Ok(SaveOutcome::Saved(record)) => SaveState::Saved { id: record.id() },
                Ok(SaveOutcome::Duplicate { message }) => SaveState::Duplicate { message },
                Err(message) => SaveState::Failed { message },
            };
            if *state.save_state() == SaveState::Saving {
                state.set_save_state(next);
            } else {
                // Auto-saves issued by a batch finish after the foreground moved on.
                match next {
                    SaveState::Duplicate { message } | SaveState::Failed { message } => {
                        state.set_last_error(message)
                    }
                    _ => {}
                }
            }
            Vec::new()
        }
        Msg::HistoryRequested {
            page_size,
            ordering,
        } => {
            state.clear_last_error();
            vec![Effect::FetchHistory {
                page_size,
                ordering,
            }]
        }
        Msg::HistoryLoaded { result } => {
            match result {
                Ok(page) => {
                    let total = page.count.max(page.results.len());
                    state.set_history(page.results, total);
                }
                Err(message) => state.set_last_error(message),
            }
            Vec::new()
        }
        Msg::RecordRequested { id } => vec![Effect::FetchRecord { id }],
        Msg::RecordLoaded { result } => {
            match result {
                Ok(record) => state.set_selected_record(record),
                Err(message) => state.set_last_error(message),
            }
            Vec::new()
        }
        Msg::DeleteClicked { id } => vec![Effect::DeleteRecord { id }],
        Msg::RecordDeleted { id, result } => {
            match result {
                Ok(()) => state.remove_record(&id),
                Err(message) => state.set_last_error(message),
            }
            Vec::new()
        }
        Msg::CatalogRequested => vec![
            Effect::FetchStats,
            Effect::FetchContentTypes,
            Effect::FetchSupportedSites,
        ],
        Msg::StatsLoaded { result } => {
            match result {
                Ok(stats) => state.set_stats(stats),
                Err(message) => state.set_last_error(message),
            }
            Vec::new()
        }
        Msg::ContentTypesLoaded { result } => {
            match result {
                Ok(content_types) => state.set_content_types(content_types),
                Err(message) => state.set_last_error(message),
            }
            Vec::new()
        }
        Msg::SupportedSitesLoaded { result } => {
            match result {
                Ok(sites) => state.set_supported_sites(sites),
                Err(message) => state.set_last_error(message),
            }
            Vec::new()
        }
        Msg::BatchSubmitted { raw, auto_save } => submit_batch(&mut state, &raw, auto_save),
        Msg::RestoreCompletedBatch(snapshots) => {
            state.restore_completed_sources(snapshots);
            Vec::new()
        }
    };

    (state, effects)
}

fn build_request(
    kind: SourceKind,
    input: &str,
    hint: &str,
) -> Result<IngestionRequest, ValidationError> {
    let request = IngestionRequest::new(kind, input, hint)?;
    if kind == SourceKind::Url {
        validate_url(request.payload())?;
    }
    Ok(request)
}

fn validate_url(raw: &str) -> Result<(), ValidationError> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(ValidationError::InvalidUrl(raw.to_string())),
    }
}

fn is_attached(state: &AppState, task_id: &TaskId) -> bool {
    state.attached_task() == Some(task_id)
}

/// Applies the one terminal outcome of the foreground job and, when a batch
/// is running, settles its item and starts the next one.
fn finish_job(state: &mut AppState, outcome: Outcome) -> Vec<Effect> {
    let mut effects = Vec::new();
    let mut completed = None;

    if let Some(batch) = state.batch_mut() {
        if let Some(index) = batch.running.take() {
            let item = &mut batch.items[index];
            item.status = match &outcome {
                Outcome::Completed {
                    record,
                    classification,
                } => {
                    let title = record.title();
                    let content_type = classification
                        .content_type
                        .clone()
                        .or_else(|| record.content_type());
                    completed = Some(CompletedSourceSnapshot {
                        source: item.source.clone(),
                        title: title.clone(),
                        content_type: content_type.clone(),
                    });
                    if batch.auto_save {
                        effects.push(Effect::SaveRecord {
                            record: record.clone(),
                        });
                    }
                    BatchStatus::Succeeded {
                        title,
                        content_type,
                    }
                }
                Outcome::Failed { message } => BatchStatus::Failed {
                    message: message.clone(),
                },
            };
        }
    }

    if let Some(snapshot) = completed {
        state.record_completed_source(snapshot);
    }
    state.finish(outcome);
    effects.extend(start_next_batch_item(state));
    effects
}

fn start_next_batch_item(state: &mut AppState) -> Vec<Effect> {
    let hint = state.content_type_hint().to_string();
    let Some(batch) = state.batch_mut() else {
        return Vec::new();
    };

    let mut request = None;
    while let Some(index) = batch
        .items
        .iter()
        .position(|item| item.status == BatchStatus::Pending)
    {
        let item = &mut batch.items[index];
        match build_request(SourceKind::Url, &item.source, &hint) {
            Ok(built) => {
                item.status = BatchStatus::Running;
                batch.running = Some(index);
                request = Some(built);
                break;
            }
            Err(err) => {
                item.status = BatchStatus::Failed {
                    message: err.to_string(),
                };
            }
        }
    }

    match request {
        Some(request) => {
            let submission = state.begin_submission();
            vec![Effect::Submit {
                submission,
                request,
            }]
        }
        None => {
            state.mark_dirty();
            Vec::new()
        }
    }
}

fn submit_batch(state: &mut AppState, raw: &str, auto_save: bool) -> Vec<Effect> {
    if state.phase().is_busy() {
        collector_debug!("batch ignored: a job is already running");
        return Vec::new();
    }

    let sources: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    if sources.is_empty() {
        state.set_validation_error(ValidationError::EmptySource.to_string());
        return Vec::new();
    }

    let mut batch = Batch {
        auto_save,
        ..Batch::default()
    };
    for source in sources {
        if state.remember_source(source) {
            batch.items.push(BatchItem {
                source: source.to_string(),
                status: BatchStatus::Pending,
            });
        } else {
            batch.skipped_duplicates += 1;
        }
    }
    collector_info!(
        "batch queued: {} sources, {} duplicates skipped",
        batch.items.len(),
        batch.skipped_duplicates
    );

    state.set_batch(batch);
    start_next_batch_item(state)
}

fn disconnect(state: &mut AppState) -> Vec<Effect> {
    let effects = match state.phase().clone() {
        Phase::Connected { task_id } => {
            collector_info!(task = task_id; "disconnecting");
            vec![Effect::Unsubscribe { task_id }]
        }
        Phase::Submitting => Vec::new(),
        Phase::Idle | Phase::Terminal => return Vec::new(),
    };

    if let Some(batch) = state.batch_mut() {
        batch.running = None;
        for item in &mut batch.items {
            if !item.status.is_finished() {
                item.status = BatchStatus::Cancelled;
            }
        }
    }
    state.detach();
    effects
}

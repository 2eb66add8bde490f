use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use collector_core::{
    ContentTypeInfo, Effect, ExtractedRecord, HistoryPage, IngestStats, IngestionRequest,
    ProgressEvent, SaveOutcome, SourceKind, SubmissionId, SupportedWebsite, TaskId,
};
use collector_engine::{
    ChannelEnd, ClientError, EngineEvent, EngineHandle, IngestApi, ProgressChannel, ProgressSink,
    SubmitResponse,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct FakeApi;

#[async_trait::async_trait]
impl IngestApi for FakeApi {
    async fn submit(&self, _request: &IngestionRequest) -> Result<SubmitResponse, ClientError> {
        Ok(SubmitResponse::Accepted {
            task_id: TaskId::new("job-1"),
        })
    }
    async fn save(&self, record: &ExtractedRecord) -> Result<SaveOutcome, ClientError> {
        Ok(SaveOutcome::Saved(record.clone()))
    }
    async fn history(&self, _page_size: usize, _ordering: &str) -> Result<HistoryPage, ClientError> {
        Ok(HistoryPage::default())
    }
    async fn record(&self, id: &str) -> Result<ExtractedRecord, ClientError> {
        Ok(ExtractedRecord::from_value(json!({ "id": id })))
    }
    async fn delete_record(&self, _id: &str) -> Result<(), ClientError> {
        Ok(())
    }
    async fn stats(&self) -> Result<IngestStats, ClientError> {
        Ok(IngestStats::default())
    }
    async fn content_types(&self) -> Result<Vec<ContentTypeInfo>, ClientError> {
        Ok(Vec::new())
    }
    async fn supported_websites(&self) -> Result<Vec<SupportedWebsite>, ClientError> {
        Ok(Vec::new())
    }
}

/// Emits one progress event and then waits until it is cancelled.
#[derive(Default)]
struct HangingChannel {
    cancelled: AtomicBool,
}

#[async_trait::async_trait]
impl ProgressChannel for HangingChannel {
    async fn follow(
        &self,
        task_id: &TaskId,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<ChannelEnd, ClientError> {
        sink.emit(EngineEvent::Progress {
            task_id: task_id.clone(),
            event: ProgressEvent::new("Fetching", Some(5.0)),
        });
        cancel.cancelled().await;
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(ChannelEnd::Cancelled)
    }
}

#[test]
fn effects_round_trip_through_the_engine_thread() {
    collector_logging::initialize_for_tests();
    let channel = Arc::new(HangingChannel::default());
    let engine = EngineHandle::with_backends(Arc::new(FakeApi), channel.clone()).unwrap();

    let request = IngestionRequest::new(SourceKind::Url, "https://x.test/", "auto").unwrap();
    let submission = SubmissionId::new(7);
    engine.execute(Effect::Submit {
        submission,
        request,
    });
    let Some(EngineEvent::Submitted {
        submission: answered,
        result: Ok(SubmitResponse::Accepted { .. }),
    }) = engine.recv_timeout(WAIT)
    else {
        panic!("expected the acceptance");
    };
    assert_eq!(answered, submission);

    engine.execute(Effect::FetchRecord { id: "9".into() });
    let Some(EngineEvent::RecordLoaded { result: Ok(record) }) = engine.recv_timeout(WAIT) else {
        panic!("expected the record");
    };
    assert_eq!(record.id().as_deref(), Some("9"));
}

#[test]
fn unsubscribe_cancels_the_open_channel() {
    let channel = Arc::new(HangingChannel::default());
    let engine = EngineHandle::with_backends(Arc::new(FakeApi), channel.clone()).unwrap();

    let task_id = TaskId::new("job-1");
    engine.execute(Effect::Subscribe {
        task_id: task_id.clone(),
    });
    assert!(matches!(
        engine.recv_timeout(WAIT),
        Some(EngineEvent::Progress { .. })
    ));

    engine.execute(Effect::Unsubscribe { task_id });
    let deadline = std::time::Instant::now() + WAIT;
    while !channel.cancelled.load(Ordering::SeqCst) && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(channel.cancelled.load(Ordering::SeqCst));
    // A cancelled channel reports neither an outcome nor a failure.
    assert!(engine.recv_timeout(Duration::from_millis(100)).is_none());
}

/// Counts channels opened and channels torn down by cancellation.
#[derive(Default)]
struct CountingChannel {
    started: AtomicUsize,
    cancelled: AtomicUsize,
}

#[async_trait::async_trait]
impl ProgressChannel for CountingChannel {
    async fn follow(
        &self,
        _task_id: &TaskId,
        _sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<ChannelEnd, ClientError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        cancel.cancelled().await;
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(ChannelEnd::Cancelled)
    }
}

#[test]
fn unsubscribe_right_after_subscribe_always_cancels() {
    const PAIRS: usize = 300;
    let channel = Arc::new(CountingChannel::default());
    let engine = EngineHandle::with_backends(Arc::new(FakeApi), channel.clone()).unwrap();

    for n in 0..PAIRS {
        let task_id = TaskId::new(format!("job-{n}"));
        engine.execute(Effect::Subscribe {
            task_id: task_id.clone(),
        });
        engine.execute(Effect::Unsubscribe { task_id });
    }

    let deadline = std::time::Instant::now() + WAIT;
    while channel.cancelled.load(Ordering::SeqCst) < PAIRS && std::time::Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(channel.started.load(Ordering::SeqCst), PAIRS);
    assert_eq!(channel.cancelled.load(Ordering::SeqCst), PAIRS);
}

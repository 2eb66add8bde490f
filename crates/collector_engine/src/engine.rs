use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use collector_core::{Effect, TaskId};
use collector_logging::{collector_debug, collector_info, collector_warn};
use tokio_util::sync::CancellationToken;

use crate::client::{ClientSettings, IngestApi, ReqwestIngestClient};
use crate::progress::{ChannelProgressSink, ProgressChannel, SseProgressChannel};
use crate::{ClientError, EngineEvent};

#[derive(Debug, thiserror::Error)]
pub enum EngineStartError {
    #[error("could not start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("invalid client settings: {0}")]
    Settings(#[from] ClientError),
}

type Subscriptions = Arc<Mutex<HashMap<TaskId, (u64, CancellationToken)>>>;

/// Runs effects on a dedicated tokio runtime and reports back through
/// [`EngineEvent`]s, so the caller's loop stays synchronous.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<Effect>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: &ClientSettings) -> Result<Self, EngineStartError> {
        let api = Arc::new(ReqwestIngestClient::new(settings)?);
        let channel = Arc::new(SseProgressChannel::new(settings)?);
        Self::with_backends(api, channel)
    }

    /// Builds a handle over arbitrary backends.
    pub fn with_backends(
        api: Arc<dyn IngestApi>,
        channel: Arc<dyn ProgressChannel>,
    ) -> Result<Self, EngineStartError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Effect>();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let subscriptions: Subscriptions = Arc::default();

        thread::spawn(move || {
            let mut next_seq = 0u64;
            while let Ok(effect) = cmd_rx.recv() {
                // Channel bookkeeping happens here, in command order, so an
                // unsubscribe always sees the token of the subscribe before it.
                match effect {
                    Effect::Subscribe { task_id } => {
                        next_seq += 1;
                        let token = register(&subscriptions, &task_id, next_seq);
                        runtime.spawn(follow(
                            channel.clone(),
                            subscriptions.clone(),
                            task_id,
                            next_seq,
                            token,
                            event_tx.clone(),
                        ));
                    }
                    Effect::Unsubscribe { task_id } => unsubscribe(&subscriptions, &task_id),
                    effect => {
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            if let Some(event) = request(api.as_ref(), effect).await {
                                let _ = event_tx.send(event);
                            }
                        });
                    }
                }
            }
            collector_debug!("engine command channel closed");
            // Cancel what is still streaming before the runtime goes away.
            for (_, token) in lock(&subscriptions).drain().map(|(_, entry)| entry) {
                token.cancel();
            }
            runtime.shutdown_timeout(Duration::from_secs(1));
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn execute(&self, effect: Effect) {
        if self.cmd_tx.send(effect).is_err() {
            collector_warn!("engine thread is gone; effect dropped");
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

fn lock(
    subscriptions: &Subscriptions,
) -> std::sync::MutexGuard<'_, HashMap<TaskId, (u64, CancellationToken)>> {
    // A panicked holder cannot leave the map half-updated.
    subscriptions
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Stores a fresh token for `task_id`, cancelling any channel it replaces.
fn register(subscriptions: &Subscriptions, task_id: &TaskId, seq: u64) -> CancellationToken {
    let token = CancellationToken::new();
    let previous = lock(subscriptions).insert(task_id.clone(), (seq, token.clone()));
    if let Some((_, previous)) = previous {
        previous.cancel();
    }
    token
}

fn unsubscribe(subscriptions: &Subscriptions, task_id: &TaskId) {
    match lock(subscriptions).remove(task_id) {
        Some((_, token)) => {
            collector_info!(task = task_id; "unsubscribing");
            token.cancel();
        }
        None => collector_debug!(task = task_id; "no open channel to close"),
    }
}

async fn follow(
    channel: Arc<dyn ProgressChannel>,
    subscriptions: Subscriptions,
    task_id: TaskId,
    seq: u64,
    token: CancellationToken,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let sink = ChannelProgressSink::new(event_tx.clone());
    let result = channel.follow(&task_id, &sink, token).await;
    {
        let mut active = lock(&subscriptions);
        // A resubscription may have replaced this entry meanwhile.
        if active.get(&task_id).is_some_and(|(current, _)| *current == seq) {
            active.remove(&task_id);
        }
    }
    match result {
        Ok(end) => collector_debug!(task = task_id; "channel ended: {:?}", end),
        Err(error) => {
            collector_warn!(task = task_id; "channel failed: {}", error);
            let _ = event_tx.send(EngineEvent::ChannelFailed { task_id, error });
        }
    }
}

/// Performs one request effect; channel effects never reach here.
async fn request(api: &dyn IngestApi, effect: Effect) -> Option<EngineEvent> {
    let event = match effect {
        Effect::Submit {
            submission,
            request,
        } => EngineEvent::Submitted {
            submission,
            result: api.submit(&request).await,
        },
        Effect::Subscribe { .. } | Effect::Unsubscribe { .. } => return None,
        Effect::SaveRecord { record } => EngineEvent::Saved {
            result: api.save(&record).await,
        },
        Effect::FetchHistory {
            page_size,
            ordering,
        } => EngineEvent::HistoryLoaded {
            result: api.history(page_size, &ordering).await,
        },
        Effect::FetchRecord { id } => EngineEvent::RecordLoaded {
            result: api.record(&id).await,
        },
        Effect::DeleteRecord { id } => {
            let result = api.delete_record(&id).await;
            EngineEvent::RecordDeleted { id, result }
        }
        Effect::FetchStats => EngineEvent::StatsLoaded {
            result: api.stats().await,
        },
        Effect::FetchContentTypes => EngineEvent::ContentTypesLoaded {
            result: api.content_types().await,
        },
        Effect::FetchSupportedSites => EngineEvent::SupportedSitesLoaded {
            result: api.supported_websites().await,
        },
    };
    Some(event)
}

use std::time::Duration;

use collector_core::{Effect, Msg};
use collector_engine::{ClientSettings, EngineEvent, EngineHandle, EngineStartError, SubmitResponse};
use collector_logging::{collector_debug, collector_info};

/// Hands effects to the engine and turns its events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    in_flight: usize,
}

impl EffectRunner {
    pub fn new(settings: &ClientSettings) -> Result<Self, EngineStartError> {
        Ok(Self {
            engine: EngineHandle::new(settings)?,
            in_flight: 0,
        })
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match &effect {
                Effect::Submit {
                    submission,
                    request,
                } => {
                    collector_info!(
                        "Submit {} kind={:?} payload_len={} content_type={:?}",
                        submission,
                        request.kind(),
                        request.payload().len(),
                        request.content_type()
                    );
                }
                other => collector_debug!("{:?}", other),
            }
            if expects_reply(&effect) {
                self.in_flight += 1;
            }
            self.engine.execute(effect);
        }
    }

    /// Requests sent to the engine that have not answered yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn next_msg(&mut self, timeout: Duration) -> Option<Msg> {
        let event = self.engine.recv_timeout(timeout)?;
        if answers_request(&event) {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        Some(to_msg(event))
    }
}

fn expects_reply(effect: &Effect) -> bool {
    !matches!(effect, Effect::Subscribe { .. } | Effect::Unsubscribe { .. })
}

fn answers_request(event: &EngineEvent) -> bool {
    !matches!(
        event,
        EngineEvent::Progress { .. } | EngineEvent::Finished { .. } | EngineEvent::ChannelFailed { .. }
    )
}

pub(crate) fn to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::Submitted { submission, result } => match result {
            Ok(SubmitResponse::Accepted { task_id }) => Msg::SubmissionAccepted {
                submission,
                task_id,
            },
            Ok(SubmitResponse::Completed { record }) => Msg::SubmissionCompleted {
                submission,
                record,
            },
            Err(err) => Msg::SubmissionFailed {
                submission,
                message: err.message,
            },
        },
        EngineEvent::Progress { task_id, event } => Msg::JobProgress { task_id, event },
        EngineEvent::Finished { task_id, result } => Msg::JobFinished { task_id, result },
        EngineEvent::ChannelFailed { task_id, error } => Msg::ChannelFailed {
            task_id,
            message: Some(error.message).filter(|m| !m.trim().is_empty()),
        },
        EngineEvent::Saved { result } => Msg::SaveFinished {
            result: result.map_err(|e| e.message),
        },
        EngineEvent::HistoryLoaded { result } => Msg::HistoryLoaded {
            result: result.map_err(|e| e.message),
        },
        EngineEvent::RecordLoaded { result } => Msg::RecordLoaded {
            result: result.map_err(|e| e.message),
        },
        EngineEvent::RecordDeleted { id, result } => Msg::RecordDeleted {
            id,
            result: result.map_err(|e| e.message),
        },
        EngineEvent::StatsLoaded { result } => Msg::StatsLoaded {
            result: result.map_err(|e| e.message),
        },
        EngineEvent::ContentTypesLoaded { result } => Msg::ContentTypesLoaded {
            result: result.map_err(|e| e.message),
        },
        EngineEvent::SupportedSitesLoaded { result } => Msg::SupportedSitesLoaded {
            result: result.map_err(|e| e.message),
        },
    }
}

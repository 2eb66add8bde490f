use std::sync::Once;

use collector_core::{
    update, AppState, Effect, ExtractedRecord, IngestionRequest, Msg, OutcomeView, Phase,
    SourceKind, SubmissionId, Template, ValidationError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(collector_logging::initialize_for_tests);
}

fn submit(state: AppState, kind: SourceKind, input: &str) -> (AppState, Vec<Effect>) {
    let (state, _) = update(state, Msg::SourceKindChanged(kind));
    let (state, _) = update(state, Msg::InputChanged(input.to_string()));
    update(state, Msg::Submitted)
}

fn submission_of(effects: &[Effect]) -> SubmissionId {
    match effects {
        [Effect::Submit { submission, .. }] => *submission,
        other => panic!("expected one submit effect, got {other:?}"),
    }
}

#[test]
fn empty_source_is_rejected_without_effects() {
    init_logging();
    for input in ["", "   ", "\n\t"] {
        let (next, effects) = submit(AppState::new(), SourceKind::Text, input);
        let view = next.view();
        assert!(effects.is_empty());
        assert_eq!(view.phase, Phase::Idle);
        assert_eq!(
            view.validation_error,
            Some(ValidationError::EmptySource.to_string())
        );
    }
}

#[test]
fn malformed_url_is_rejected_without_effects() {
    init_logging();
    let (next, effects) = submit(AppState::new(), SourceKind::Url, "not a url");
    assert!(effects.is_empty());
    assert!(next
        .view()
        .validation_error
        .unwrap()
        .starts_with("invalid URL"));

    let (_, effects) = submit(AppState::new(), SourceKind::Url, "ftp://example.com/x");
    assert!(effects.is_empty());
}

#[test]
fn editing_input_clears_validation_error() {
    init_logging();
    let (state, _) = submit(AppState::new(), SourceKind::Url, "");
    let (state, _) = update(state, Msg::InputChanged("https://a.test".into()));
    assert_eq!(state.view().validation_error, None);
}

#[test]
fn url_submission_emits_request_with_auto_hint_as_none() {
    init_logging();
    let (next, effects) = submit(AppState::new(), SourceKind::Url, " https://example.com/listing/1 ");
    assert_eq!(
        effects,
        vec![Effect::Submit {
            submission: SubmissionId::new(1),
            request: IngestionRequest::new(SourceKind::Url, "https://example.com/listing/1", "auto")
                .unwrap()
        }]
    );
    let view = next.view();
    assert_eq!(view.phase, Phase::Submitting);
    assert!(view.loading);
    match &effects[0] {
        Effect::Submit { request, .. } => assert_eq!(request.content_type(), None),
        other => panic!("unexpected effect {other:?}"),
    }
}

#[test]
fn explicit_hint_is_carried_on_text_submission() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::ContentTypeHintChanged("tour".into()));
    let (_, effects) = submit(state, SourceKind::Text, "3 day Ha Long bay cruise");
    match &effects[..] {
        [Effect::Submit { request, .. }] => {
            assert_eq!(request.kind(), SourceKind::Text);
            assert_eq!(request.content_type(), Some("tour"));
        }
        other => panic!("unexpected effects {other:?}"),
    }
}

#[test]
fn second_submission_while_busy_is_ignored() {
    init_logging();
    let (state, _) = submit(AppState::new(), SourceKind::Url, "https://a.test/1");
    let (state, effects) = update(state, Msg::Submitted);
    assert!(effects.is_empty());
    assert_eq!(state.view().phase, Phase::Submitting);
}

#[test]
fn synchronous_result_goes_straight_to_terminal() {
    init_logging();
    let (state, effects) = submit(AppState::new(), SourceKind::Text, "Pho bo, 50k VND");
    let record = ExtractedRecord::from_value(json!({
        "title": "Pho bo",
        "content_type": "restaurant"
    }));
    let (mut state, effects) = update(
        state,
        Msg::SubmissionCompleted {
            submission: submission_of(&effects),
            record: record.clone(),
        },
    );

    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Terminal);
    assert!(!view.loading);
    match view.outcome {
        Some(OutcomeView::Completed {
            template,
            record: shown,
            classification,
        }) => {
            assert_eq!(template, Template::Restaurant);
            assert_eq!(shown, record);
            assert_eq!(classification.content_type.as_deref(), Some("restaurant"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn submission_failure_surfaces_message_once() {
    init_logging();
    let (state, effects) = submit(AppState::new(), SourceKind::Url, "https://a.test/1");
    let submission = submission_of(&effects);
    let (state, _) = update(
        state,
        Msg::SubmissionFailed {
            submission,
            message: "Request failed with status 502".into(),
        },
    );
    assert_eq!(
        state.view().outcome,
        Some(OutcomeView::Failed {
            message: "Request failed with status 502".into()
        })
    );

    // A stray second failure must not replace the applied outcome.
    let (state, _) = update(
        state,
        Msg::SubmissionFailed {
            submission,
            message: "other".into(),
        },
    );
    assert_eq!(
        state.view().outcome,
        Some(OutcomeView::Failed {
            message: "Request failed with status 502".into()
        })
    );
}

#[test]
fn reset_returns_to_idle_and_allows_resubmission() {
    init_logging();
    let (state, effects) = submit(AppState::new(), SourceKind::Url, "https://a.test/1");
    let (state, _) = update(
        state,
        Msg::SubmissionFailed {
            submission: submission_of(&effects),
            message: "x".into(),
        },
    );
    let (state, _) = update(state, Msg::ResetClicked);
    let view = state.view();
    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(view.outcome, None);

    let (_, effects) = update(state, Msg::Submitted);
    assert_eq!(effects.len(), 1);
}

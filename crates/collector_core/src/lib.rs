//! Collector core: data model, pure state machine and presentation helpers.
mod content_type;
mod effect;
mod format;
mod model;
mod msg;
mod present;
mod state;
mod update;
mod view_model;

pub use content_type::{select_template, ContentType, Template};
pub use effect::Effect;
pub use format::{format_area, format_currency, format_relative_time};
pub use model::{
    Classification, ContentTypeInfo, ExtractedRecord, HistoryPage, IngestStats,
    IngestionRequest, ProgressEvent, SaveOutcome, SourceKind, SubmissionId, SupportedWebsite,
    TaskId, TerminalResult, ValidationError, AUTO_CONTENT_TYPE,
};
pub use msg::Msg;
pub use present::{present, RecordView, Row, Section, MAX_LISTED_IMAGES};
pub use state::{
    normalize_url_for_dedupe, AppState, BatchStatus, CompletedSourceSnapshot, Outcome, Phase,
    SaveState,
};
pub use update::{update, CHANNEL_LOST_MESSAGE};
pub use view_model::{
    AppViewModel, BatchItemView, BatchView, CatalogView, HistoryView, OutcomeView,
};

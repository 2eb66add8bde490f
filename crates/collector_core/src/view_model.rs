use crate::content_type::Template;
use crate::model::{
    Classification, ContentTypeInfo, ExtractedRecord, IngestStats, ProgressEvent, SourceKind,
    SupportedWebsite,
};
use crate::state::{BatchStatus, Phase, SaveState};

#[derive(Debug, Clone, PartialEq)]
pub struct AppViewModel {
    pub phase: Phase,
    pub loading: bool,
    pub input: String,
    pub source_kind: SourceKind,
    pub content_type_hint: String,
    pub validation_error: Option<String>,
    pub progress: Option<ProgressEvent>,
    pub outcome: Option<OutcomeView>,
    pub save: SaveState,
    pub history: HistoryView,
    pub catalog: CatalogView,
    pub last_error: Option<String>,
    pub batch: Option<BatchView>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeView {
    Completed {
        template: Template,
        record: ExtractedRecord,
        classification: Classification,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryView {
    pub records: Vec<ExtractedRecord>,
    pub total: usize,
    pub selected: Option<ExtractedRecord>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogView {
    pub stats: Option<IngestStats>,
    pub content_types: Vec<ContentTypeInfo>,
    pub supported_sites: Vec<SupportedWebsite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchView {
    pub items: Vec<BatchItemView>,
    pub finished: bool,
    pub skipped_duplicates: usize,
}

impl BatchView {
    pub fn succeeded(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.status, BatchStatus::Succeeded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.status, BatchStatus::Failed { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemView {
    pub source: String,
    pub status: BatchStatus,
}

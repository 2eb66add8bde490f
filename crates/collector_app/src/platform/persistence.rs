use std::fs;
use std::path::Path;

use collector_core::CompletedSourceSnapshot;
use collector_engine::AtomicFileWriter;
use collector_logging::{collector_info, collector_warn};
use serde::{Deserialize, Serialize};

pub(crate) const STATE_FILENAME: &str = ".collector_state.ron";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSource {
    source: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    completed: Vec<PersistedSource>,
}

/// Batch sources completed by earlier runs. A missing or unreadable state
/// file means nothing was completed yet.
pub(crate) fn load_completed_sources(state_dir: &Path) -> Vec<CompletedSourceSnapshot> {
    let path = state_dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            collector_warn!("could not read batch state {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    let state: PersistedState = match ron::from_str(&content) {
        Ok(state) => state,
        Err(err) => {
            collector_warn!("could not parse batch state {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    collector_info!(
        "loaded {} completed sources from {}",
        state.completed.len(),
        path.display()
    );
    state
        .completed
        .into_iter()
        .map(|item| CompletedSourceSnapshot {
            source: item.source,
            title: item.title,
            content_type: item.content_type,
        })
        .collect()
}

pub(crate) fn save_completed_sources(
    state_dir: &Path,
    completed: &[CompletedSourceSnapshot],
) -> anyhow::Result<()> {
    let state = PersistedState {
        completed: completed
            .iter()
            .map(|item| PersistedSource {
                source: item.source.clone(),
                title: item.title.clone(),
                content_type: item.content_type.clone(),
            })
            .collect(),
    };
    let content = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::new())?;
    AtomicFileWriter::new(state_dir).write(STATE_FILENAME, content.as_bytes())?;
    Ok(())
}

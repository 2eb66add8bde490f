use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use chrono::Utc;
use collector_core::{
    update, AppState, AppViewModel, BatchStatus, Classification, ExtractedRecord, Msg,
    OutcomeView, ProgressEvent, SourceKind,
};
use collector_engine::{export_records, ExportOptions};
use collector_logging::{collector_error, collector_info, collector_warn};

use super::effects::EffectRunner;
use super::{persistence, render};
use crate::cli::{BatchArgs, Cli, Command, HistoryArgs, SubmitArgs};

const POLL: Duration = Duration::from_millis(100);

pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = cli.connection.settings();
    collector_info!("collector starting against {}", settings.base_url);
    let runner = EffectRunner::new(&settings).context("could not start the ingestion engine")?;
    let mut app = App::new(runner);

    match cli.command {
        Command::Submit(args) => submit(&mut app, args),
        Command::Batch(args) => batch(&mut app, args),
        Command::History(args) => history(&mut app, args),
        Command::Show { id, json } => show(&mut app, id, json),
        Command::Delete { id } => delete(&mut app, id),
        Command::Stats => {
            app.request(Msg::CatalogRequested);
            let view = app.view();
            if view.catalog.stats.is_none() {
                bail!(failure_text(&view, "statistics unavailable"));
            }
            print!("{}", render::render_stats(&view.catalog, Utc::now()));
            Ok(ExitCode::SUCCESS)
        }
        Command::ContentTypes => {
            app.request(Msg::CatalogRequested);
            let view = app.view();
            if view.catalog.content_types.is_empty() {
                bail!(failure_text(&view, "no content types reported"));
            }
            print!("{}", render::render_content_types(&view.catalog));
            Ok(ExitCode::SUCCESS)
        }
        Command::Sites => {
            app.request(Msg::CatalogRequested);
            let view = app.view();
            if view.catalog.supported_sites.is_empty() {
                bail!(failure_text(&view, "no supported websites reported"));
            }
            print!("{}", render::render_sites(&view.catalog));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Owns the state machine and feeds it messages from the user and the engine.
struct App {
    state: AppState,
    runner: EffectRunner,
    last_progress: Option<ProgressEvent>,
    last_running: Option<String>,
    /// Directory receiving batch resume state, with how many sources it holds.
    persist: Option<(PathBuf, usize)>,
}

impl App {
    fn new(runner: EffectRunner) -> Self {
        Self {
            state: AppState::new(),
            runner,
            last_progress: None,
            last_running: None,
            persist: None,
        }
    }

    fn view(&self) -> AppViewModel {
        self.state.view()
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            self.render_changes(&state);
        }
        self.state = state;
        self.runner.run(effects);
    }

    fn render_changes(&mut self, state: &AppState) {
        let view = state.view();

        let running = view.batch.as_ref().and_then(|batch| {
            batch
                .items
                .iter()
                .find(|item| item.status == BatchStatus::Running)
                .map(|item| item.source.clone())
        });
        if running.is_some() && running != self.last_running {
            if let Some(source) = &running {
                eprintln!("==> {source}");
            }
            self.last_progress = None;
        }
        self.last_running = running;

        if view.progress.is_some() && view.progress != self.last_progress {
            if let Some(progress) = &view.progress {
                eprintln!("{}", render::render_progress(progress));
            }
            self.last_progress = view.progress.clone();
        }

        if let Some((dir, persisted)) = &mut self.persist {
            let completed = state.completed_sources_snapshot();
            if completed.len() != *persisted {
                match persistence::save_completed_sources(dir, &completed) {
                    Ok(()) => *persisted = completed.len(),
                    Err(err) => collector_error!("could not persist batch state: {:#}", err),
                }
            }
        }
    }

    fn is_settled(&self) -> bool {
        self.runner.in_flight() == 0 && !self.state.phase().is_busy()
    }

    /// Pumps engine events until no request or job is outstanding.
    /// Returns `false` when `deadline` passed first.
    fn settle(&mut self, deadline: Option<Instant>) -> bool {
        while !self.is_settled() {
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    (deadline - now).min(POLL)
                }
                None => POLL,
            };
            if let Some(msg) = self.runner.next_msg(wait) {
                self.dispatch(msg);
            }
        }
        true
    }

    /// Dispatches `msg` and waits for every reply it triggers.
    fn request(&mut self, msg: Msg) {
        self.dispatch(msg);
        self.settle(None);
    }
}

fn failure_text(view: &AppViewModel, fallback: &str) -> String {
    view.last_error
        .clone()
        .unwrap_or_else(|| fallback.to_string())
}

fn submit(app: &mut App, args: SubmitArgs) -> anyhow::Result<ExitCode> {
    let kind = if args.text {
        SourceKind::Text
    } else {
        SourceKind::Url
    };
    app.dispatch(Msg::SourceKindChanged(kind));
    app.dispatch(Msg::ContentTypeHintChanged(args.content_type));
    app.dispatch(Msg::InputChanged(args.source));
    app.dispatch(Msg::Submitted);

    if let Some(message) = app.view().validation_error {
        eprintln!("{message}");
        return Ok(ExitCode::from(2));
    }

    let deadline = args
        .max_wait
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    if !app.settle(deadline) {
        collector_warn!(
            "giving up on the running job after {}s",
            args.max_wait.unwrap_or_default()
        );
        app.dispatch(Msg::DisconnectClicked);
        eprintln!("No result in time; disconnected from the job");
        return Ok(ExitCode::FAILURE);
    }

    let view = app.view();
    match &view.outcome {
        Some(OutcomeView::Completed { record, .. }) if args.json => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        Some(outcome @ OutcomeView::Completed { .. }) => {
            print!("{}", render::render_outcome(outcome, Utc::now()));
        }
        Some(outcome @ OutcomeView::Failed { .. }) => {
            eprint!("{}", render::render_outcome(outcome, Utc::now()));
            return Ok(ExitCode::FAILURE);
        }
        None => bail!("the job ended without an outcome"),
    }

    if args.save {
        app.request(Msg::SaveClicked);
        if let Some(line) = render::render_save(&app.view().save) {
            eprintln!("{line}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn batch(app: &mut App, args: BatchArgs) -> anyhow::Result<ExitCode> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("could not read {}", args.file.display()))?;

    let completed = persistence::load_completed_sources(&args.state_dir);
    let already_done = completed.len();
    app.dispatch(Msg::RestoreCompletedBatch(completed));
    app.persist = Some((args.state_dir.clone(), already_done));

    app.dispatch(Msg::ContentTypeHintChanged(args.content_type));
    app.dispatch(Msg::BatchSubmitted {
        raw,
        auto_save: args.auto_save,
    });
    if let Some(message) = app.view().validation_error {
        eprintln!("{message}");
        return Ok(ExitCode::from(2));
    }

    app.settle(None);
    let view = app.view();
    let Some(batch) = &view.batch else {
        bail!("batch did not start");
    };
    print!("{}", render::render_batch(batch));
    if let Some(error) = &view.last_error {
        eprintln!("{error}");
    }
    Ok(if batch.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn history(app: &mut App, args: HistoryArgs) -> anyhow::Result<ExitCode> {
    app.request(Msg::HistoryRequested {
        page_size: args.page_size,
        ordering: args.ordering,
    });
    let view = app.view();
    if let Some(error) = &view.last_error {
        bail!(error.clone());
    }
    print!(
        "{}",
        render::render_history(&view.history.records, view.history.total, Utc::now())
    );

    if let Some(dir) = args.export {
        let options = ExportOptions {
            per_record_files: args.per_record_files,
            ..ExportOptions::default()
        };
        let summary = export_records(&view.history.records, &dir, &options)
            .with_context(|| format!("could not export to {}", dir.display()))?;
        eprintln!(
            "Exported {} records to {}",
            summary.record_count,
            summary.output_path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn show(app: &mut App, id: String, json: bool) -> anyhow::Result<ExitCode> {
    app.request(Msg::RecordRequested { id });
    let view = app.view();
    let Some(record) = &view.history.selected else {
        bail!(failure_text(&view, "record not found"));
    };
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        print!(
            "{}",
            render::render_record(record, &classification_of(record), Utc::now())
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn delete(app: &mut App, id: String) -> anyhow::Result<ExitCode> {
    app.request(Msg::DeleteClicked { id: id.clone() });
    if let Some(error) = app.view().last_error {
        bail!(error);
    }
    println!("Deleted record {id}");
    Ok(ExitCode::SUCCESS)
}

/// Saved records carry their classification as plain fields.
fn classification_of(record: &ExtractedRecord) -> Classification {
    Classification {
        content_type: record.content_type(),
        page_type: record.page_type(),
        confidence: record.number(&["confidence"]),
    }
}

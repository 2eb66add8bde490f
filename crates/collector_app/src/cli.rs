use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use collector_engine::{ClientSettings, DEFAULT_PROGRESS_PATH};

use crate::platform::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(name = "collector")]
#[command(about = "Submit listings and travel pages for extraction and browse saved records")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Where log output goes
    #[arg(long, value_enum, default_value = "file", global = true)]
    pub log: LogTarget,

    /// Log file used by `--log file` and `--log both`
    #[arg(long, default_value = "collector.log", global = true)]
    pub log_file: PathBuf,

    /// Log debug detail (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Root of the backend API
    #[arg(
        long,
        env = "COLLECTOR_API_URL",
        default_value = "http://localhost:8000/api",
        global = true
    )]
    pub api_url: String,

    /// Timeout for plain requests, in seconds
    #[arg(long, env = "COLLECTOR_REQUEST_TIMEOUT", default_value = "30", global = true)]
    pub request_timeout: u64,

    /// Longest silence tolerated on the progress channel, in seconds (0 waits forever)
    #[arg(
        long,
        env = "COLLECTOR_PROGRESS_IDLE_TIMEOUT",
        default_value = "120",
        global = true
    )]
    pub progress_idle_timeout: u64,

    /// Path of the server-sent progress stream under the API root; the task id is appended
    #[arg(
        long,
        env = "COLLECTOR_PROGRESS_PATH",
        default_value = DEFAULT_PROGRESS_PATH,
        global = true
    )]
    pub progress_path: String,
}

impl ConnectionArgs {
    pub fn settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout.max(1)),
            progress_idle_timeout: (self.progress_idle_timeout > 0)
                .then(|| Duration::from_secs(self.progress_idle_timeout)),
            progress_path: self.progress_path.clone(),
            ..ClientSettings::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl Cli {
    pub fn log_destination(&self) -> LogDestination {
        match self.log {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(self.log_file.clone()),
            LogTarget::Both => LogDestination::Both(self.log_file.clone()),
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit one URL (or a piece of text) and follow the extraction
    Submit(SubmitArgs),
    /// Submit every URL in a file, one per line, resuming earlier runs
    Batch(BatchArgs),
    /// List saved records, newest first
    History(HistoryArgs),
    /// Show one saved record
    Show {
        id: String,
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one saved record
    Delete { id: String },
    /// Show today's ingestion statistics
    Stats,
    /// List the content types the backend can extract
    ContentTypes,
    /// List the websites with dedicated extractors
    Sites,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// URL to ingest, or the text itself with `--text`
    pub source: String,

    /// Treat SOURCE as raw text instead of a URL
    #[arg(long)]
    pub text: bool,

    /// Content type hint: auto, real_estate, tour, restaurant, transportation, local_tips
    #[arg(long, default_value = "auto")]
    pub content_type: String,

    /// Save the record once extraction succeeds
    #[arg(long)]
    pub save: bool,

    /// Give up and disconnect after this many seconds
    #[arg(long, value_name = "SECS")]
    pub max_wait: Option<u64>,

    /// Print the raw record as JSON instead of the formatted view
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// File with one URL per line; blank lines and `#` comments are skipped
    pub file: PathBuf,

    /// Save every successfully extracted record
    #[arg(long)]
    pub auto_save: bool,

    /// Content type hint applied to every URL
    #[arg(long, default_value = "auto")]
    pub content_type: String,

    /// Directory holding the resume state of earlier runs
    #[arg(long, default_value = ".")]
    pub state_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(long, default_value = "20")]
    pub page_size: usize,

    /// Backend ordering key; prefix with `-` for descending
    #[arg(long, default_value = "-created_at", allow_hyphen_values = true)]
    pub ordering: String,

    /// Export the listed records as JSON into this directory
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// With `--export`, also write one file per record
    #[arg(long, requires = "export")]
    pub per_record_files: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_arguments_parse() {
        let cli = Cli::parse_from([
            "collector",
            "submit",
            "https://listing.test/1",
            "--content-type",
            "tour",
            "--save",
            "--max-wait",
            "30",
        ]);
        let Command::Submit(args) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(args.source, "https://listing.test/1");
        assert_eq!(args.content_type, "tour");
        assert!(args.save);
        assert_eq!(args.max_wait, Some(30));
        assert!(!args.text);
    }

    #[test]
    fn zero_idle_timeout_disables_it() {
        let cli = Cli::parse_from([
            "collector",
            "--progress-idle-timeout",
            "0",
            "--api-url",
            "http://backend.test/api",
            "stats",
        ]);
        let settings = cli.connection.settings();
        assert_eq!(settings.progress_idle_timeout, None);
        assert_eq!(settings.base_url, "http://backend.test/api");
    }

    #[test]
    fn progress_path_defaults_and_overrides() {
        let cli = Cli::parse_from(["collector", "sites"]);
        assert_eq!(cli.connection.settings().progress_path, DEFAULT_PROGRESS_PATH);

        let cli = Cli::parse_from(["collector", "--progress-path", "events/jobs/", "sites"]);
        assert_eq!(cli.connection.settings().progress_path, "events/jobs/");
    }

    #[test]
    fn history_ordering_accepts_leading_dash() {
        let cli = Cli::parse_from(["collector", "history", "--ordering", "-title"]);
        let Command::History(args) = cli.command else {
            panic!("expected history");
        };
        assert_eq!(args.ordering, "-title");
        assert_eq!(args.page_size, 20);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

//! Collector engine: backend client, progress channel and effect execution.
mod client;
mod engine;
mod export;
mod filename;
mod persist;
mod progress;
mod sse;
mod types;

pub use client::{
    ClientSettings, IngestApi, ReqwestIngestClient, DEFAULT_PROGRESS_PATH, DUPLICATE_NOTICE,
};
pub use engine::{EngineHandle, EngineStartError};
pub use export::{export_records, ExportError, ExportOptions, ExportSummary};
pub use filename::record_filename;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{
    decode_frame, ChannelEnd, ChannelMessage, ChannelProgressSink, ProgressChannel, ProgressSink,
    SseProgressChannel, CHANNEL_CLOSED_MESSAGE, EXTRACTION_FAILED_MESSAGE,
};
pub use sse::{SseDecoder, SseFrame};
pub use types::{ClientError, EngineEvent, FailureKind, SubmitResponse};

mod chunk_driver;
mod merger;
mod orchestrator;
mod retry;
mod webhook;
mod worker;

pub use chunk_driver::{coverage_gap, trailing_context, ChunkDriveError, ChunkDriver};
pub use merger::{
    build_full_text, normalize_text, trigram_jaccard, ChunkResult, TranscriptMerger,
};
pub use orchestrator::{JobOrchestrator, JobProgress, NewJobRequest, OrchestratorError};
pub use retry::RetryPolicy;
pub use webhook::WebhookNotifier;
pub use worker::{TranscriptionWorker, WorkerError};

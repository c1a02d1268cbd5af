mod audio_chunker;
mod audio_normalizer;
mod blob_store;
mod chunk_repository;
mod job_queue;
mod job_repository;
mod provider_registry;
mod repository_error;
mod stt_provider;

pub use audio_chunker::{AudioChunker, PlannedChunk};
pub use audio_normalizer::{AudioError, AudioNormalizer, NormalizedAudio};
pub use blob_store::{BlobStore, BlobStoreError};
pub use chunk_repository::ChunkRepository;
pub use job_queue::{JobQueue, QueueError, QueueMessage};
pub use job_repository::JobRepository;
pub use provider_registry::{ProviderConstructor, ProviderRegistry};
pub use repository_error::RepositoryError;
pub use stt_provider::{
    build_prompt, ChunkTranscription, ProviderError, SttProvider, TranscriptionRequest,
};

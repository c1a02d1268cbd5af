mod memory_repository;
mod pg_chunk_repository;
mod pg_job_repository;

pub use memory_repository::{InMemoryChunkRepository, InMemoryJobRepository};
pub use pg_chunk_repository::PgChunkRepository;
pub use pg_job_repository::PgJobRepository;

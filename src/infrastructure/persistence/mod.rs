mod pg_pool;
pub mod repositories;

pub use pg_pool::{create_pool, run_migrations};
pub use repositories::{
    InMemoryChunkRepository, InMemoryJobRepository, PgChunkRepository, PgJobRepository,
};

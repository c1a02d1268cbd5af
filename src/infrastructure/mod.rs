pub mod audio;
pub mod observability;
pub mod persistence;
pub mod providers;
pub mod queue;
pub mod storage;

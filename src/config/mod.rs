mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    ChunkingSettings, DatabaseSettings, LoggingSettings, ProviderSettings, RetrySettings,
    Settings, StorageProviderSetting, StorageSettings, WorkerSettings,
};

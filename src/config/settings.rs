use config::{Config, Environment as EnvironmentSource, File};
use serde::Deserialize;

use super::Environment;

/// Immutable worker configuration, read once at boot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub chunking: ChunkingSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub providers: ProviderSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Layered load: `appsettings.{env}.toml` (optional) overridden by
    /// `APP_`-prefixed environment variables.
    pub fn load(environment: Environment) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(
                File::with_name(&format!(
                    "appsettings.{}",
                    environment.as_str().to_lowercase()
                ))
                .required(false),
            )
            .add_source(EnvironmentSource::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/tavush".to_string(),
            max_connections: 10,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderSetting {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub provider: StorageProviderSetting,
    pub local_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProviderSetting::Local,
            local_path: "./blobs".to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            s3_access_key_id: None,
            s3_secret_access_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum seconds of fresh audio per chunk.
    pub max_chunk_duration: f64,
    /// Seconds shared by consecutive chunks for boundary stitching.
    pub overlap_duration: f64,
    pub silence_threshold_db: i32,
    pub min_silence_duration: f64,
    pub coverage_gap_threshold: f64,
    pub overlap_similarity_threshold: f64,
    pub context_segments: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_duration: 300.0,
            overlap_duration: 10.0,
            silence_threshold_db: -30,
            min_silence_duration: 0.3,
            coverage_gap_threshold: 15.0,
            overlap_similarity_threshold: 0.8,
            context_segments: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts for transient provider faults.
    pub max_attempts: u32,
    /// Extra attempts when the provider skipped audio; counted separately.
    pub coverage_retries: u32,
    pub base_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub exponential_base: f64,
    pub jitter_max_seconds: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            coverage_retries: 2,
            base_delay_seconds: 2.0,
            max_delay_seconds: 60.0,
            exponential_base: 2.0,
            jitter_max_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub provider_timeout_seconds: u64,
    pub stale_job_minutes: i64,
    pub webhook_timeout_seconds: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            provider_timeout_seconds: 120,
            stale_job_minutes: 30,
            webhook_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub default_provider: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_api_version: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            openai_api_key: String::new(),
            openai_model: "whisper-1".to_string(),
            openai_base_url: None,
            azure_endpoint: None,
            azure_deployment: None,
            azure_api_key: None,
            azure_api_version: "2024-02-01".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_json: false,
        }
    }
}

mod azure_whisper;
mod openai_whisper;
mod registry;
mod whisper_response;

pub use azure_whisper::AzureWhisperProvider;
pub use openai_whisper::OpenAiWhisperProvider;
pub use registry::default_registry;
pub use whisper_response::{segments_from_response, truncate_raw, WhisperResponse};

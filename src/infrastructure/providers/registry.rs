use std::sync::Arc;

use crate::application::ports::ProviderRegistry;
use crate::config::ProviderSettings;

use super::azure_whisper::AzureWhisperProvider;
use super::openai_whisper::OpenAiWhisperProvider;

/// Registers every provider the configuration enables. Azure only appears
/// when an endpoint is configured.
pub fn default_registry(settings: &ProviderSettings) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    {
        let api_key = settings.openai_api_key.clone();
        let base_url = settings.openai_base_url.clone();
        let model = settings.openai_model.clone();
        registry.register("openai", move || {
            Arc::new(OpenAiWhisperProvider::new(
                api_key.clone(),
                base_url.clone(),
                Some(model.clone()),
            ))
        });
    }

    if let (Some(endpoint), Some(deployment), Some(api_key)) = (
        settings.azure_endpoint.clone(),
        settings.azure_deployment.clone(),
        settings.azure_api_key.clone(),
    ) {
        let api_version = settings.azure_api_version.clone();
        registry.register("azure", move || {
            Arc::new(AzureWhisperProvider::new(
                &endpoint,
                &deployment,
                &api_key,
                &api_version,
            ))
        });
    }

    registry
}

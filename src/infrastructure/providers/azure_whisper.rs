use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart;

use crate::application::ports::{
    build_prompt, ChunkTranscription, ProviderError, SttProvider, TranscriptionRequest,
};
use crate::domain::ProviderMetadata;

use super::openai_whisper::map_transport_error;
use super::whisper_response::{segments_from_response, truncate_raw, WhisperResponse};

pub struct AzureWhisperProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    deployment: String,
}

impl AzureWhisperProvider {
    pub fn new(base_url: &str, deployment: &str, api_key: &str, api_version: &str) -> Self {
        let endpoint = format!(
            "{}/openai/deployments/{}/audio/transcriptions?api-version={}",
            base_url.trim_end_matches('/'),
            deployment,
            api_version,
        );
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            deployment: deployment.to_string(),
        }
    }

    async fn call(
        &self,
        audio: &[u8],
        request: &TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError> {
        let started = Instant::now();

        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ProviderError::Unknown(format!("mime: {}", e)))?;

        let language = request
            .language
            .split('-')
            .next()
            .unwrap_or(&request.language)
            .to_string();

        let form = multipart::Form::new()
            .text("language", language)
            .text("response_format", "verbose_json")
            .text("prompt", build_prompt(request))
            .part("file", file_part);

        tracing::debug!(
            endpoint = %self.endpoint,
            chunk_index = request.chunk_index,
            "Sending audio to Azure OpenAI Whisper"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::from_status(status.as_u16(), &body, retry_after));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Unknown(format!("body: {}", e)))?;

        let parsed: WhisperResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Unknown(format!("parse response: {}", e)))?;

        let segments = segments_from_response(&parsed, request.chunk_duration);

        tracing::info!(
            segments = segments.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Azure OpenAI Whisper transcription completed"
        );

        Ok(ChunkTranscription {
            segments,
            metadata: ProviderMetadata {
                input_tokens: None,
                output_tokens: None,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                finish_reason: None,
                model: Some(self.deployment.clone()),
                raw_response: Some(truncate_raw(&body)),
            },
        })
    }
}

#[async_trait]
impl SttProvider for AzureWhisperProvider {
    fn name(&self) -> &str {
        "azure"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        request: &TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError> {
        tokio::select! {
            result = self.call(audio, request) => result,
            _ = request.cancel.cancelled() => {
                Err(ProviderError::Unknown("request cancelled by caller".to_string()))
            }
        }
    }
}

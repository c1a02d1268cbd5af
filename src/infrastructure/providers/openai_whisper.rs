use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart;

use crate::application::ports::{
    build_prompt, ChunkTranscription, ProviderError, SttProvider, TranscriptionRequest,
};
use crate::domain::ProviderMetadata;

use super::whisper_response::{segments_from_response, truncate_raw, WhisperResponse};

pub struct OpenAiWhisperProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiWhisperProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
        }
    }

    async fn call(
        &self,
        audio: &[u8],
        request: &TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError> {
        let started = Instant::now();
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ProviderError::Unknown(format!("mime: {}", e)))?;

        // Whisper takes a bare ISO 639-1 code, not a full BCP-47 tag.
        let language = request
            .language
            .split('-')
            .next()
            .unwrap_or(&request.language)
            .to_string();

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("language", language)
            .text("response_format", "verbose_json")
            .text("prompt", build_prompt(request))
            .part("file", file_part);

        tracing::debug!(
            model = %self.model,
            chunk_index = request.chunk_index,
            audio_bytes = audio.len(),
            "Sending audio to OpenAI Whisper API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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
            "OpenAI Whisper transcription completed"
        );

        Ok(ChunkTranscription {
            segments,
            metadata: ProviderMetadata {
                input_tokens: None,
                output_tokens: None,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                finish_reason: None,
                model: Some(self.model.clone()),
                raw_response: Some(truncate_raw(&body)),
            },
        })
    }
}

#[async_trait]
impl SttProvider for OpenAiWhisperProvider {
    fn name(&self) -> &str {
        "openai"
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

pub(super) fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProviderError::Unavailable(format!("connection refused: {}", e))
    } else {
        ProviderError::Unknown(format!("request: {}", e))
    }
}

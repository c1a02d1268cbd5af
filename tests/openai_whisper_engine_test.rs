use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use tavush::application::ports::{ProviderError, SttProvider, TranscriptionRequest};
use tavush::infrastructure::providers::OpenAiWhisperProvider;

async fn start_mock_server(
    response_status: u16,
    response_body: &'static str,
) -> (String, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new().route(
        "/audio/transcriptions",
        post(move || async move {
            let status = axum::http::StatusCode::from_u16(response_status).unwrap();
            if response_status == 429 {
                return (status, [("Retry-After", "7")], response_body).into_response();
            }
            (status, response_body).into_response()
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .ok();
    });

    (base_url, shutdown_tx)
}

fn request(chunk_duration: f64) -> TranscriptionRequest {
    TranscriptionRequest {
        language: "hy-AM".to_string(),
        prompt: None,
        context_text: Some("previous tail text".to_string()),
        chunk_index: 1,
        chunk_duration,
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn given_verbose_json_when_transcribing_then_segments_parsed() {
    let body = r#"{
        "task": "transcribe",
        "language": "hy",
        "duration": 29.4,
        "text": "full text here",
        "segments": [
            {"id": 0, "start": 0.0, "end": 12.5, "text": " first part "},
            {"id": 1, "start": 12.5, "end": 29.4, "text": "second part"}
        ]
    }"#;
    let (base_url, shutdown) = start_mock_server(200, body).await;

    let engine = OpenAiWhisperProvider::new(
        "test-key".to_string(),
        Some(base_url),
        Some("whisper-1".to_string()),
    );

    let result = engine.transcribe(b"fake wav bytes", &request(30.0)).await;
    shutdown.send(()).ok();

    let transcription = result.unwrap();
    assert_eq!(transcription.segments.len(), 2);
    assert_eq!(transcription.segments[0].text, "first part");
    assert_eq!(transcription.segments[1].end, 29.4);
    assert_eq!(transcription.metadata.model.as_deref(), Some("whisper-1"));
    assert!(transcription.metadata.latency_ms.is_some());
    assert!(transcription.metadata.raw_response.is_some());
}

#[tokio::test]
async fn given_text_without_segments_when_transcribing_then_single_segment_spans_chunk() {
    let body = r#"{"text": "just one blob of text", "segments": []}"#;
    let (base_url, shutdown) = start_mock_server(200, body).await;

    let engine =
        OpenAiWhisperProvider::new("test-key".to_string(), Some(base_url), None);

    let result = engine.transcribe(b"wav", &request(42.0)).await;
    shutdown.send(()).ok();

    let transcription = result.unwrap();
    assert_eq!(transcription.segments.len(), 1);
    assert_eq!(transcription.segments[0].start, 0.0);
    assert_eq!(transcription.segments[0].end, 42.0);
}

#[tokio::test]
async fn given_429_when_transcribing_then_rate_limited_with_retry_after() {
    let (base_url, shutdown) = start_mock_server(429, r#"{"error": "slow down"}"#).await;

    let engine =
        OpenAiWhisperProvider::new("test-key".to_string(), Some(base_url), None);

    let result = engine.transcribe(b"wav", &request(30.0)).await;
    shutdown.send(()).ok();

    match result {
        Err(ProviderError::RateLimited { retry_after, .. }) => {
            assert_eq!(retry_after, Some(7.0));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn given_401_when_transcribing_then_auth_error() {
    let (base_url, shutdown) = start_mock_server(401, "invalid api key").await;

    let engine =
        OpenAiWhisperProvider::new("bad-key".to_string(), Some(base_url), None);

    let result = engine.transcribe(b"wav", &request(30.0)).await;
    shutdown.send(()).ok();

    assert!(matches!(result, Err(ProviderError::Auth(_))));
}

#[tokio::test]
async fn given_500_when_transcribing_then_provider_unavailable() {
    let (base_url, shutdown) = start_mock_server(500, "internal error").await;

    let engine =
        OpenAiWhisperProvider::new("test-key".to_string(), Some(base_url), None);

    let result = engine.transcribe(b"wav", &request(30.0)).await;
    shutdown.send(()).ok();

    assert!(matches!(result, Err(ProviderError::Unavailable(_))));
}

#[tokio::test]
async fn given_cancelled_token_when_transcribing_then_call_aborts() {
    // No server needed: the pre-cancelled token wins the select immediately.
    let engine = OpenAiWhisperProvider::new(
        "test-key".to_string(),
        Some("http://127.0.0.1:9".to_string()),
        None,
    );

    let mut req = request(30.0);
    req.cancel = CancellationToken::new();
    req.cancel.cancel();

    let result = engine.transcribe(b"wav", &req).await;
    assert!(result.is_err());
}

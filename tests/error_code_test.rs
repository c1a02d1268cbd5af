use tavush::application::ports::ProviderError;
use tavush::domain::ErrorCode;

#[test]
fn given_typed_provider_errors_when_classifying_then_variants_map_directly() {
    let rate_limited = ProviderError::RateLimited {
        message: "429".to_string(),
        retry_after: Some(30.0),
    };
    assert_eq!(rate_limited.code(), ErrorCode::RateLimited);

    assert_eq!(
        ProviderError::Timeout("deadline".to_string()).code(),
        ErrorCode::Timeout
    );
    assert_eq!(
        ProviderError::Auth("401".to_string()).code(),
        ErrorCode::AuthError
    );
    assert_eq!(
        ProviderError::QuotaExceeded("billing".to_string()).code(),
        ErrorCode::QuotaExceeded
    );
    assert_eq!(
        ProviderError::InvalidAudio("bad".to_string()).code(),
        ErrorCode::InvalidAudio
    );
    assert_eq!(
        ProviderError::Unavailable("503".to_string()).code(),
        ErrorCode::ProviderUnavailable
    );
}

#[test]
fn given_unknown_variant_when_classifying_then_message_is_inspected() {
    let timeout = ProviderError::Unknown("upstream read timed out".to_string());
    assert_eq!(timeout.code(), ErrorCode::Timeout);

    let exhausted = ProviderError::Unknown("google.api: RESOURCE exhausted".to_string());
    assert_eq!(exhausted.code(), ErrorCode::RateLimited);

    let mystery = ProviderError::Unknown("flux capacitor misaligned".to_string());
    assert_eq!(mystery.code(), ErrorCode::Unknown);
}

#[test]
fn given_raw_messages_when_classifying_then_patterns_match() {
    assert_eq!(
        ErrorCode::from_message("Read timed out after 120s"),
        ErrorCode::Timeout
    );
    assert_eq!(
        ErrorCode::from_message("HTTP 429 Too Many Requests"),
        ErrorCode::RateLimited
    );
    assert_eq!(
        ErrorCode::from_message("monthly quota exceeded for project"),
        ErrorCode::QuotaExceeded
    );
    assert_eq!(
        ErrorCode::from_message("401 Unauthorized"),
        ErrorCode::AuthError
    );
    assert_eq!(
        ErrorCode::from_message("could not decode stream: unsupported format"),
        ErrorCode::InvalidAudio
    );
    assert_eq!(
        ErrorCode::from_message("upstream returned 502 Bad Gateway"),
        ErrorCode::ProviderUnavailable
    );
    assert_eq!(
        ErrorCode::from_message("something entirely novel"),
        ErrorCode::Unknown
    );
}

#[test]
fn given_http_statuses_when_mapping_then_typed_variants_produced() {
    assert!(matches!(
        ProviderError::from_status(429, "slow down", Some(12.0)),
        ProviderError::RateLimited {
            retry_after: Some(r),
            ..
        } if r == 12.0
    ));
    assert!(matches!(
        ProviderError::from_status(401, "", None),
        ProviderError::Auth(_)
    ));
    assert!(matches!(
        ProviderError::from_status(403, "", None),
        ProviderError::Auth(_)
    ));
    assert!(matches!(
        ProviderError::from_status(402, "", None),
        ProviderError::QuotaExceeded(_)
    ));
    assert!(matches!(
        ProviderError::from_status(400, "", None),
        ProviderError::InvalidAudio(_)
    ));
    assert!(matches!(
        ProviderError::from_status(503, "", None),
        ProviderError::Unavailable(_)
    ));
    assert!(matches!(
        ProviderError::from_status(504, "", None),
        ProviderError::Timeout(_)
    ));
}

#[test]
fn given_retryable_question_when_asked_then_only_transient_kinds_retry() {
    assert!(ProviderError::Timeout("t".into()).is_retryable());
    assert!(ProviderError::Unavailable("u".into()).is_retryable());
    assert!(ProviderError::RateLimited {
        message: "r".into(),
        retry_after: None
    }
    .is_retryable());

    assert!(!ProviderError::Auth("a".into()).is_retryable());
    assert!(!ProviderError::QuotaExceeded("q".into()).is_retryable());
    assert!(!ProviderError::InvalidAudio("i".into()).is_retryable());
    assert!(!ProviderError::Unknown("u".into()).is_retryable());
}

#[test]
fn given_error_codes_when_serialized_then_snake_case_round_trips() {
    for code in [
        ErrorCode::RateLimited,
        ErrorCode::Timeout,
        ErrorCode::ProviderUnavailable,
        ErrorCode::AuthError,
        ErrorCode::QuotaExceeded,
        ErrorCode::InvalidAudio,
        ErrorCode::Unknown,
    ] {
        let parsed: ErrorCode = code.as_str().parse().unwrap();
        assert_eq!(parsed, code);
    }
}

//! Inference client against a local mock of the hosted classification API.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moodtunes_api::config::InferenceConfig;
use moodtunes_api::inference::{InferenceClient, InferenceError};
use moodtunes_api::retry::RetryPolicy;

/// Scripted replies per model; the last reply repeats once the script runs out.
#[derive(Clone, Default)]
struct Mock {
    scripts: Arc<Mutex<HashMap<String, Vec<(StatusCode, serde_json::Value)>>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

impl Mock {
    fn script(&self, model: &str, replies: Vec<(StatusCode, serde_json::Value)>) {
        self.scripts.lock().unwrap().insert(model.to_string(), replies);
    }

    fn hits(&self, model: &str) -> usize {
        self.hits.lock().unwrap().get(model).copied().unwrap_or(0)
    }
}

async fn classify(
    State(mock): State<Mock>,
    Path(model): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        mock.auth.lock().unwrap().push(value.to_string());
    }

    let attempt = {
        let mut hits = mock.hits.lock().unwrap();
        let count = hits.entry(model.clone()).or_insert(0);
        *count += 1;
        *count
    };

    let scripts = mock.scripts.lock().unwrap();
    match scripts.get(&model) {
        Some(replies) if !replies.is_empty() => {
            let (status, body) = replies[(attempt - 1).min(replies.len() - 1)].clone();
            (status, Json(body)).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start(mock: Mock) -> String {
    let app = Router::new()
        .route("/:model", post(classify))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: String, max_attempts: u32) -> InferenceClient {
    let config = InferenceConfig {
        base_url,
        api_key: Some("hf_test".to_string()),
        emotion_model: "emotion".to_string(),
        sentiment_model: "sentiment".to_string(),
        timeout: Duration::from_secs(5),
        max_attempts,
    };
    InferenceClient::new(config)
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        })
}

#[tokio::test]
async fn server_error_is_retried_then_grouped_reply_is_used() {
    let mock = Mock::default();
    mock.script(
        "emotion",
        vec![
            (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "loading"})),
            (
                StatusCode::OK,
                json!([[{"label": "sadness", "score": 0.2}, {"label": "Joy", "score": 0.7}]]),
            ),
        ],
    );
    let base = start(mock.clone()).await;

    let label = client(base, 3).detect_mood("what a day").await.unwrap();

    assert_eq!(label.as_deref(), Some("joy"));
    assert_eq!(mock.hits("emotion"), 2);
    assert_eq!(mock.hits("sentiment"), 0);
    assert!(mock
        .auth
        .lock()
        .unwrap()
        .iter()
        .all(|value| value == "Bearer hf_test"));
}

#[tokio::test]
async fn client_error_is_not_retried_and_sentiment_answers() {
    let mock = Mock::default();
    mock.script("emotion", vec![(StatusCode::BAD_REQUEST, json!({"error": "bad input"}))]);
    mock.script(
        "sentiment",
        vec![(
            StatusCode::OK,
            json!([{"label": "NEGATIVE", "score": 0.9}, {"label": "POSITIVE", "score": 0.1}]),
        )],
    );
    let base = start(mock.clone()).await;

    let label = client(base, 3).detect_mood("meh").await.unwrap();

    assert_eq!(label.as_deref(), Some("negative"));
    assert_eq!(mock.hits("emotion"), 1);
    assert_eq!(mock.hits("sentiment"), 1);
}

#[tokio::test]
async fn empty_emotion_reply_falls_back_to_sentiment() {
    let mock = Mock::default();
    mock.script("emotion", vec![(StatusCode::OK, json!([[]]))]);
    mock.script(
        "sentiment",
        vec![(StatusCode::OK, json!([{"label": "POSITIVE", "score": 0.8}]))],
    );
    let base = start(mock.clone()).await;

    let label = client(base, 2).detect_mood("fine").await.unwrap();
    assert_eq!(label.as_deref(), Some("positive"));
}

#[tokio::test]
async fn both_models_empty_yields_no_label() {
    let mock = Mock::default();
    mock.script("emotion", vec![(StatusCode::OK, json!([]))]);
    mock.script("sentiment", vec![(StatusCode::OK, json!([]))]);
    let base = start(mock.clone()).await;

    let label = client(base, 2).detect_mood("...").await.unwrap();
    assert!(label.is_none());
}

#[tokio::test]
async fn persistent_outage_exhausts_attempts_on_both_models() {
    let mock = Mock::default();
    mock.script("emotion", vec![(StatusCode::SERVICE_UNAVAILABLE, json!({}))]);
    mock.script("sentiment", vec![(StatusCode::SERVICE_UNAVAILABLE, json!({}))]);
    let base = start(mock.clone()).await;

    let err = client(base, 2).detect_mood("hello").await.unwrap_err();

    assert!(matches!(
        err,
        InferenceError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
    ));
    assert_eq!(mock.hits("emotion"), 2);
    assert_eq!(mock.hits("sentiment"), 2);
}

#[tokio::test]
async fn missing_api_key_fails_without_a_request() {
    let mock = Mock::default();
    let base = start(mock.clone()).await;
    let config = InferenceConfig {
        base_url: base,
        api_key: None,
        emotion_model: "emotion".to_string(),
        sentiment_model: "sentiment".to_string(),
        ..InferenceConfig::default()
    };

    let err = InferenceClient::new(config)
        .unwrap()
        .detect_mood("hello")
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::MissingApiKey));
    assert_eq!(mock.hits("emotion"), 0);
}

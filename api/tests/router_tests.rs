//! Router-level tests for everything that is decided before the store is
//! touched: identity, role checks and input validation. The pool is lazy
//! and never connects.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use moodtunes_api::auth::{Claims, CREATOR_ROLE};
use moodtunes_api::config::{Config, InferenceConfig};
use moodtunes_api::{router, AppState};

const SECRET: &str = "router-test-secret";

fn test_app() -> Router {
    let config = Config {
        database_url: "postgres://localhost/moodtunes_unused".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        jwt_secret: SECRET.to_string(),
        inference: InferenceConfig {
            api_key: None,
            max_attempts: 1,
            ..InferenceConfig::default()
        },
    };
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .unwrap();
    router(AppState::new(pool, &config).unwrap())
}

fn token(role: &str) -> String {
    token_for(Uuid::new_v4(), role)
}

fn token_for(user_id: Uuid, role: &str) -> String {
    let claims = Claims {
        user_id,
        email: "listener@example.com".to_string(),
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = test_app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_returns_ok() {
    let response = test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (status, body) = send(Method::GET, "/api/favorites", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token provided");
}

#[tokio::test]
async fn non_bearer_header_is_bad_request() {
    let (status, body) = send(Method::GET, "/api/favorites/count", Some("Token abc"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Malformed authorization header");
}

#[tokio::test]
async fn bad_signature_is_forbidden() {
    let (status, body) = send(
        Method::GET,
        "/api/analytics/history",
        Some("Bearer not.a.jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn listeners_cannot_open_creator_dashboard() {
    let auth = format!("Bearer {}", token("listener"));
    let (status, body) = send(Method::GET, "/api/analytics/creator", Some(&auth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Content creator access required");
}

#[tokio::test]
async fn listeners_cannot_edit_songs() {
    let auth = format!("Bearer {}", token("listener"));
    let uri = format!("/api/songs/{}", Uuid::new_v4());
    let (status, _) = send(Method::PUT, &uri, Some(&auth), Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn creator_dashboard_rejects_out_of_range_period() {
    let auth = format!("Bearer {}", token(CREATOR_ROLE));
    let (status, body) = send(
        Method::GET,
        "/api/analytics/creator?period=0",
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("period"));
}

#[tokio::test]
async fn track_play_requires_song_id() {
    let auth = format!("Bearer {}", token("listener"));
    let (status, body) = send(
        Method::POST,
        "/api/analytics/track-play",
        Some(&auth),
        Some(json!({"duration": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Song ID is required");
}

#[tokio::test]
async fn track_play_rejects_negative_duration() {
    let auth = format!("Bearer {}", token("listener"));
    let (status, _) = send(
        Method::POST,
        "/api/analytics/track-play",
        Some(&auth),
        Some(json!({"songId": Uuid::new_v4(), "duration": -5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_favorite_requires_song_id() {
    let auth = format!("Bearer {}", token("listener"));
    let (status, body) = send(Method::POST, "/api/favorites", Some(&auth), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Song ID is required");
}

#[tokio::test]
async fn malformed_json_body_is_a_json_error() {
    let auth = format!("Bearer {}", token("listener"));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/favorites")
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn invalid_song_id_in_path_is_bad_request() {
    let auth = format!("Bearer {}", token("listener"));
    let (status, body) = send(
        Method::GET,
        "/api/favorites/check/not-a-uuid",
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn trending_validates_limit() {
    let (status, _) = send(Method::GET, "/api/analytics/trending?limit=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn song_list_rejects_unknown_sort() {
    let (status, body) = send(Method::GET, "/api/songs?sortBy=plays", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported sortBy: plays");
}

#[tokio::test]
async fn mood_requires_text() {
    let (status, body) = send(Method::POST, "/api/ai/mood", None, Some(json!({"text": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "text is required");
}

#[tokio::test]
async fn mood_without_api_key_fails_as_upstream_error() {
    let (status, body) = send(
        Method::POST,
        "/api/ai/mood",
        None,
        Some(json!({"text": "I feel great today"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to analyze mood");
}

#[tokio::test]
async fn listeners_cannot_delete_songs() {
    let auth = format!("Bearer {}", token("listener"));
    let uri = format!("/api/songs/{}", Uuid::new_v4());
    let (status, body) = send(Method::DELETE, &uri, Some(&auth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Content creator access required");
}

#[tokio::test]
async fn favorites_by_creator_requires_a_token() {
    let uri = format!("/api/favorites/creator/{}", Uuid::new_v4());
    let (status, _) = send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn playlist_needs_a_name() {
    let auth = format!("Bearer {}", token("listener"));
    let (status, body) = send(
        Method::POST,
        "/api/playlists",
        Some(&auth),
        Some(json!({"name": "  ", "isPublic": false})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Playlist name is required");
}

#[tokio::test]
async fn playlist_song_add_requires_song_id() {
    let auth = format!("Bearer {}", token("listener"));
    let uri = format!("/api/playlists/{}/songs", Uuid::new_v4());
    let (status, body) = send(Method::POST, &uri, Some(&auth), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Song ID is required");
}

#[tokio::test]
async fn playlist_reorder_requires_song_ids() {
    let auth = format!("Bearer {}", token("listener"));
    let uri = format!("/api/playlists/{}/songs/reorder", Uuid::new_v4());
    let (status, body) = send(Method::PUT, &uri, Some(&auth), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Song IDs array is required");
}

#[tokio::test]
async fn my_playlists_require_a_token() {
    let (status, _) = send(Method::GET, "/api/playlists/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn friend_request_to_self_is_rejected() {
    let user_id = Uuid::new_v4();
    let auth = format!("Bearer {}", token_for(user_id, "listener"));
    let uri = format!("/api/friends/{}/request", user_id);
    let (status, body) = send(Method::POST, &uri, Some(&auth), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot send friend request to yourself");
}

#[tokio::test]
async fn friend_request_answer_must_be_accept_or_reject() {
    let auth = format!("Bearer {}", token("listener"));
    let uri = format!("/api/friends/requests/{}", Uuid::new_v4());
    let (status, body) = send(Method::PUT, &uri, Some(&auth), Some(json!({"action": "maybe"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid action");
}

#[tokio::test]
async fn listeners_cannot_create_albums() {
    let auth = format!("Bearer {}", token("listener"));
    let (status, _) = send(Method::POST, "/api/albums", Some(&auth), Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn album_needs_a_title() {
    let auth = format!("Bearer {}", token(CREATOR_ROLE));
    let (status, body) = send(Method::POST, "/api/albums", Some(&auth), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title is required");
}

#[tokio::test]
async fn searches_require_a_query() {
    for uri in ["/api/albums/search?q=%20", "/api/users/search"] {
        let (status, body) = send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "Search query is required");
    }
}

#[tokio::test]
async fn following_yourself_is_rejected() {
    let user_id = Uuid::new_v4();
    let auth = format!("Bearer {}", token_for(user_id, CREATOR_ROLE));
    let uri = format!("/api/users/follow/{}", user_id);
    let (status, body) = send(Method::POST, &uri, Some(&auth), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot follow yourself");
}

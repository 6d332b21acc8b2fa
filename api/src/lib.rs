use axum::{
    extract::FromRef,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod models;
pub mod mood;
pub mod responses;
pub mod retry;
pub mod routes;

use auth::TokenVerifier;
use config::Config;
use inference::InferenceClient;
use routes::{ai, albums, analytics as analytics_routes, favorites, friends, playlists, songs, users};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: PgPool,
    pub verifier: TokenVerifier,
    pub inference: InferenceClient,
}

impl AppState {
    pub fn new(db: PgPool, config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            db,
            verifier: TokenVerifier::new(&config.jwt_secret),
            inference: InferenceClient::new(config.inference.clone())?,
        })
    }
}

async fn health_check() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    let song_routes = Router::new()
        .route("/", get(songs::list_songs))
        .route("/categories", get(songs::list_categories))
        .route("/creator/:creatorId", get(songs::creator_songs))
        .route(
            "/:id",
            get(songs::get_song)
                .put(songs::update_song)
                .delete(songs::delete_song),
        );

    let favorite_routes = Router::new()
        .route("/", get(favorites::list_favorites).post(favorites::add_favorite))
        .route("/count", get(favorites::count_favorites))
        .route("/check/:songId", get(favorites::check_favorite))
        .route("/category/:categoryName", get(favorites::favorites_by_category))
        .route("/creator/:creatorId", get(favorites::favorites_by_creator))
        .route("/:songId", delete(favorites::remove_favorite));

    let playlist_routes = Router::new()
        .route("/", post(playlists::create_playlist))
        .route("/me", get(playlists::my_playlists))
        .route("/me/:id", get(playlists::get_my_playlist))
        .route("/public", get(playlists::public_playlists))
        .route(
            "/:id",
            get(playlists::get_public_playlist)
                .put(playlists::update_playlist)
                .delete(playlists::delete_playlist),
        )
        .route("/:id/songs", post(playlists::add_song))
        .route("/:id/songs/reorder", put(playlists::reorder_songs))
        .route("/:id/songs/:songId", delete(playlists::remove_song));

    let album_routes = Router::new()
        .route("/", post(albums::create_album))
        .route("/creator", get(albums::creator_albums))
        .route("/search", get(albums::search_albums))
        .route("/:id", put(albums::update_album).delete(albums::delete_album))
        .route("/:id/songs", get(albums::album_songs).post(albums::add_song))
        .route("/:id/songs/:songId", delete(albums::remove_song));

    let friend_routes = Router::new()
        .route("/", get(friends::list_friends))
        .route("/requests/pending", get(friends::pending_requests))
        .route(
            "/requests/:requestId",
            put(friends::respond_to_request).delete(friends::cancel_request),
        )
        .route("/:userId/request", post(friends::send_request))
        .route("/:userId", delete(friends::remove_friend));

    let user_routes = Router::new()
        .route("/me", get(users::me).put(users::update_me))
        .route("/search", get(users::search_users))
        .route("/profile/:username", get(users::profile_by_username))
        .route("/profile/id/:userId", get(users::profile_by_id))
        .route("/following", get(users::following))
        .route(
            "/follow/:creatorId",
            post(users::follow_creator).delete(users::unfollow_creator),
        );

    let analytics_router = Router::new()
        .route("/creator", get(analytics_routes::creator_dashboard))
        .route("/song/:songId", get(analytics_routes::song_analytics))
        .route("/track-play", post(analytics_routes::track_play))
        .route("/history", get(analytics_routes::listening_history))
        .route("/trending", get(analytics_routes::trending_songs))
        .route("/for-you", get(analytics_routes::for_you));

    let ai_routes = Router::new().route("/mood", post(ai::analyze_mood));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/songs", song_routes)
        .nest("/api/favorites", favorite_routes)
        .nest("/api/playlists", playlist_routes)
        .nest("/api/albums", album_routes)
        .nest("/api/friends", friend_routes)
        .nest("/api/users", user_routes)
        .nest("/api/analytics", analytics_router)
        .nest("/api/ai", ai_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("moodtunes_api=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    if config.inference.api_key.is_none() {
        tracing::warn!("HUGGINGFACE_API_KEY not set, mood analysis requests will fail");
    }

    let db = db::init_db(&config.database_url).await?;
    tracing::info!("database initialized");

    let state = AppState::new(db, &config)?;
    let app = router(state);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

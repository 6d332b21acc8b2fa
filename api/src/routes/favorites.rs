use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PageQuery;
use crate::auth::AuthUser;
use crate::db::{self, FavoriteFilter};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::responses::{FavoriteDto, MessageResponse, Pagination};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFavoriteRequest {
    song_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub favorites: Vec<FavoriteDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct FavoritedSong {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct FavoriteAddedResponse {
    pub message: String,
    pub song: FavoritedSong,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatusResponse {
    pub is_favorite: bool,
}

#[derive(Debug, Serialize)]
pub struct FavoriteCountResponse {
    pub count: i64,
}

async fn favorites_page(
    state: &AppState,
    user: &AuthUser,
    filter: FavoriteFilter<'_>,
    paging: PageQuery,
) -> ApiResult<Json<FavoritesResponse>> {
    let (rows, total) = db::list_favorites(&state.db, user.user_id, filter, paging.window())
        .await
        .map_err(|e| ApiError::store("Failed to fetch favorites", e))?;

    Ok(Json(FavoritesResponse {
        favorites: rows.into_iter().map(FavoriteDto::from).collect(),
        pagination: paging.pagination(total),
    }))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<FavoritesResponse>> {
    let Query(paging) = query?;
    favorites_page(&state, &user, FavoriteFilter::default(), paging).await
}

pub async fn favorites_by_category(
    State(state): State<AppState>,
    user: AuthUser,
    category: Result<Path<String>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<FavoritesResponse>> {
    let Path(category) = category?;
    let Query(paging) = query?;
    let filter = FavoriteFilter {
        category: Some(category.as_str()),
        ..Default::default()
    };
    favorites_page(&state, &user, filter, paging).await
}

/// The caller's favorites among one creator's songs.
pub async fn favorites_by_creator(
    State(state): State<AppState>,
    user: AuthUser,
    creator_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<FavoritesResponse>> {
    let Path(creator_id) = creator_id?;
    let Query(paging) = query?;
    let filter = FavoriteFilter {
        creator_id: Some(creator_id),
        ..Default::default()
    };
    favorites_page(&state, &user, filter, paging).await
}

pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<AddFavoriteRequest>, JsonRejection>,
) -> ApiResult<Json<FavoriteAddedResponse>> {
    let Json(body) = body?;
    let song_id = body
        .song_id
        .ok_or_else(|| ApiError::BadRequest("Song ID is required".to_string()))?;

    let song = db::get_public_song(&state.db, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song", e))?
        .ok_or_else(|| ApiError::NotFound("Song not found".to_string()))?;

    if let Err(e) = db::add_favorite(&state.db, user.user_id, song_id).await {
        if is_unique_violation(&e) {
            tracing::debug!("song {} already favorited by {}", song_id, user.user_id);
            return Err(ApiError::Conflict("Song already in favorites".to_string()));
        }
        return Err(ApiError::store("Failed to add to favorites", e));
    }

    tracing::info!("user {} favorited song {}", user.user_id, song_id);

    Ok(Json(FavoriteAddedResponse {
        message: "Song added to favorites".to_string(),
        song: FavoritedSong {
            id: song.id,
            title: song.title,
        },
    }))
}

/// Deleting a favorite that isn't there still succeeds.
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    song_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(song_id) = song_id?;

    let removed = db::remove_favorite(&state.db, user.user_id, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to remove from favorites", e))?;

    if !removed {
        tracing::debug!("song {} was not in favorites of {}", song_id, user.user_id);
    }

    Ok(Json(MessageResponse::new("Song removed from favorites")))
}

pub async fn check_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    song_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<FavoriteStatusResponse>> {
    let Path(song_id) = song_id?;

    let is_favorite = db::is_favorite(&state.db, user.user_id, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to check favorite status", e))?;

    Ok(Json(FavoriteStatusResponse { is_favorite }))
}

pub async fn count_favorites(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<FavoriteCountResponse>> {
    let count = db::count_favorites(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to get favorites count", e))?;

    Ok(Json(FavoriteCountResponse { count }))
}

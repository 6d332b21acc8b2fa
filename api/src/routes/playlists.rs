//! User playlists. Every mutation is scoped to the owner; a playlist the
//! caller does not own is reported as missing.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PageQuery;
use crate::auth::AuthUser;
use crate::db::{self, NewPlaylist, PlaylistUpdate};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::PlaylistRow;
use crate::responses::{MessageResponse, Pagination, PlaylistDto, PlaylistSongDto};
use crate::AppState;

fn not_found() -> ApiError {
    ApiError::NotFound("Playlist not found".to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistRequest {
    name: Option<String>,
    description: Option<String>,
    is_public: Option<bool>,
    cover_url: Option<String>,
}

impl CreatePlaylistRequest {
    fn into_new(self) -> ApiResult<NewPlaylist> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Playlist name is required".to_string()))?;

        Ok(NewPlaylist {
            name,
            description: self.description,
            is_public: self.is_public.unwrap_or(true),
            cover_url: self.cover_url,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlaylistRequest {
    name: Option<String>,
    description: Option<String>,
    is_public: Option<bool>,
}

impl From<UpdatePlaylistRequest> for PlaylistUpdate {
    fn from(req: UpdatePlaylistRequest) -> Self {
        PlaylistUpdate {
            name: req.name.filter(|n| !n.trim().is_empty()),
            description: req.description,
            is_public: req.is_public,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSongRequest {
    song_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    song_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct PublicPlaylistsQuery {
    creator: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistSavedResponse {
    pub message: String,
    pub playlist: PlaylistDto,
}

#[derive(Debug, Serialize)]
pub struct PlaylistListResponse {
    pub playlists: Vec<PlaylistDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct PlaylistDetailResponse {
    pub playlist: PlaylistDto,
    pub songs: Vec<PlaylistSongDto>,
}

#[derive(Debug, Serialize)]
pub struct SongAddedResponse {
    pub message: String,
    pub position: i32,
}

async fn with_songs(state: &AppState, playlist: PlaylistRow) -> ApiResult<Json<PlaylistDetailResponse>> {
    let songs = db::playlist_songs(&state.db, playlist.id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch playlist songs", e))?;

    Ok(Json(PlaylistDetailResponse {
        playlist: playlist.into(),
        songs: songs.into_iter().map(PlaylistSongDto::from).collect(),
    }))
}

async fn require_owned(state: &AppState, playlist_id: Uuid, user: &AuthUser) -> ApiResult<PlaylistRow> {
    db::owned_playlist(&state.db, playlist_id, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch playlist", e))?
        .ok_or_else(not_found)
}

pub async fn create_playlist(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<CreatePlaylistRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PlaylistSavedResponse>)> {
    let Json(body) = body?;
    let new = body.into_new()?;

    let playlist = db::create_playlist(&state.db, user.user_id, &new)
        .await
        .map_err(|e| ApiError::store("Failed to create playlist", e))?;

    tracing::info!("user {} created playlist {}", user.user_id, playlist.id);

    Ok((
        StatusCode::CREATED,
        Json(PlaylistSavedResponse {
            message: "Playlist created successfully".to_string(),
            playlist: playlist.into(),
        }),
    ))
}

pub async fn my_playlists(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<PlaylistListResponse>> {
    let Query(paging) = query?;

    let (rows, total) = db::playlists_for_owner(&state.db, user.user_id, paging.window())
        .await
        .map_err(|e| ApiError::store("Failed to fetch playlists", e))?;

    Ok(Json(PlaylistListResponse {
        playlists: rows.into_iter().map(PlaylistDto::from).collect(),
        pagination: paging.pagination(total),
    }))
}

pub async fn public_playlists(
    State(state): State<AppState>,
    query: Result<Query<PublicPlaylistsQuery>, QueryRejection>,
) -> ApiResult<Json<PlaylistListResponse>> {
    let Query(query) = query?;
    let paging = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let creator = query.creator.as_deref().filter(|c| !c.is_empty());

    let (rows, total) = db::public_playlists(&state.db, creator, paging.window())
        .await
        .map_err(|e| ApiError::store("Failed to fetch playlists", e))?;

    Ok(Json(PlaylistListResponse {
        playlists: rows.into_iter().map(PlaylistDto::from).collect(),
        pagination: paging.pagination(total),
    }))
}

pub async fn get_public_playlist(
    State(state): State<AppState>,
    playlist_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<PlaylistDetailResponse>> {
    let Path(playlist_id) = playlist_id?;

    let playlist = db::public_playlist(&state.db, playlist_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch playlist", e))?
        .ok_or_else(not_found)?;

    with_songs(&state, playlist).await
}

pub async fn get_my_playlist(
    State(state): State<AppState>,
    user: AuthUser,
    playlist_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<PlaylistDetailResponse>> {
    let Path(playlist_id) = playlist_id?;
    let playlist = require_owned(&state, playlist_id, &user).await?;
    with_songs(&state, playlist).await
}

pub async fn update_playlist(
    State(state): State<AppState>,
    user: AuthUser,
    playlist_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdatePlaylistRequest>, JsonRejection>,
) -> ApiResult<Json<PlaylistSavedResponse>> {
    let Path(playlist_id) = playlist_id?;
    let Json(body) = body?;

    let playlist = db::update_playlist(&state.db, playlist_id, user.user_id, &body.into())
        .await
        .map_err(|e| ApiError::store("Failed to update playlist", e))?
        .ok_or_else(not_found)?;

    Ok(Json(PlaylistSavedResponse {
        message: "Playlist updated successfully".to_string(),
        playlist: playlist.into(),
    }))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    user: AuthUser,
    playlist_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(playlist_id) = playlist_id?;

    let deleted = db::delete_playlist(&state.db, playlist_id, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to delete playlist", e))?;
    if !deleted {
        return Err(not_found());
    }

    tracing::info!("user {} deleted playlist {}", user.user_id, playlist_id);

    Ok(Json(MessageResponse::new("Playlist deleted successfully")))
}

pub async fn add_song(
    State(state): State<AppState>,
    user: AuthUser,
    playlist_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AddSongRequest>, JsonRejection>,
) -> ApiResult<Json<SongAddedResponse>> {
    let Path(playlist_id) = playlist_id?;
    let Json(body) = body?;
    let song_id = body
        .song_id
        .ok_or_else(|| ApiError::BadRequest("Song ID is required".to_string()))?;

    require_owned(&state, playlist_id, &user).await?;
    db::get_public_song(&state.db, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song", e))?
        .ok_or_else(|| ApiError::NotFound("Song not found".to_string()))?;

    let position = match db::add_playlist_song(&state.db, playlist_id, song_id).await {
        Ok(position) => position,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Song already in playlist".to_string()))
        }
        Err(e) => return Err(ApiError::store("Failed to add song to playlist", e)),
    };

    Ok(Json(SongAddedResponse {
        message: "Song added to playlist successfully".to_string(),
        position,
    }))
}

pub async fn remove_song(
    State(state): State<AppState>,
    user: AuthUser,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path((playlist_id, song_id)) = ids?;
    require_owned(&state, playlist_id, &user).await?;

    let removed = db::remove_playlist_song(&state.db, playlist_id, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to remove song from playlist", e))?;
    if !removed {
        tracing::debug!("song {} was not in playlist {}", song_id, playlist_id);
    }

    Ok(Json(MessageResponse::new("Song removed from playlist successfully")))
}

pub async fn reorder_songs(
    State(state): State<AppState>,
    user: AuthUser,
    playlist_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ReorderRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(playlist_id) = playlist_id?;
    let Json(body) = body?;
    let song_ids = body
        .song_ids
        .ok_or_else(|| ApiError::BadRequest("Song IDs array is required".to_string()))?;

    require_owned(&state, playlist_id, &user).await?;

    let moved = db::reorder_playlist(&state.db, playlist_id, &song_ids)
        .await
        .map_err(|e| ApiError::store("Failed to reorder playlist", e))?;
    tracing::debug!("playlist {}: {} songs renumbered", playlist_id, moved);

    Ok(Json(MessageResponse::new("Playlist reordered successfully")))
}

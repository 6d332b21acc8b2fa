use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PageQuery;
use crate::auth::AuthUser;
use crate::db::{self, AlbumUpdate, NewAlbum};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::AlbumRow;
use crate::responses::{AlbumDto, AlbumSongDto, MessageResponse, Pagination};
use crate::AppState;

fn not_found() -> ApiError {
    ApiError::NotFound("Album not found".to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRequest {
    title: Option<String>,
    description: Option<String>,
    cover_url: Option<String>,
    release_date: Option<NaiveDate>,
    is_public: Option<bool>,
}

impl AlbumRequest {
    fn into_new(self) -> ApiResult<NewAlbum> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Title is required".to_string()))?;

        Ok(NewAlbum {
            title,
            description: self.description,
            cover_url: self.cover_url,
            release_date: self.release_date,
            is_public: self.is_public.unwrap_or(true),
        })
    }
}

impl From<AlbumRequest> for AlbumUpdate {
    fn from(req: AlbumRequest) -> Self {
        AlbumUpdate {
            title: req.title.filter(|t| !t.trim().is_empty()),
            description: req.description,
            cover_url: req.cover_url,
            release_date: req.release_date,
            is_public: req.is_public,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSongRequest {
    song_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AlbumSearchQuery {
    q: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AlbumsResponse {
    pub albums: Vec<AlbumDto>,
}

#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub album: AlbumDto,
}

#[derive(Debug, Serialize)]
pub struct AlbumSearchResponse {
    pub albums: Vec<AlbumDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct AlbumSongsResponse {
    pub album: AlbumDto,
    pub songs: Vec<AlbumSongDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSongAddedResponse {
    pub message: String,
    pub album_id: Uuid,
    pub song_id: Uuid,
    pub position: i32,
}

async fn require_owned(state: &AppState, album_id: Uuid, user: &AuthUser) -> ApiResult<AlbumRow> {
    db::owned_album(&state.db, album_id, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch album", e))?
        .ok_or_else(not_found)
}

pub async fn creator_albums(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AlbumsResponse>> {
    user.require_creator()?;

    let albums = db::albums_for_creator(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch albums", e))?;

    Ok(Json(AlbumsResponse {
        albums: albums.into_iter().map(AlbumDto::from).collect(),
    }))
}

pub async fn create_album(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<AlbumRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AlbumResponse>)> {
    user.require_creator()?;
    let Json(body) = body?;
    let new = body.into_new()?;

    let album = db::create_album(&state.db, user.user_id, &new)
        .await
        .map_err(|e| ApiError::store("Failed to create album", e))?;

    tracing::info!("creator {} created album {}", user.user_id, album.id);

    Ok((StatusCode::CREATED, Json(AlbumResponse { album: album.into() })))
}

pub async fn update_album(
    State(state): State<AppState>,
    user: AuthUser,
    album_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AlbumRequest>, JsonRejection>,
) -> ApiResult<Json<AlbumResponse>> {
    user.require_creator()?;
    let Path(album_id) = album_id?;
    let Json(body) = body?;

    let album = db::update_album(&state.db, album_id, user.user_id, &body.into())
        .await
        .map_err(|e| ApiError::store("Failed to update album", e))?
        .ok_or_else(not_found)?;

    Ok(Json(AlbumResponse { album: album.into() }))
}

pub async fn delete_album(
    State(state): State<AppState>,
    user: AuthUser,
    album_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_creator()?;
    let Path(album_id) = album_id?;

    if !db::delete_album(&state.db, album_id, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to delete album", e))?
    {
        return Err(not_found());
    }

    Ok(Json(MessageResponse::new("Album deleted successfully")))
}

/// Only the creator's own songs can go on their album.
pub async fn add_song(
    State(state): State<AppState>,
    user: AuthUser,
    album_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AlbumSongRequest>, JsonRejection>,
) -> ApiResult<Json<AlbumSongAddedResponse>> {
    user.require_creator()?;
    let Path(album_id) = album_id?;
    let Json(body) = body?;
    let song_id = body
        .song_id
        .ok_or_else(|| ApiError::BadRequest("Song ID is required".to_string()))?;

    require_owned(&state, album_id, &user).await?;
    db::get_song(&state.db, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song", e))?
        .filter(|song| song.creator_id == user.user_id)
        .ok_or_else(|| ApiError::NotFound("Song not found".to_string()))?;

    let position = match db::add_album_song(&state.db, album_id, song_id).await {
        Ok(position) => position,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Song already in album".to_string()))
        }
        Err(e) => return Err(ApiError::store("Failed to add song to album", e)),
    };

    Ok(Json(AlbumSongAddedResponse {
        message: "Song added to album".to_string(),
        album_id,
        song_id,
        position,
    }))
}

pub async fn remove_song(
    State(state): State<AppState>,
    user: AuthUser,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_creator()?;
    let Path((album_id, song_id)) = ids?;
    require_owned(&state, album_id, &user).await?;

    db::remove_album_song(&state.db, album_id, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to remove song", e))?;

    Ok(Json(MessageResponse::new("Song removed from album")))
}

pub async fn search_albums(
    State(state): State<AppState>,
    query: Result<Query<AlbumSearchQuery>, QueryRejection>,
) -> ApiResult<Json<AlbumSearchResponse>> {
    let Query(query) = query?;
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Search query is required".to_string()))?;
    let paging = PageQuery {
        page: query.page,
        limit: query.limit,
    };

    let (albums, total) = db::search_public_albums(&state.db, &db::like_pattern(term), paging.window())
        .await
        .map_err(|e| ApiError::store("Failed to search albums", e))?;

    Ok(Json(AlbumSearchResponse {
        albums: albums.into_iter().map(AlbumDto::from).collect(),
        pagination: paging.pagination(total),
    }))
}

pub async fn album_songs(
    State(state): State<AppState>,
    album_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<AlbumSongsResponse>> {
    let Path(album_id) = album_id?;

    let album = db::get_album(&state.db, album_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch album", e))?
        .filter(|album| album.is_public)
        .ok_or_else(not_found)?;

    let songs = db::album_songs(&state.db, album_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch album songs", e))?;

    Ok(Json(AlbumSongsResponse {
        album: album.into(),
        songs: songs.into_iter().map(AlbumSongDto::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_required_to_create() {
        let req = AlbumRequest {
            description: Some("no title".to_string()),
            ..Default::default()
        };
        assert!(matches!(req.into_new(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn blank_title_leaves_update_untouched() {
        let update: AlbumUpdate = AlbumRequest {
            title: Some(" ".to_string()),
            is_public: Some(false),
            ..Default::default()
        }
        .into();
        assert!(update.title.is_none());
        assert_eq!(update.is_public, Some(false));
    }
}

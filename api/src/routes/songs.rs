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
use crate::analytics::{self, SongSummary};
use crate::auth::AuthUser;
use crate::db::{self, SongFilter, SongSort, SongUpdate};
use crate::error::{is_foreign_key_violation, ApiError, ApiResult};
use crate::responses::{CategoryDto, MessageResponse, Pagination, SongDto};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongsQuery {
    search: Option<String>,
    q: Option<String>,
    category: Option<String>,
    creator: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl SongsQuery {
    fn filter(&self) -> ApiResult<SongFilter> {
        let sort = match self.sort_by.as_deref() {
            None | Some("created_at") | Some("createdAt") => SongSort::CreatedAt,
            Some("popularity") => SongSort::Popularity,
            Some("title") => SongSort::Title,
            Some("artist") => SongSort::Artist,
            Some(other) => {
                return Err(ApiError::BadRequest(format!("Unsupported sortBy: {}", other)))
            }
        };
        let ascending = match self.sort_order.as_deref() {
            None | Some("desc") => false,
            Some("asc") => true,
            Some(other) => {
                return Err(ApiError::BadRequest(format!("Unsupported sortOrder: {}", other)))
            }
        };

        Ok(SongFilter {
            search: self.search.clone().or_else(|| self.q.clone()),
            category: self.category.clone().filter(|c| !c.is_empty()),
            creator: self.creator.clone().filter(|c| !c.is_empty()),
            sort,
            ascending,
        })
    }

    fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SongListResponse {
    pub songs: Vec<SongDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct SongDetailResponse {
    pub song: SongDto,
    pub analytics: SongSummary,
}

#[derive(Debug, Serialize)]
pub struct SongUpdatedResponse {
    pub message: String,
    pub song: SongDto,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongUpdateRequest {
    title: Option<String>,
    artist: Option<String>,
    movie: Option<String>,
    category_id: Option<Uuid>,
    lyrics: Option<String>,
    is_public: Option<bool>,
}

impl From<SongUpdateRequest> for SongUpdate {
    fn from(req: SongUpdateRequest) -> Self {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        SongUpdate {
            title: non_blank(req.title),
            artist: non_blank(req.artist),
            movie: non_blank(req.movie),
            category_id: req.category_id,
            lyrics: non_blank(req.lyrics),
            is_public: req.is_public,
        }
    }
}

pub async fn list_songs(
    State(state): State<AppState>,
    query: Result<Query<SongsQuery>, QueryRejection>,
) -> ApiResult<Json<SongListResponse>> {
    let Query(query) = query?;
    let filter = query.filter()?;
    let paging = query.paging();

    let (songs, total) = db::list_public_songs(&state.db, &filter, paging.window())
        .await
        .map_err(|e| ApiError::store("Failed to fetch songs", e))?;

    Ok(Json(SongListResponse {
        songs: songs.into_iter().map(SongDto::from).collect(),
        pagination: paging.pagination(total),
    }))
}

pub async fn get_song(
    State(state): State<AppState>,
    song_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<SongDetailResponse>> {
    let Path(song_id) = song_id?;

    let song = db::get_public_song(&state.db, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song", e))?
        .ok_or_else(|| ApiError::NotFound("Song not found".to_string()))?;

    let rollups = db::rollups_for_song(&state.db, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song analytics", e))?;

    Ok(Json(SongDetailResponse {
        song: song.into(),
        analytics: analytics::summarize_song(&rollups),
    }))
}

pub async fn creator_songs(
    State(state): State<AppState>,
    creator_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<SongListResponse>> {
    let Path(creator_id) = creator_id?;
    let Query(paging) = query?;

    let (songs, total) = db::public_songs_by_creator(&state.db, creator_id, paging.window())
        .await
        .map_err(|e| ApiError::store("Failed to fetch creator songs", e))?;

    Ok(Json(SongListResponse {
        songs: songs.into_iter().map(SongDto::from).collect(),
        pagination: paging.pagination(total),
    }))
}

pub async fn update_song(
    State(state): State<AppState>,
    user: AuthUser,
    song_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<SongUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<SongUpdatedResponse>> {
    user.require_creator()?;
    let Path(song_id) = song_id?;
    let Json(body) = body?;

    let song = db::update_song(&state.db, song_id, user.user_id, &body.into())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ApiError::BadRequest("Category not found".to_string())
            } else {
                ApiError::store("Failed to update song", e)
            }
        })?
        .ok_or_else(|| ApiError::NotFound("Song not found".to_string()))?;

    tracing::info!("song {} updated by {}", song_id, user.user_id);

    Ok(Json(SongUpdatedResponse {
        message: "Song updated successfully".to_string(),
        song: song.into(),
    }))
}

pub async fn delete_song(
    State(state): State<AppState>,
    user: AuthUser,
    song_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_creator()?;
    let Path(song_id) = song_id?;

    let deleted = db::delete_song(&state.db, song_id, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to delete song", e))?;
    if !deleted {
        return Err(ApiError::NotFound("Song not found".to_string()));
    }

    tracing::info!("song {} deleted by {}", song_id, user.user_id);

    Ok(Json(MessageResponse::new("Song deleted successfully")))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<CategoriesResponse>> {
    let categories = db::list_categories(&state.db)
        .await
        .map_err(|e| ApiError::store("Failed to fetch categories", e))?;

    Ok(Json(CategoriesResponse {
        categories: categories.into_iter().map(CategoryDto::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q_is_an_alias_for_search() {
        let query = SongsQuery {
            q: Some("love".to_string()),
            ..Default::default()
        };
        assert_eq!(query.filter().unwrap().search.as_deref(), Some("love"));
    }

    #[test]
    fn sort_parameters_are_validated() {
        let query = SongsQuery {
            sort_by: Some("title".to_string()),
            sort_order: Some("asc".to_string()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.sort, SongSort::Title);
        assert!(filter.ascending);

        let bad = SongsQuery {
            sort_by: Some("id; DROP TABLE songs".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.filter(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn popularity_ranks_by_plays() {
        let query = SongsQuery {
            sort_by: Some("popularity".to_string()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.sort, SongSort::Popularity);
        assert!(!filter.ascending);
    }

    #[test]
    fn blank_update_fields_are_ignored() {
        let update: SongUpdate = SongUpdateRequest {
            title: Some("  ".to_string()),
            artist: Some("New Artist".to_string()),
            ..Default::default()
        }
        .into();
        assert!(update.title.is_none());
        assert_eq!(update.artist.as_deref(), Some("New Artist"));
    }
}

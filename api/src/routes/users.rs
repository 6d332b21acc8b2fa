use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PageQuery;
use crate::auth::{AuthUser, CREATOR_ROLE};
use crate::db::{self, ProfileUpdate};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::responses::{MessageResponse, Pagination, PublicUserDto, UserDto};
use crate::AppState;

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    username: Option<String>,
    full_name: Option<String>,
    bio: Option<String>,
    gender: Option<String>,
}

impl From<ProfileUpdateRequest> for ProfileUpdate {
    fn from(req: ProfileUpdateRequest) -> Self {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        ProfileUpdate {
            username: non_blank(req.username).map(|u| u.trim().to_string()),
            full_name: non_blank(req.full_name),
            bio: non_blank(req.bio),
            gender: non_blank(req.gender),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    q: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdatedResponse {
    pub message: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUserDto,
}

#[derive(Debug, Serialize)]
pub struct UserSearchResponse {
    pub users: Vec<PublicUserDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowDto {
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub message: String,
    pub follow: FollowDto,
}

#[derive(Debug, Serialize)]
pub struct FollowingResponse {
    pub creators: Vec<PublicUserDto>,
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<MeResponse>> {
    let row = db::get_user(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch user", e))?
        .ok_or_else(user_not_found)?;

    Ok(Json(MeResponse { user: row.into() }))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<ProfileUpdatedResponse>> {
    let Json(body) = body?;

    let row = match db::update_profile(&state.db, user.user_id, &body.into()).await {
        Ok(row) => row.ok_or_else(user_not_found)?,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Username already taken".to_string()))
        }
        Err(e) => return Err(ApiError::store("Failed to update profile", e)),
    };

    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully".to_string(),
        user: row.into(),
    }))
}

pub async fn profile_by_username(
    State(state): State<AppState>,
    username: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<ProfileResponse>> {
    let Path(username) = username?;

    let row = db::get_user_by_username(&state.db, &username)
        .await
        .map_err(|e| ApiError::store("Failed to fetch user", e))?
        .ok_or_else(user_not_found)?;

    Ok(Json(ProfileResponse { user: row.into() }))
}

pub async fn profile_by_id(
    State(state): State<AppState>,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ProfileResponse>> {
    let Path(user_id) = user_id?;

    let row = db::get_user(&state.db, user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch user", e))?
        .ok_or_else(user_not_found)?;

    Ok(Json(ProfileResponse { user: row.into() }))
}

pub async fn search_users(
    State(state): State<AppState>,
    query: Result<Query<UserSearchQuery>, QueryRejection>,
) -> ApiResult<Json<UserSearchResponse>> {
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

    let (users, total) = db::search_users(&state.db, &db::like_pattern(term), paging.window())
        .await
        .map_err(|e| ApiError::store("Failed to search users", e))?;

    Ok(Json(UserSearchResponse {
        users: users.into_iter().map(PublicUserDto::from).collect(),
        pagination: paging.pagination(total),
    }))
}

pub async fn follow_creator(
    State(state): State<AppState>,
    user: AuthUser,
    creator_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<FollowResponse>> {
    let Path(creator_id) = creator_id?;
    if creator_id == user.user_id {
        return Err(ApiError::BadRequest("Cannot follow yourself".to_string()));
    }

    db::get_user(&state.db, creator_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch user", e))?
        .filter(|u| u.role == CREATOR_ROLE)
        .ok_or_else(|| ApiError::NotFound("Content creator not found".to_string()))?;

    let follow = match db::follow_creator(&state.db, user.user_id, creator_id).await {
        Ok(follow) => follow,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Already following this creator".to_string()))
        }
        Err(e) => return Err(ApiError::store("Failed to follow creator", e)),
    };

    tracing::info!("user {} follows creator {}", user.user_id, creator_id);

    Ok(Json(FollowResponse {
        message: "Successfully followed creator".to_string(),
        follow: FollowDto {
            creator_id: follow.creator_id,
            created_at: follow.created_at,
        },
    }))
}

/// Unfollowing someone not followed still succeeds.
pub async fn unfollow_creator(
    State(state): State<AppState>,
    user: AuthUser,
    creator_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(creator_id) = creator_id?;

    db::unfollow_creator(&state.db, user.user_id, creator_id)
        .await
        .map_err(|e| ApiError::store("Failed to unfollow creator", e))?;

    Ok(Json(MessageResponse::new("Successfully unfollowed creator")))
}

pub async fn following(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<FollowingResponse>> {
    let creators = db::followed_creators(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch followed creators", e))?;

    Ok(Json(FollowingResponse {
        creators: creators.into_iter().map(PublicUserDto::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_update_trims_username_and_drops_blanks() {
        let update: ProfileUpdate = ProfileUpdateRequest {
            username: Some("  new_name ".to_string()),
            bio: Some("".to_string()),
            ..Default::default()
        }
        .into();
        assert_eq!(update.username.as_deref(), Some("new_name"));
        assert!(update.bio.is_none());
    }
}

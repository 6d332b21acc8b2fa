use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::FriendStatus;
use crate::responses::{FriendRequestDto, IncomingRequestDto, MessageResponse, PublicUserDto};
use crate::AppState;

fn request_not_found() -> ApiError {
    ApiError::NotFound("Friend request not found".to_string())
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    action: Option<String>,
}

impl RespondRequest {
    fn status(&self) -> ApiResult<FriendStatus> {
        match self.action.as_deref() {
            Some("accept") => Ok(FriendStatus::Accepted),
            Some("reject") => Ok(FriendStatus::Rejected),
            _ => Err(ApiError::BadRequest("Invalid action".to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestResponse {
    pub message: String,
    pub friend_request: FriendRequestDto,
}

#[derive(Debug, Serialize)]
pub struct FriendsResponse {
    pub friends: Vec<PublicUserDto>,
}

#[derive(Debug, Serialize)]
pub struct PendingRequestsResponse {
    pub requests: Vec<IncomingRequestDto>,
}

pub async fn send_request(
    State(state): State<AppState>,
    user: AuthUser,
    receiver_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<FriendRequestResponse>> {
    let Path(receiver_id) = receiver_id?;
    if receiver_id == user.user_id {
        return Err(ApiError::BadRequest(
            "Cannot send friend request to yourself".to_string(),
        ));
    }

    db::get_user(&state.db, receiver_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch user", e))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let existing = db::live_friend_request(&state.db, user.user_id, receiver_id)
        .await
        .map_err(|e| ApiError::store("Failed to check friend requests", e))?;
    match existing.as_ref().and_then(|r| r.status()) {
        Some(FriendStatus::Pending) => {
            return Err(ApiError::Conflict("Friend request already pending".to_string()))
        }
        Some(FriendStatus::Accepted) => {
            return Err(ApiError::Conflict("Already friends".to_string()))
        }
        _ => {}
    }

    let request = match db::send_friend_request(&state.db, user.user_id, receiver_id).await {
        Ok(request) => request,
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!("friend request {} -> {} raced", user.user_id, receiver_id);
            return Err(ApiError::Conflict("Duplicate friend request".to_string()));
        }
        Err(e) => return Err(ApiError::store("Failed to send friend request", e)),
    };

    tracing::info!("friend request {} -> {}", user.user_id, receiver_id);

    Ok(Json(FriendRequestResponse {
        message: "Friend request sent".to_string(),
        friend_request: request.into(),
    }))
}

/// Only the receiver can answer, and only while the request is pending.
pub async fn respond_to_request(
    State(state): State<AppState>,
    user: AuthUser,
    request_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<RespondRequest>, JsonRejection>,
) -> ApiResult<Json<FriendRequestResponse>> {
    let Path(request_id) = request_id?;
    let Json(body) = body?;
    let status = body.status()?;

    let request = db::respond_to_friend_request(&state.db, request_id, user.user_id, status)
        .await
        .map_err(|e| ApiError::store("Failed to update friend request", e))?
        .ok_or_else(request_not_found)?;

    let message = match status {
        FriendStatus::Accepted => "Request accepted",
        _ => "Request rejected",
    };

    Ok(Json(FriendRequestResponse {
        message: message.to_string(),
        friend_request: request.into(),
    }))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    user: AuthUser,
    request_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(request_id) = request_id?;

    let request = db::get_friend_request(&state.db, request_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch friend request", e))?
        .filter(|r| r.sender_id == user.user_id)
        .ok_or_else(request_not_found)?;

    let cancelled = request.status() == Some(FriendStatus::Pending)
        && db::cancel_friend_request(&state.db, request_id, user.user_id)
            .await
            .map_err(|e| ApiError::store("Failed to cancel friend request", e))?;
    if !cancelled {
        return Err(ApiError::BadRequest(
            "Only pending requests can be cancelled".to_string(),
        ));
    }

    Ok(Json(MessageResponse::new("Request cancelled")))
}

pub async fn list_friends(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<FriendsResponse>> {
    let friends = db::friends_of(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch friends", e))?;

    Ok(Json(FriendsResponse {
        friends: friends.into_iter().map(PublicUserDto::from).collect(),
    }))
}

pub async fn pending_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<PendingRequestsResponse>> {
    let requests = db::incoming_requests(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch friend requests", e))?;

    Ok(Json(PendingRequestsResponse {
        requests: requests.into_iter().map(IncomingRequestDto::from).collect(),
    }))
}

pub async fn remove_friend(
    State(state): State<AppState>,
    user: AuthUser,
    friend_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(friend_id) = friend_id?;

    let removed = db::remove_friend(&state.db, user.user_id, friend_id)
        .await
        .map_err(|e| ApiError::store("Failed to remove friend", e))?;
    if !removed {
        return Err(ApiError::NotFound("Friendship not found".to_string()));
    }

    tracing::info!("user {} removed friend {}", user.user_id, friend_id);

    Ok(Json(MessageResponse::new("Friend removed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_accept_and_reject_are_actions() {
        let respond = |action: Option<&str>| RespondRequest {
            action: action.map(str::to_string),
        };
        assert_eq!(respond(Some("accept")).status().unwrap(), FriendStatus::Accepted);
        assert_eq!(respond(Some("reject")).status().unwrap(), FriendStatus::Rejected);
        assert!(respond(Some("pending")).status().is_err());
        assert!(respond(None).status().is_err());
    }
}

use anyhow::Result;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::Page;
use crate::models::{
    FollowRow, FriendRequestRow, FriendStatus, IncomingRequestRow, UserRow, UserSummary,
};

const USER_COLUMNS: &str = r#"
    id, email, username, full_name, avatar_url, bio, gender, role, created_at, updated_at
"#;

const SUMMARY_COLUMNS: &str = "u.id, u.username, u.full_name, u.avatar_url, u.bio, u.role";

const REQUEST_COLUMNS: &str = "id, sender_id, receiver_id, status, created_at, updated_at";

/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
}

pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn get_user_by_username(pool: &PgPool, username: &str) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE username = $1",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Fails with a unique violation when the new username is taken.
pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    update: &ProfileUpdate,
) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users SET
            username = COALESCE($2, username),
            full_name = COALESCE($3, full_name),
            bio = COALESCE($4, bio),
            gender = COALESCE($5, gender),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(user_id)
    .bind(&update.username)
    .bind(&update.full_name)
    .bind(&update.bio)
    .bind(&update.gender)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Users whose username or full name contains `pattern`.
pub async fn search_users(
    pool: &PgPool,
    pattern: &str,
    page: Page,
) -> Result<(Vec<UserSummary>, i64)> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE username ILIKE $1 OR full_name ILIKE $1",
    )
    .bind(pattern)
    .fetch_one(pool)
    .await?;

    let users = sqlx::query_as::<_, UserSummary>(&format!(
        r#"
        SELECT {} FROM users u
        WHERE u.username ILIKE $1 OR u.full_name ILIKE $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
        "#,
        SUMMARY_COLUMNS
    ))
    .bind(pattern)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok((users, total))
}

pub async fn get_friend_request(pool: &PgPool, request_id: Uuid) -> Result<Option<FriendRequestRow>> {
    let request = sqlx::query_as::<_, FriendRequestRow>(&format!(
        "SELECT {} FROM friend_requests WHERE id = $1",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    Ok(request)
}

/// The pending or accepted request between two users, whichever of them
/// sent it.
pub async fn live_friend_request(
    pool: &PgPool,
    a: Uuid,
    b: Uuid,
) -> Result<Option<FriendRequestRow>> {
    let request = sqlx::query_as::<_, FriendRequestRow>(&format!(
        r#"
        SELECT {} FROM friend_requests
        WHERE ((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))
          AND status IN ('pending', 'accepted')
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        REQUEST_COLUMNS
    ))
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await?;

    Ok(request)
}

/// Fails with a unique violation when the pair already has a live request,
/// so two racing senders cannot both succeed.
pub async fn send_friend_request(
    pool: &PgPool,
    sender_id: Uuid,
    receiver_id: Uuid,
) -> Result<FriendRequestRow> {
    let request = sqlx::query_as::<_, FriendRequestRow>(&format!(
        r#"
        INSERT INTO friend_requests (id, sender_id, receiver_id, status)
        VALUES ($1, $2, $3, 'pending')
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(sender_id)
    .bind(receiver_id)
    .fetch_one(pool)
    .await?;

    Ok(request)
}

/// Accepts or rejects a pending request addressed to `receiver_id`.
/// `None` when there is no such pending request.
pub async fn respond_to_friend_request(
    pool: &PgPool,
    request_id: Uuid,
    receiver_id: Uuid,
    status: FriendStatus,
) -> Result<Option<FriendRequestRow>> {
    let request = sqlx::query_as::<_, FriendRequestRow>(&format!(
        r#"
        UPDATE friend_requests SET status = $3, updated_at = NOW()
        WHERE id = $1 AND receiver_id = $2 AND status = 'pending'
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .bind(receiver_id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(request)
}

/// Withdraws a request the caller sent while it is still pending.
pub async fn cancel_friend_request(pool: &PgPool, request_id: Uuid, sender_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM friend_requests WHERE id = $1 AND sender_id = $2 AND status = 'pending'",
    )
    .bind(request_id)
    .bind(sender_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn friends_of(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserSummary>> {
    let friends = sqlx::query_as::<_, UserSummary>(&format!(
        r#"
        SELECT {} FROM friend_requests r
        JOIN users u
          ON u.id = CASE WHEN r.sender_id = $1 THEN r.receiver_id ELSE r.sender_id END
        WHERE (r.sender_id = $1 OR r.receiver_id = $1) AND r.status = 'accepted'
        ORDER BY u.username
        "#,
        SUMMARY_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(friends)
}

/// Pending requests addressed to the user, newest first.
pub async fn incoming_requests(pool: &PgPool, user_id: Uuid) -> Result<Vec<IncomingRequestRow>> {
    let rows = sqlx::query_as::<_, IncomingRequestRow>(
        r#"
        SELECT r.id, r.status, r.created_at,
               u.id AS sender_id, u.username AS sender_username,
               u.full_name AS sender_full_name, u.avatar_url AS sender_avatar_url
        FROM friend_requests r
        JOIN users u ON u.id = r.sender_id
        WHERE r.receiver_id = $1 AND r.status = 'pending'
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Ends a friendship. The accepted row is kept as rejected history so a
/// fresh request can be sent later.
pub async fn remove_friend(pool: &PgPool, user_id: Uuid, friend_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE friend_requests SET status = 'rejected', updated_at = NOW()
        WHERE status = 'accepted'
          AND ((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))
        "#,
    )
    .bind(user_id)
    .bind(friend_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fails with a unique violation when already following.
pub async fn follow_creator(pool: &PgPool, follower_id: Uuid, creator_id: Uuid) -> Result<FollowRow> {
    let follow = sqlx::query_as::<_, FollowRow>(
        r#"
        INSERT INTO creator_follows (follower_id, creator_id)
        VALUES ($1, $2)
        RETURNING creator_id, created_at
        "#,
    )
    .bind(follower_id)
    .bind(creator_id)
    .fetch_one(pool)
    .await?;

    Ok(follow)
}

pub async fn unfollow_creator(pool: &PgPool, follower_id: Uuid, creator_id: Uuid) -> Result<bool> {
    let result =
        sqlx::query("DELETE FROM creator_follows WHERE follower_id = $1 AND creator_id = $2")
            .bind(follower_id)
            .bind(creator_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn followed_creators(pool: &PgPool, follower_id: Uuid) -> Result<Vec<UserSummary>> {
    let creators = sqlx::query_as::<_, UserSummary>(&format!(
        r#"
        SELECT {} FROM creator_follows f
        JOIN users u ON u.id = f.creator_id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC
        "#,
        SUMMARY_COLUMNS
    ))
    .bind(follower_id)
    .fetch_all(pool)
    .await?;

    Ok(creators)
}

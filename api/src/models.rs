use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-(song, listener) rollup, incremented in place on every play.
#[derive(Debug, Clone, FromRow)]
pub struct SongPlayRollup {
    pub song_id: Uuid,
    pub listener_id: Uuid,
    pub play_count: i64,
    pub total_listen_duration: i64,
    pub last_played_at: DateTime<Utc>,
}

/// One row of the append-only play log.
#[derive(Debug, Clone, FromRow)]
pub struct ListenEvent {
    pub song_id: Uuid,
    pub listener_id: Uuid,
    pub duration_seconds: i64,
    pub occurred_at: DateTime<Utc>,
}

/// A song joined with its category and creator names.
#[derive(Debug, Clone, FromRow)]
pub struct SongRow {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub movie: Option<String>,
    pub creator_id: Uuid,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub creator_username: Option<String>,
    pub creator_full_name: Option<String>,
    pub audio_url: Option<String>,
    pub cover_url: Option<String>,
    pub lyrics: Option<String>,
    pub duration: i32,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct CreatorStats {
    pub creator_id: Uuid,
    pub total_songs: i64,
    pub total_listens: i64,
    pub total_favorites: i64,
    pub monthly_listeners: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct FavoriteRow {
    #[sqlx(flatten)]
    pub song: SongRow,
    pub favorited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    #[sqlx(flatten)]
    pub song: SongRow,
    pub listened_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// A listener's rollup for one song, with display names.
#[derive(Debug, Clone, FromRow)]
pub struct ListenerActivity {
    pub listener_id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub play_count: i64,
    pub total_listen_duration: i64,
    pub last_played_at: DateTime<Utc>,
}

/// A rollup on one of a creator's songs, newest first.
#[derive(Debug, Clone, FromRow)]
pub struct CreatorActivity {
    pub song_id: Uuid,
    pub song_title: String,
    pub song_artist: String,
    pub play_count: i64,
    pub total_listen_duration: i64,
    pub last_played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The public face of a user, as shown in friend lists and search.
#[derive(Debug, Clone, FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct PlaylistRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub creator_username: Option<String>,
    pub is_public: bool,
    pub cover_url: Option<String>,
    pub song_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PlaylistSongRow {
    #[sqlx(flatten)]
    pub song: SongRow,
    pub position: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AlbumRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub creator_username: Option<String>,
    pub creator_full_name: Option<String>,
    pub cover_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub is_public: bool,
    pub song_count: i64,
    pub total_listens: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AlbumSongRow {
    #[sqlx(flatten)]
    pub song: SongRow,
    pub position: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FriendStatus::Pending => "pending",
            FriendStatus::Accepted => "accepted",
            FriendStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(FriendStatus::Pending),
            "accepted" => Some(FriendStatus::Accepted),
            "rejected" => Some(FriendStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FriendRequestRow {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FriendRequestRow {
    pub fn status(&self) -> Option<FriendStatus> {
        FriendStatus::parse(&self.status)
    }
}

/// A pending request addressed to the caller, with the sender's names.
#[derive(Debug, Clone, FromRow)]
pub struct IncomingRequestRow {
    pub id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub sender_full_name: Option<String>,
    pub sender_avatar_url: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FollowRow {
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

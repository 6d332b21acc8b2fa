//! Response bodies shared by every route. Each entity has exactly one
//! mapping from its row type.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    AlbumRow, AlbumSongRow, CategoryRow, FavoriteRow, FriendRequestRow, HistoryRow,
    IncomingRequestRow, PlaylistRow, PlaylistSongRow, SongRow, UserRow, UserSummary,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorRef {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDto {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryRef>,
    pub creator: CreatorRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    pub duration: i32,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SongRow> for SongDto {
    fn from(row: SongRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            artist: row.artist,
            movie: row.movie,
            category: row.category_name.map(|name| CategoryRef {
                name,
                color: row.category_color,
            }),
            creator: CreatorRef {
                id: row.creator_id,
                username: row.creator_username,
                full_name: row.creator_full_name,
            },
            audio_url: row.audio_url,
            cover_url: row.cover_url,
            lyrics: row.lyrics,
            duration: row.duration,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDto {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<CategoryRow> for CategoryDto {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            description: row.description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteDto {
    #[serde(flatten)]
    pub song: SongDto,
    pub favorited_at: DateTime<Utc>,
}

impl From<FavoriteRow> for FavoriteDto {
    fn from(row: FavoriteRow) -> Self {
        Self {
            song: row.song.into(),
            favorited_at: row.favorited_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryDto {
    #[serde(flatten)]
    pub song: SongDto,
    pub listened_at: DateTime<Utc>,
    pub duration: i64,
}

impl From<HistoryRow> for HistoryEntryDto {
    fn from(row: HistoryRow) -> Self {
        Self {
            song: row.song.into(),
            listened_at: row.listened_at,
            duration: row.duration_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDto {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub creator: CreatorRef,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    pub song_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlaylistRow> for PlaylistDto {
    fn from(row: PlaylistRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            creator: CreatorRef {
                id: row.creator_id,
                username: row.creator_username,
                full_name: None,
            },
            is_public: row.is_public,
            cover_url: row.cover_url,
            song_count: row.song_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSongDto {
    #[serde(flatten)]
    pub song: SongDto,
    pub position: i32,
    pub added_at: DateTime<Utc>,
}

impl From<PlaylistSongRow> for PlaylistSongDto {
    fn from(row: PlaylistSongRow) -> Self {
        Self {
            song: row.song.into(),
            position: row.position,
            added_at: row.added_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDto {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub creator: CreatorRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
    pub is_public: bool,
    pub song_count: i64,
    pub total_listens: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AlbumRow> for AlbumDto {
    fn from(row: AlbumRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            creator: CreatorRef {
                id: row.creator_id,
                username: row.creator_username,
                full_name: row.creator_full_name,
            },
            cover_url: row.cover_url,
            release_date: row.release_date,
            is_public: row.is_public,
            song_count: row.song_count,
            total_listens: row.total_listens,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumSongDto {
    #[serde(flatten)]
    pub song: SongDto,
    pub position: i32,
}

impl From<AlbumSongRow> for AlbumSongDto {
    fn from(row: AlbumSongRow) -> Self {
        Self {
            song: row.song.into(),
            position: row.position,
        }
    }
}

/// The caller's own profile, including private fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserDto {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            full_name: row.full_name,
            role: row.role,
            avatar_url: row.avatar_url,
            bio: row.bio,
            gender: row.gender,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// What anyone may see about a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUserDto {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: String,
}

impl From<UserSummary> for PublicUserDto {
    fn from(row: UserSummary) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            bio: row.bio,
            role: row.role,
        }
    }
}

impl From<UserRow> for PublicUserDto {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            bio: row.bio,
            role: row.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestDto {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FriendRequestRow> for FriendRequestDto {
    fn from(row: FriendRequestRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderRef {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequestDto {
    pub id: Uuid,
    pub sender: SenderRef,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<IncomingRequestRow> for IncomingRequestDto {
    fn from(row: IncomingRequestRow) -> Self {
        Self {
            id: row.id,
            sender: SenderRef {
                id: row.sender_id,
                username: row.sender_username,
                full_name: row.sender_full_name,
                avatar_url: row.sender_avatar_url,
            },
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> SongRow {
        let now = Utc::now();
        SongRow {
            id: Uuid::from_u128(1),
            title: "Tum Hi Ho".to_string(),
            artist: "Arijit Singh".to_string(),
            movie: Some("Aashiqui 2".to_string()),
            creator_id: Uuid::from_u128(2),
            category_id: Some(Uuid::from_u128(3)),
            category_name: Some("romantic".to_string()),
            category_color: None,
            creator_username: Some("maker".to_string()),
            creator_full_name: None,
            audio_url: None,
            cover_url: None,
            lyrics: None,
            duration: 262,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn song_json_is_camel_case_and_skips_missing() {
        let json = serde_json::to_value(SongDto::from(row())).unwrap();
        assert_eq!(json["isPublic"], true);
        assert_eq!(json["category"]["name"], "romantic");
        assert_eq!(json["creator"]["username"], "maker");
        assert!(json.get("audioUrl").is_none());
        assert!(json["category"].get("color").is_none());
    }

    #[test]
    fn favorites_flatten_the_song() {
        let fav = FavoriteDto::from(FavoriteRow {
            song: row(),
            favorited_at: Utc::now(),
        });
        let json = serde_json::to_value(fav).unwrap();
        assert_eq!(json["title"], "Tum Hi Ho");
        assert!(json.get("favoritedAt").is_some());
    }

    #[test]
    fn playlist_carries_owner_and_count() {
        let now = Utc::now();
        let json = serde_json::to_value(PlaylistDto::from(PlaylistRow {
            id: Uuid::from_u128(9),
            name: "Late night".to_string(),
            description: None,
            creator_id: Uuid::from_u128(2),
            creator_username: Some("maker".to_string()),
            is_public: false,
            cover_url: None,
            song_count: 3,
            created_at: now,
            updated_at: now,
        }))
        .unwrap();
        assert_eq!(json["songCount"], 3);
        assert_eq!(json["isPublic"], false);
        assert_eq!(json["creator"]["username"], "maker");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn public_profile_hides_email() {
        let now = Utc::now();
        let user = UserRow {
            id: Uuid::from_u128(4),
            email: "private@example.com".to_string(),
            username: "listener".to_string(),
            full_name: None,
            avatar_url: None,
            bio: Some("hi".to_string()),
            gender: Some("f".to_string()),
            role: "listener".to_string(),
            created_at: now,
            updated_at: now,
        };
        let public = serde_json::to_value(PublicUserDto::from(user.clone())).unwrap();
        assert!(public.get("email").is_none());
        assert!(public.get("gender").is_none());
        assert_eq!(public["bio"], "hi");

        let own = serde_json::to_value(UserDto::from(user)).unwrap();
        assert_eq!(own["email"], "private@example.com");
    }
}

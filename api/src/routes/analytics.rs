use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::PageQuery;
use crate::analytics::{
    self, CreatorSong, DayPlays, PeriodOverview, SongSummary, TopSong, TrendingEntry,
    DEFAULT_TOP_SONGS, DEFAULT_WINDOW_DAYS,
};
use crate::auth::AuthUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{CreatorActivity, ListenerActivity, SongRow};
use crate::responses::{HistoryEntryDto, Pagination, SongDto};
use crate::AppState;

const MAX_PERIOD_DAYS: i64 = 365;
const MAX_TRENDING_LIMIT: usize = 100;
const RECENT_CREATOR_ACTIVITY: i64 = 10;
const RECENT_LISTENERS: i64 = 20;
const FOR_YOU_WINDOW_DAYS: i64 = 30;
const FOR_YOU_CANDIDATES: usize = 200;

fn parse_period(period: Option<i64>, default: i64) -> ApiResult<i64> {
    let period = period.unwrap_or(default);
    if !(1..=MAX_PERIOD_DAYS).contains(&period) {
        return Err(ApiError::BadRequest(format!(
            "period must be between 1 and {} days",
            MAX_PERIOD_DAYS
        )));
    }
    Ok(period)
}

fn parse_limit(limit: Option<usize>, default: usize) -> ApiResult<usize> {
    let limit = limit.unwrap_or(default);
    if !(1..=MAX_TRENDING_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_TRENDING_LIMIT
        )));
    }
    Ok(limit)
}

/// Resolves ranked entries to public songs, dropping ids that no longer
/// resolve and keeping rank order.
fn attach_songs(ranked: &[TrendingEntry], songs: Vec<SongRow>) -> Vec<TrendingSongDto> {
    let mut by_id: HashMap<Uuid, SongRow> = songs.into_iter().map(|s| (s.id, s)).collect();
    ranked
        .iter()
        .filter_map(|entry| {
            by_id.remove(&entry.song_id).map(|song| TrendingSongDto {
                song: song.into(),
                total_plays: entry.total_plays,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    period: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    period: Option<i64>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPlayRequest {
    song_id: Option<Uuid>,
    duration: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorOverview {
    pub total_songs: i64,
    pub total_listens: i64,
    pub total_favorites: i64,
    pub monthly_listeners: i64,
}

#[derive(Debug, Serialize)]
pub struct PeriodAnalytics {
    pub period: String,
    #[serde(flatten)]
    pub overview: PeriodOverview,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorActivityDto {
    pub song_id: Uuid,
    pub song_title: String,
    pub song_artist: String,
    pub play_count: i64,
    pub listen_duration: i64,
    pub last_played: DateTime<Utc>,
}

impl From<CreatorActivity> for CreatorActivityDto {
    fn from(row: CreatorActivity) -> Self {
        Self {
            song_id: row.song_id,
            song_title: row.song_title,
            song_artist: row.song_artist,
            play_count: row.play_count,
            listen_duration: row.total_listen_duration,
            last_played: row.last_played_at,
        }
    }
}

/// One of the creator's songs with its lifetime totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSongDto {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub created_at: DateTime<Utc>,
    pub analytics: SongSummary,
}

impl From<&CreatorSong> for CreatorSongDto {
    fn from(song: &CreatorSong) -> Self {
        Self {
            id: song.id,
            title: song.title.clone(),
            artist: song.artist.clone(),
            created_at: song.created_at,
            analytics: analytics::summarize_song(&song.rollups),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorDashboardResponse {
    pub overview: CreatorOverview,
    pub period_analytics: PeriodAnalytics,
    pub top_songs: Vec<TopSong>,
    pub recent_activity: Vec<CreatorActivityDto>,
    pub songs: Vec<CreatorSongDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerRef {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerActivityDto {
    pub listener: ListenerRef,
    pub play_count: i64,
    pub listen_duration: i64,
    pub last_played: DateTime<Utc>,
}

impl From<ListenerActivity> for ListenerActivityDto {
    fn from(row: ListenerActivity) -> Self {
        Self {
            listener: ListenerRef {
                id: row.listener_id,
                username: row.username,
                full_name: row.full_name,
            },
            play_count: row.play_count,
            listen_duration: row.total_listen_duration,
            last_played: row.last_played_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongAnalyticsBody {
    #[serde(flatten)]
    pub summary: SongSummary,
    pub daily_plays: Vec<DayPlays>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongAnalyticsResponse {
    pub song: SongDto,
    pub analytics: SongAnalyticsBody,
    pub recent_activity: Vec<ListenerActivityDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPlayResponse {
    pub message: String,
    pub play_count: i64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntryDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingSongDto {
    #[serde(flatten)]
    pub song: SongDto,
    pub total_plays: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingResponse {
    pub period: String,
    pub trending_songs: Vec<TrendingSongDto>,
}

#[derive(Debug, Serialize)]
pub struct ForYouResponse {
    pub songs: Vec<TrendingSongDto>,
}

pub async fn creator_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<Json<CreatorDashboardResponse>> {
    user.require_creator()?;
    let Query(query) = query?;
    let period = parse_period(query.period, DEFAULT_WINDOW_DAYS as i64)?;
    let now = Utc::now();

    let stats = db::creator_stats(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch creator stats", e))?
        .unwrap_or_default();

    let songs = db::songs_for_creator(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch songs", e))?;
    let rollups = db::rollups_for_creator(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song analytics", e))?;
    let recent = db::recent_creator_activity(
        &state.db,
        user.user_id,
        now - Duration::days(period),
        RECENT_CREATOR_ACTIVITY,
    )
    .await
    .map_err(|e| ApiError::store("Failed to fetch recent activity", e))?;

    let songs = analytics::group_by_song(songs, rollups);
    tracing::debug!(
        "creator {} dashboard: {} songs over {} days",
        user.user_id,
        songs.len(),
        period
    );

    Ok(Json(CreatorDashboardResponse {
        overview: CreatorOverview {
            total_songs: stats.total_songs,
            total_listens: stats.total_listens,
            total_favorites: stats.total_favorites,
            monthly_listeners: stats.monthly_listeners,
        },
        period_analytics: PeriodAnalytics {
            period: format!("{} days", period),
            overview: analytics::period_overview(&songs, period, now),
        },
        top_songs: analytics::top_songs(&songs, DEFAULT_TOP_SONGS),
        recent_activity: recent.into_iter().map(CreatorActivityDto::from).collect(),
        songs: songs.iter().map(CreatorSongDto::from).collect(),
    }))
}

pub async fn song_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    song_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<SongAnalyticsResponse>> {
    user.require_creator()?;
    let Path(song_id) = song_id?;

    let song = db::get_song(&state.db, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song", e))?
        .filter(|song| song.creator_id == user.user_id)
        .ok_or_else(|| ApiError::NotFound("Song not found or access denied".to_string()))?;

    let rollups = db::rollups_for_song(&state.db, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song analytics", e))?;

    let today = Utc::now().date_naive();
    let window_start = (today - Duration::days(DEFAULT_WINDOW_DAYS as i64 - 1))
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now);
    let events = db::events_for_song_since(&state.db, song_id, window_start)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song analytics", e))?;

    // rollups imported without a play log still get a series
    let daily_plays = if events.is_empty() {
        analytics::daily_series(&rollups, DEFAULT_WINDOW_DAYS, today)
    } else {
        analytics::daily_series_from_events(&events, DEFAULT_WINDOW_DAYS, today)
    };

    let recent = db::recent_listeners(&state.db, song_id, RECENT_LISTENERS)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song analytics", e))?;

    Ok(Json(SongAnalyticsResponse {
        song: song.into(),
        analytics: SongAnalyticsBody {
            summary: analytics::summarize_song(&rollups),
            daily_plays,
        },
        recent_activity: recent.into_iter().map(ListenerActivityDto::from).collect(),
    }))
}

pub async fn track_play(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<TrackPlayRequest>, JsonRejection>,
) -> ApiResult<Json<TrackPlayResponse>> {
    let Json(body) = body?;
    let song_id = body
        .song_id
        .ok_or_else(|| ApiError::BadRequest("Song ID is required".to_string()))?;
    let duration = body.duration.unwrap_or(0);
    if duration < 0 {
        return Err(ApiError::BadRequest("duration cannot be negative".to_string()));
    }

    db::get_song(&state.db, song_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch song", e))?
        .filter(|song| song.is_public || song.creator_id == user.user_id)
        .ok_or_else(|| ApiError::NotFound("Song not found".to_string()))?;

    let rollup = db::record_play(&state.db, song_id, user.user_id, duration).await?;
    tracing::debug!(
        "play tracked: song={} listener={} count={}",
        song_id,
        user.user_id,
        rollup.play_count
    );

    Ok(Json(TrackPlayResponse {
        message: "Play tracked successfully".to_string(),
        play_count: rollup.play_count,
    }))
}

pub async fn listening_history(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<HistoryResponse>> {
    let Query(paging) = query?;

    let (rows, total) = db::listening_history(&state.db, user.user_id, paging.window())
        .await
        .map_err(|e| ApiError::store("Failed to fetch listening history", e))?;

    Ok(Json(HistoryResponse {
        history: rows.into_iter().map(HistoryEntryDto::from).collect(),
        pagination: paging.pagination(total),
    }))
}

pub async fn trending_songs(
    State(state): State<AppState>,
    query: Result<Query<TrendingQuery>, QueryRejection>,
) -> ApiResult<Json<TrendingResponse>> {
    let Query(query) = query?;
    let period = parse_period(query.period, 7)?;
    let limit = parse_limit(query.limit, 10)?;
    let now = Utc::now();

    let rollups = db::public_rollups_since(&state.db, now - Duration::days(period))
        .await
        .map_err(|e| ApiError::store("Failed to fetch trending songs", e))?;
    let ranked = analytics::trending(&rollups, period, limit, now);

    let ids: Vec<Uuid> = ranked.iter().map(|e| e.song_id).collect();
    let songs = db::public_songs_by_ids(&state.db, &ids)
        .await
        .map_err(|e| ApiError::store("Failed to fetch trending songs", e))?;

    Ok(Json(TrendingResponse {
        period: format!("{} days", period),
        trending_songs: attach_songs(&ranked, songs),
    }))
}

pub async fn for_you(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<ForYouResponse>> {
    let Query(query) = query?;
    let limit = parse_limit(query.limit, 10)?;
    let now = Utc::now();

    let rollups = db::public_rollups_since(&state.db, now - Duration::days(FOR_YOU_WINDOW_DAYS))
        .await
        .map_err(|e| ApiError::store("Failed to fetch recommendations", e))?;
    let ranked = analytics::trending(&rollups, FOR_YOU_WINDOW_DAYS, FOR_YOU_CANDIDATES, now);

    let favorites: HashSet<Uuid> = db::favorite_song_ids(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch recommendations", e))?
        .into_iter()
        .collect();
    let listened: HashSet<Uuid> = db::listened_category_ids(&state.db, user.user_id)
        .await
        .map_err(|e| ApiError::store("Failed to fetch recommendations", e))?
        .into_iter()
        .collect();

    let ids: Vec<Uuid> = ranked.iter().map(|e| e.song_id).collect();
    let songs = db::public_songs_by_ids(&state.db, &ids)
        .await
        .map_err(|e| ApiError::store("Failed to fetch recommendations", e))?;
    let category_of: HashMap<Uuid, Option<Uuid>> =
        songs.iter().map(|s| (s.id, s.category_id)).collect();

    let picks = analytics::for_you(
        &ranked,
        |song_id| {
            category_of
                .get(&song_id)
                .copied()
                .flatten()
                .is_some_and(|category| listened.contains(&category))
        },
        &favorites,
        limit,
    );

    Ok(Json(ForYouResponse {
        songs: attach_songs(&picks, songs),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SongPlayRollup;

    fn song_row(id: u128) -> SongRow {
        let created = Utc::now();
        SongRow {
            id: Uuid::from_u128(id),
            title: format!("song {}", id),
            artist: "artist".to_string(),
            movie: None,
            creator_id: Uuid::from_u128(99),
            category_id: None,
            category_name: None,
            category_color: None,
            creator_username: None,
            creator_full_name: None,
            audio_url: None,
            cover_url: None,
            lyrics: None,
            duration: 180,
            is_public: true,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn period_bounds_are_checked() {
        assert_eq!(parse_period(None, 30).unwrap(), 30);
        assert_eq!(parse_period(Some(7), 30).unwrap(), 7);
        assert!(parse_period(Some(0), 30).is_err());
        assert!(parse_period(Some(366), 30).is_err());
        assert!(parse_limit(Some(0), 10).is_err());
        assert_eq!(parse_limit(None, 10).unwrap(), 10);
    }

    #[test]
    fn attached_songs_follow_rank_and_skip_missing() {
        let ranked = vec![
            TrendingEntry { song_id: Uuid::from_u128(3), total_plays: 9 },
            TrendingEntry { song_id: Uuid::from_u128(8), total_plays: 5 },
            TrendingEntry { song_id: Uuid::from_u128(1), total_plays: 2 },
        ];
        let attached = attach_songs(&ranked, vec![song_row(1), song_row(3)]);
        let ids: Vec<u128> = attached.iter().map(|t| t.song.id.as_u128()).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(attached[0].total_plays, 9);
    }

    #[test]
    fn dashboard_song_entries_carry_lifetime_totals() {
        let song = song_row(5);
        let rollup = |listener: u128, plays: i64| SongPlayRollup {
            song_id: song.id,
            listener_id: Uuid::from_u128(listener),
            play_count: plays,
            total_listen_duration: plays * 60,
            last_played_at: Utc::now(),
        };
        let grouped = analytics::group_by_song(vec![song.clone()], vec![rollup(1, 3), rollup(2, 1)]);

        let json = serde_json::to_value(CreatorSongDto::from(&grouped[0])).unwrap();
        assert_eq!(json["id"], song.id.to_string());
        assert_eq!(json["analytics"]["totalPlays"], 4);
        assert_eq!(json["analytics"]["uniqueListeners"], 2);
        assert!(json.get("createdAt").is_some());
    }
}

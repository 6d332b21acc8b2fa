use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::models::*;

mod library;
mod social;

pub use library::*;
pub use social::*;

const SONG_COLUMNS: &str = r#"
    s.id, s.title, s.artist, s.movie, s.creator_id, s.category_id,
    c.name AS category_name, c.color AS category_color,
    u.username AS creator_username, u.full_name AS creator_full_name,
    s.audio_url, s.cover_url, s.lyrics, s.duration, s.is_public,
    s.created_at, s.updated_at
"#;

const SONG_JOINS: &str = r#"
    LEFT JOIN song_categories c ON c.id = s.category_id
    LEFT JOIN users u ON u.id = s.creator_id
"#;

const ROLLUP_COLUMNS: &str =
    "a.song_id, a.listener_id, a.play_count, a.total_listen_duration, a.last_played_at";

pub async fn init_db(database_url: &str) -> Result<PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(50)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Offset/limit window derived from 1-based paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SongSort {
    #[default]
    CreatedAt,
    Title,
    Artist,
    /// Lifetime plays summed over every listener's rollup.
    Popularity,
}

impl SongSort {
    fn column(self) -> &'static str {
        match self {
            SongSort::CreatedAt => "s.created_at",
            SongSort::Title => "s.title",
            SongSort::Artist => "s.artist",
            SongSort::Popularity => {
                "COALESCE((SELECT SUM(sa.play_count) FROM song_analytics sa WHERE sa.song_id = s.id), 0)"
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SongFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub creator: Option<String>,
    pub sort: SongSort,
    pub ascending: bool,
}

/// Partial metadata update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub movie: Option<String>,
    pub category_id: Option<Uuid>,
    pub lyrics: Option<String>,
    pub is_public: Option<bool>,
}

/// `%term%` for ILIKE with the pattern metacharacters escaped.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.trim().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_song_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &SongFilter) {
    qb.push(" WHERE s.is_public = TRUE");

    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (s.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.artist ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.movie ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = &filter.category {
        qb.push(" AND c.name = ").push_bind(category.clone());
    }
    if let Some(creator) = &filter.creator {
        qb.push(" AND u.username = ").push_bind(creator.clone());
    }
}

pub async fn list_public_songs(
    pool: &PgPool,
    filter: &SongFilter,
    page: Page,
) -> Result<(Vec<SongRow>, i64)> {
    let mut count_qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM songs s {}", SONG_JOINS));
    push_song_filters(&mut count_qb, filter);
    let total = count_qb.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(format!("SELECT {} FROM songs s {}", SONG_COLUMNS, SONG_JOINS));
    push_song_filters(&mut qb, filter);
    qb.push(format!(
        " ORDER BY {} {}, s.id",
        filter.sort.column(),
        if filter.ascending { "ASC" } else { "DESC" }
    ));
    qb.push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let songs = qb.build_query_as::<SongRow>().fetch_all(pool).await?;
    Ok((songs, total))
}

/// Any song regardless of visibility.
pub async fn get_song(pool: &PgPool, song_id: Uuid) -> Result<Option<SongRow>> {
    let song = sqlx::query_as::<_, SongRow>(&format!(
        "SELECT {} FROM songs s {} WHERE s.id = $1",
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(song_id)
    .fetch_optional(pool)
    .await?;

    Ok(song)
}

pub async fn get_public_song(pool: &PgPool, song_id: Uuid) -> Result<Option<SongRow>> {
    Ok(get_song(pool, song_id).await?.filter(|s| s.is_public))
}

pub async fn public_songs_by_creator(
    pool: &PgPool,
    creator_id: Uuid,
    page: Page,
) -> Result<(Vec<SongRow>, i64)> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM songs WHERE creator_id = $1 AND is_public = TRUE",
    )
    .bind(creator_id)
    .fetch_one(pool)
    .await?;

    let songs = sqlx::query_as::<_, SongRow>(&format!(
        r#"
        SELECT {} FROM songs s {}
        WHERE s.creator_id = $1 AND s.is_public = TRUE
        ORDER BY s.created_at DESC, s.id
        LIMIT $2 OFFSET $3
        "#,
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(creator_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok((songs, total))
}

/// Every song a creator owns, newest first.
pub async fn songs_for_creator(pool: &PgPool, creator_id: Uuid) -> Result<Vec<SongRow>> {
    let songs = sqlx::query_as::<_, SongRow>(&format!(
        "SELECT {} FROM songs s {} WHERE s.creator_id = $1 ORDER BY s.created_at DESC, s.id",
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(creator_id)
    .fetch_all(pool)
    .await?;

    Ok(songs)
}

pub async fn public_songs_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<SongRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let songs = sqlx::query_as::<_, SongRow>(&format!(
        "SELECT {} FROM songs s {} WHERE s.id = ANY($1) AND s.is_public = TRUE",
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(songs)
}

/// Public songs in the named categories, earlier names first.
pub async fn public_songs_in_categories(
    pool: &PgPool,
    categories: &[String],
    limit: i64,
) -> Result<Vec<SongRow>> {
    let songs = sqlx::query_as::<_, SongRow>(&format!(
        r#"
        SELECT {} FROM songs s {}
        WHERE s.is_public = TRUE AND c.name = ANY($1)
        ORDER BY array_position($1, c.name), s.created_at DESC, s.id
        LIMIT $2
        "#,
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(categories)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(songs)
}

/// Applies `update` if `owner_id` owns the song. `None` when the song is
/// missing or owned by someone else.
pub async fn update_song(
    pool: &PgPool,
    song_id: Uuid,
    owner_id: Uuid,
    update: &SongUpdate,
) -> Result<Option<SongRow>> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE songs SET
            title = COALESCE($3, title),
            artist = COALESCE($4, artist),
            movie = COALESCE($5, movie),
            category_id = COALESCE($6, category_id),
            lyrics = COALESCE($7, lyrics),
            is_public = COALESCE($8, is_public),
            updated_at = NOW()
        WHERE id = $1 AND creator_id = $2
        RETURNING id
        "#,
    )
    .bind(song_id)
    .bind(owner_id)
    .bind(&update.title)
    .bind(&update.artist)
    .bind(&update.movie)
    .bind(update.category_id)
    .bind(&update.lyrics)
    .bind(update.is_public)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(id) => get_song(pool, id).await,
        None => Ok(None),
    }
}

/// Deletes the song if `owner_id` owns it. Rollups, play log, favorites
/// and playlist entries go with it through the foreign keys.
pub async fn delete_song(pool: &PgPool, song_id: Uuid, owner_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM songs WHERE id = $1 AND creator_id = $2")
        .bind(song_id)
        .bind(owner_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRow>> {
    let categories = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, color, description FROM song_categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

pub async fn rollups_for_song(pool: &PgPool, song_id: Uuid) -> Result<Vec<SongPlayRollup>> {
    let rollups = sqlx::query_as::<_, SongPlayRollup>(&format!(
        "SELECT {} FROM song_analytics a WHERE a.song_id = $1 ORDER BY a.last_played_at DESC",
        ROLLUP_COLUMNS
    ))
    .bind(song_id)
    .fetch_all(pool)
    .await?;

    Ok(rollups)
}

pub async fn rollups_for_creator(pool: &PgPool, creator_id: Uuid) -> Result<Vec<SongPlayRollup>> {
    let rollups = sqlx::query_as::<_, SongPlayRollup>(&format!(
        r#"
        SELECT {} FROM song_analytics a
        JOIN songs s ON s.id = a.song_id
        WHERE s.creator_id = $1
        "#,
        ROLLUP_COLUMNS
    ))
    .bind(creator_id)
    .fetch_all(pool)
    .await?;

    Ok(rollups)
}

/// Rollups on public songs last played at or after `since`.
pub async fn public_rollups_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<SongPlayRollup>> {
    let rollups = sqlx::query_as::<_, SongPlayRollup>(&format!(
        r#"
        SELECT {} FROM song_analytics a
        JOIN songs s ON s.id = a.song_id
        WHERE s.is_public = TRUE AND a.last_played_at >= $1
        "#,
        ROLLUP_COLUMNS
    ))
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rollups)
}

pub async fn events_for_song_since(
    pool: &PgPool,
    song_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<ListenEvent>> {
    let events = sqlx::query_as::<_, ListenEvent>(
        r#"
        SELECT song_id, listener_id, duration_seconds, occurred_at
        FROM listen_events
        WHERE song_id = $1 AND occurred_at >= $2
        ORDER BY occurred_at
        "#,
    )
    .bind(song_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(events)
}

pub async fn recent_listeners(
    pool: &PgPool,
    song_id: Uuid,
    limit: i64,
) -> Result<Vec<ListenerActivity>> {
    let rows = sqlx::query_as::<_, ListenerActivity>(
        r#"
        SELECT a.listener_id, u.username, u.full_name,
               a.play_count, a.total_listen_duration, a.last_played_at
        FROM song_analytics a
        LEFT JOIN users u ON u.id = a.listener_id
        WHERE a.song_id = $1
        ORDER BY a.last_played_at DESC
        LIMIT $2
        "#,
    )
    .bind(song_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn recent_creator_activity(
    pool: &PgPool,
    creator_id: Uuid,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<CreatorActivity>> {
    let rows = sqlx::query_as::<_, CreatorActivity>(
        r#"
        SELECT s.id AS song_id, s.title AS song_title, s.artist AS song_artist,
               a.play_count, a.total_listen_duration, a.last_played_at
        FROM song_analytics a
        JOIN songs s ON s.id = a.song_id
        WHERE s.creator_id = $1 AND a.last_played_at >= $2
        ORDER BY a.last_played_at DESC
        LIMIT $3
        "#,
    )
    .bind(creator_id)
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn creator_stats(pool: &PgPool, creator_id: Uuid) -> Result<Option<CreatorStats>> {
    let stats = sqlx::query_as::<_, CreatorStats>(
        r#"
        SELECT creator_id, total_songs, total_listens, total_favorites, monthly_listeners
        FROM creator_stats
        WHERE creator_id = $1
        "#,
    )
    .bind(creator_id)
    .fetch_optional(pool)
    .await?;

    Ok(stats)
}

/// Logs one play and bumps the (song, listener) rollup in the same
/// transaction. The increment happens inside the upsert, so concurrent plays
/// for the same pair serialize on the row lock.
pub async fn record_play(
    pool: &PgPool,
    song_id: Uuid,
    listener_id: Uuid,
    duration_seconds: i64,
) -> Result<SongPlayRollup> {
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("Failed to begin transaction: {}", e);
        e
    })?;

    sqlx::query(
        "INSERT INTO listen_events (song_id, listener_id, duration_seconds) VALUES ($1, $2, $3)",
    )
    .bind(song_id)
    .bind(listener_id)
    .bind(duration_seconds)
    .execute(&mut *tx)
    .await?;

    let rollup = sqlx::query_as::<_, SongPlayRollup>(
        r#"
        INSERT INTO song_analytics AS a
            (song_id, listener_id, play_count, total_listen_duration, last_played_at)
        VALUES ($1, $2, 1, $3, NOW())
        ON CONFLICT (song_id, listener_id)
        DO UPDATE SET
            play_count = a.play_count + 1,
            total_listen_duration = a.total_listen_duration + EXCLUDED.total_listen_duration,
            last_played_at = NOW()
        RETURNING song_id, listener_id, play_count, total_listen_duration, last_played_at
        "#,
    )
    .bind(song_id)
    .bind(listener_id)
    .bind(duration_seconds)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit transaction: {}", e);
        e
    })?;

    Ok(rollup)
}

pub async fn listening_history(
    pool: &PgPool,
    user_id: Uuid,
    page: Page,
) -> Result<(Vec<HistoryRow>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listen_events WHERE listener_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, HistoryRow>(&format!(
        r#"
        SELECT {}, e.occurred_at AS listened_at, e.duration_seconds
        FROM listen_events e
        JOIN songs s ON s.id = e.song_id
        {}
        WHERE e.listener_id = $1
        ORDER BY e.occurred_at DESC, e.id DESC
        LIMIT $2 OFFSET $3
        "#,
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

/// Categories of songs the user has played at least once.
pub async fn listened_category_ids(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT s.category_id
        FROM song_analytics a
        JOIN songs s ON s.id = a.song_id
        WHERE a.listener_id = $1 AND s.category_id IS NOT NULL
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Fails with a unique violation when the pair already exists.
pub async fn add_favorite(pool: &PgPool, user_id: Uuid, song_id: Uuid) -> Result<()> {
    sqlx::query("INSERT INTO user_favorites (user_id, song_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(song_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Returns whether a row was actually removed.
pub async fn remove_favorite(pool: &PgPool, user_id: Uuid, song_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND song_id = $2")
        .bind(user_id)
        .bind(song_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn is_favorite(pool: &PgPool, user_id: Uuid, song_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM user_favorites WHERE user_id = $1 AND song_id = $2)",
    )
    .bind(user_id)
    .bind(song_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

pub async fn count_favorites(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_favorites WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

pub async fn favorite_song_ids(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<Uuid> = sqlx::query_scalar("SELECT song_id FROM user_favorites WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(ids)
}

/// Narrows a favorites listing; both fields unset means everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct FavoriteFilter<'a> {
    pub category: Option<&'a str>,
    pub creator_id: Option<Uuid>,
}

/// A user's favorites, newest first.
pub async fn list_favorites(
    pool: &PgPool,
    user_id: Uuid,
    filter: FavoriteFilter<'_>,
    page: Page,
) -> Result<(Vec<FavoriteRow>, i64)> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM user_favorites f
        JOIN songs s ON s.id = f.song_id
        LEFT JOIN song_categories c ON c.id = s.category_id
        WHERE f.user_id = $1
          AND ($2::TEXT IS NULL OR c.name = $2)
          AND ($3::UUID IS NULL OR s.creator_id = $3)
        "#,
    )
    .bind(user_id)
    .bind(filter.category)
    .bind(filter.creator_id)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, FavoriteRow>(&format!(
        r#"
        SELECT {}, f.created_at AS favorited_at
        FROM user_favorites f
        JOIN songs s ON s.id = f.song_id
        {}
        WHERE f.user_id = $1
          AND ($2::TEXT IS NULL OR c.name = $2)
          AND ($3::UUID IS NULL OR s.creator_id = $3)
        ORDER BY f.created_at DESC, f.id DESC
        LIMIT $4 OFFSET $5
        "#,
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(user_id)
    .bind(filter.category)
    .bind(filter.creator_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCounts {
    pub users: i64,
    pub songs: i64,
    pub rollups: i64,
    pub listen_events: i64,
    pub favorites: i64,
    pub playlists: i64,
    pub albums: i64,
    pub friendships: i64,
}

pub async fn store_counts(pool: &PgPool) -> Result<StoreCounts> {
    let row: (i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users),
            (SELECT COUNT(*) FROM songs),
            (SELECT COUNT(*) FROM song_analytics),
            (SELECT COUNT(*) FROM listen_events),
            (SELECT COUNT(*) FROM user_favorites),
            (SELECT COUNT(*) FROM playlists),
            (SELECT COUNT(*) FROM albums),
            (SELECT COUNT(*) FROM friend_requests WHERE status = 'accepted')
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(StoreCounts {
        users: row.0,
        songs: row.1,
        rollups: row.2,
        listen_events: row.3,
        favorites: row.4,
        playlists: row.5,
        albums: row.6,
        friendships: row.7,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("love"), "%love%");
        assert_eq!(like_pattern("  50% off_"), "%50\\% off\\_%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn sort_columns_are_whitelisted() {
        assert_eq!(SongSort::default().column(), "s.created_at");
        assert_eq!(SongSort::Title.column(), "s.title");
        assert_eq!(SongSort::Artist.column(), "s.artist");
        assert!(SongSort::Popularity.column().contains("SUM(sa.play_count)"));
    }
}

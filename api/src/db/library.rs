//! Playlists and albums: ordered collections of songs.

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;
use uuid::Uuid;

use super::{Page, SONG_COLUMNS, SONG_JOINS};
use crate::models::{AlbumRow, AlbumSongRow, PlaylistRow, PlaylistSongRow};

const PLAYLIST_COLUMNS: &str = r#"
    p.id, p.name, p.description, p.creator_id, u.username AS creator_username,
    p.is_public, p.cover_url,
    (SELECT COUNT(*) FROM playlist_songs ps WHERE ps.playlist_id = p.id) AS song_count,
    p.created_at, p.updated_at
"#;

const ALBUM_COLUMNS: &str = r#"
    al.id, al.title, al.description, al.creator_id,
    u.username AS creator_username, u.full_name AS creator_full_name,
    al.cover_url, al.release_date, al.is_public,
    (SELECT COUNT(*) FROM album_songs x WHERE x.album_id = al.id) AS song_count,
    (SELECT COALESCE(SUM(sa.play_count), 0)::BIGINT
       FROM album_songs x JOIN song_analytics sa ON sa.song_id = x.song_id
      WHERE x.album_id = al.id) AS total_listens,
    al.created_at, al.updated_at
"#;

#[derive(Debug, Clone, Default)]
pub struct NewPlaylist {
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub cover_url: Option<String>,
}

/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PlaylistUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAlbum {
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AlbumUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub is_public: Option<bool>,
}

pub async fn create_playlist(pool: &PgPool, owner_id: Uuid, new: &NewPlaylist) -> Result<PlaylistRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO playlists (id, name, description, creator_id, is_public, cover_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(owner_id)
    .bind(new.is_public)
    .bind(&new.cover_url)
    .execute(pool)
    .await?;

    get_playlist(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("playlist {} vanished after insert", id))
}

pub async fn get_playlist(pool: &PgPool, playlist_id: Uuid) -> Result<Option<PlaylistRow>> {
    let playlist = sqlx::query_as::<_, PlaylistRow>(&format!(
        "SELECT {} FROM playlists p LEFT JOIN users u ON u.id = p.creator_id WHERE p.id = $1",
        PLAYLIST_COLUMNS
    ))
    .bind(playlist_id)
    .fetch_optional(pool)
    .await?;

    Ok(playlist)
}

/// `None` unless `owner_id` owns the playlist.
pub async fn owned_playlist(
    pool: &PgPool,
    playlist_id: Uuid,
    owner_id: Uuid,
) -> Result<Option<PlaylistRow>> {
    Ok(get_playlist(pool, playlist_id)
        .await?
        .filter(|p| p.creator_id == owner_id))
}

pub async fn public_playlist(pool: &PgPool, playlist_id: Uuid) -> Result<Option<PlaylistRow>> {
    Ok(get_playlist(pool, playlist_id).await?.filter(|p| p.is_public))
}

pub async fn playlists_for_owner(
    pool: &PgPool,
    owner_id: Uuid,
    page: Page,
) -> Result<(Vec<PlaylistRow>, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlists WHERE creator_id = $1")
        .bind(owner_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, PlaylistRow>(&format!(
        r#"
        SELECT {} FROM playlists p LEFT JOIN users u ON u.id = p.creator_id
        WHERE p.creator_id = $1
        ORDER BY p.created_at DESC, p.id
        LIMIT $2 OFFSET $3
        "#,
        PLAYLIST_COLUMNS
    ))
    .bind(owner_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

/// Public playlists, optionally only those of the named user.
pub async fn public_playlists(
    pool: &PgPool,
    creator_username: Option<&str>,
    page: Page,
) -> Result<(Vec<PlaylistRow>, i64)> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM playlists p LEFT JOIN users u ON u.id = p.creator_id
        WHERE p.is_public = TRUE AND ($1::TEXT IS NULL OR u.username = $1)
        "#,
    )
    .bind(creator_username)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, PlaylistRow>(&format!(
        r#"
        SELECT {} FROM playlists p LEFT JOIN users u ON u.id = p.creator_id
        WHERE p.is_public = TRUE AND ($1::TEXT IS NULL OR u.username = $1)
        ORDER BY p.created_at DESC, p.id
        LIMIT $2 OFFSET $3
        "#,
        PLAYLIST_COLUMNS
    ))
    .bind(creator_username)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

pub async fn update_playlist(
    pool: &PgPool,
    playlist_id: Uuid,
    owner_id: Uuid,
    update: &PlaylistUpdate,
) -> Result<Option<PlaylistRow>> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE playlists SET
            name = COALESCE($3, name),
            description = COALESCE($4, description),
            is_public = COALESCE($5, is_public),
            updated_at = NOW()
        WHERE id = $1 AND creator_id = $2
        RETURNING id
        "#,
    )
    .bind(playlist_id)
    .bind(owner_id)
    .bind(&update.name)
    .bind(&update.description)
    .bind(update.is_public)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(id) => get_playlist(pool, id).await,
        None => Ok(None),
    }
}

pub async fn delete_playlist(pool: &PgPool, playlist_id: Uuid, owner_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM playlists WHERE id = $1 AND creator_id = $2")
        .bind(playlist_id)
        .bind(owner_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Songs of a playlist in play order. Private songs are left out.
pub async fn playlist_songs(pool: &PgPool, playlist_id: Uuid) -> Result<Vec<PlaylistSongRow>> {
    let rows = sqlx::query_as::<_, PlaylistSongRow>(&format!(
        r#"
        SELECT {}, ps.position, ps.added_at
        FROM playlist_songs ps
        JOIN songs s ON s.id = ps.song_id
        {}
        WHERE ps.playlist_id = $1 AND s.is_public = TRUE
        ORDER BY ps.position, ps.id
        "#,
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Locks the parent row so two appends to the same collection cannot pick
/// the same position.
async fn next_position(
    tx: &mut Transaction<'_, Postgres>,
    lock_sql: &str,
    max_sql: &str,
    parent_id: Uuid,
) -> Result<i32> {
    sqlx::query(lock_sql).bind(parent_id).execute(&mut **tx).await?;
    let max: Option<i32> = sqlx::query_scalar(max_sql)
        .bind(parent_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(max.unwrap_or(0) + 1)
}

/// Appends the song and returns its position. Fails with a unique
/// violation when the song is already in the playlist.
pub async fn add_playlist_song(pool: &PgPool, playlist_id: Uuid, song_id: Uuid) -> Result<i32> {
    let mut tx = pool.begin().await?;

    let position = next_position(
        &mut tx,
        "SELECT id FROM playlists WHERE id = $1 FOR UPDATE",
        "SELECT MAX(position) FROM playlist_songs WHERE playlist_id = $1",
        playlist_id,
    )
    .await?;

    sqlx::query("INSERT INTO playlist_songs (playlist_id, song_id, position) VALUES ($1, $2, $3)")
        .bind(playlist_id)
        .bind(song_id)
        .bind(position)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE playlists SET updated_at = NOW() WHERE id = $1")
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(position)
}

pub async fn remove_playlist_song(pool: &PgPool, playlist_id: Uuid, song_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM playlist_songs WHERE playlist_id = $1 AND song_id = $2")
        .bind(playlist_id)
        .bind(song_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Renumbers the listed songs 1..n in the given order. Ids not in the
/// playlist are ignored; songs left out keep their old position. Returns
/// how many entries moved.
pub async fn reorder_playlist(pool: &PgPool, playlist_id: Uuid, song_ids: &[Uuid]) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE playlist_songs ps
        SET position = o.ord::INT
        FROM UNNEST($2::UUID[]) WITH ORDINALITY AS o(song_id, ord)
        WHERE ps.playlist_id = $1 AND ps.song_id = o.song_id
        "#,
    )
    .bind(playlist_id)
    .bind(song_ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn create_album(pool: &PgPool, creator_id: Uuid, new: &NewAlbum) -> Result<AlbumRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO albums (id, title, description, creator_id, cover_url, release_date, is_public)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(creator_id)
    .bind(&new.cover_url)
    .bind(new.release_date)
    .bind(new.is_public)
    .execute(pool)
    .await?;

    get_album(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("album {} vanished after insert", id))
}

pub async fn get_album(pool: &PgPool, album_id: Uuid) -> Result<Option<AlbumRow>> {
    let album = sqlx::query_as::<_, AlbumRow>(&format!(
        "SELECT {} FROM albums al LEFT JOIN users u ON u.id = al.creator_id WHERE al.id = $1",
        ALBUM_COLUMNS
    ))
    .bind(album_id)
    .fetch_optional(pool)
    .await?;

    Ok(album)
}

pub async fn owned_album(pool: &PgPool, album_id: Uuid, owner_id: Uuid) -> Result<Option<AlbumRow>> {
    Ok(get_album(pool, album_id)
        .await?
        .filter(|a| a.creator_id == owner_id))
}

pub async fn albums_for_creator(pool: &PgPool, creator_id: Uuid) -> Result<Vec<AlbumRow>> {
    let albums = sqlx::query_as::<_, AlbumRow>(&format!(
        r#"
        SELECT {} FROM albums al LEFT JOIN users u ON u.id = al.creator_id
        WHERE al.creator_id = $1
        ORDER BY al.created_at DESC, al.id
        "#,
        ALBUM_COLUMNS
    ))
    .bind(creator_id)
    .fetch_all(pool)
    .await?;

    Ok(albums)
}

/// Public albums whose title or description contains `pattern`, most
/// listened first.
pub async fn search_public_albums(
    pool: &PgPool,
    pattern: &str,
    page: Page,
) -> Result<(Vec<AlbumRow>, i64)> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM albums
        WHERE is_public = TRUE AND (title ILIKE $1 OR description ILIKE $1)
        "#,
    )
    .bind(pattern)
    .fetch_one(pool)
    .await?;

    let albums = sqlx::query_as::<_, AlbumRow>(&format!(
        r#"
        SELECT {} FROM albums al LEFT JOIN users u ON u.id = al.creator_id
        WHERE al.is_public = TRUE AND (al.title ILIKE $1 OR al.description ILIKE $1)
        ORDER BY total_listens DESC, al.created_at DESC, al.id
        LIMIT $2 OFFSET $3
        "#,
        ALBUM_COLUMNS
    ))
    .bind(pattern)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok((albums, total))
}

pub async fn update_album(
    pool: &PgPool,
    album_id: Uuid,
    owner_id: Uuid,
    update: &AlbumUpdate,
) -> Result<Option<AlbumRow>> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE albums SET
            title = COALESCE($3, title),
            description = COALESCE($4, description),
            cover_url = COALESCE($5, cover_url),
            release_date = COALESCE($6, release_date),
            is_public = COALESCE($7, is_public),
            updated_at = NOW()
        WHERE id = $1 AND creator_id = $2
        RETURNING id
        "#,
    )
    .bind(album_id)
    .bind(owner_id)
    .bind(&update.title)
    .bind(&update.description)
    .bind(&update.cover_url)
    .bind(update.release_date)
    .bind(update.is_public)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(id) => get_album(pool, id).await,
        None => Ok(None),
    }
}

pub async fn delete_album(pool: &PgPool, album_id: Uuid, owner_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM albums WHERE id = $1 AND creator_id = $2")
        .bind(album_id)
        .bind(owner_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Fails with a unique violation when the song is already on the album.
pub async fn add_album_song(pool: &PgPool, album_id: Uuid, song_id: Uuid) -> Result<i32> {
    let mut tx = pool.begin().await?;

    let position = next_position(
        &mut tx,
        "SELECT id FROM albums WHERE id = $1 FOR UPDATE",
        "SELECT MAX(position) FROM album_songs WHERE album_id = $1",
        album_id,
    )
    .await?;

    sqlx::query("INSERT INTO album_songs (album_id, song_id, position) VALUES ($1, $2, $3)")
        .bind(album_id)
        .bind(song_id)
        .bind(position)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(position)
}

pub async fn remove_album_song(pool: &PgPool, album_id: Uuid, song_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM album_songs WHERE album_id = $1 AND song_id = $2")
        .bind(album_id)
        .bind(song_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn album_songs(pool: &PgPool, album_id: Uuid) -> Result<Vec<AlbumSongRow>> {
    let rows = sqlx::query_as::<_, AlbumSongRow>(&format!(
        r#"
        SELECT {}, x.position
        FROM album_songs x
        JOIN songs s ON s.id = x.song_id
        {}
        WHERE x.album_id = $1 AND s.is_public = TRUE
        ORDER BY x.position, x.id
        "#,
        SONG_COLUMNS, SONG_JOINS
    ))
    .bind(album_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use moodtunes_api::analytics::{self, DEFAULT_TOP_SONGS, DEFAULT_WINDOW_DAYS};
use moodtunes_api::db;

const MAX_PERIOD_DAYS: i64 = 365;

#[derive(Parser)]
#[command(name = "inspect")]
#[command(about = "moodtunes database inspector", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", default_value = "postgresql://localhost/moodtunes")]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Row counts for every table
    Stats,
    /// Play summary and daily series for one song
    Song {
        #[arg(value_name = "SONG_ID")]
        id: Uuid,
    },
    /// Most played public songs
    Trending {
        #[arg(short, long, default_value_t = 7)]
        period: i64,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Creator dashboard numbers
    Creator {
        #[arg(value_name = "CREATOR_ID")]
        id: Uuid,

        #[arg(short, long, default_value_t = 30)]
        period: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("inspect=debug,moodtunes_api=debug")
        .init();

    let cli = Cli::parse();
    let pool = db::init_db(&cli.database_url).await?;

    match cli.command {
        Commands::Stats => show_stats(&pool).await?,
        Commands::Song { id } => show_song(&pool, id).await?,
        Commands::Trending { period, limit } => {
            show_trending(&pool, check_period(period)?, limit).await?
        }
        Commands::Creator { id, period } => show_creator(&pool, id, check_period(period)?).await?,
    }

    Ok(())
}

/// Same window the HTTP API accepts; also keeps `Duration::days` in range.
fn check_period(period: i64) -> Result<i64> {
    if !(1..=MAX_PERIOD_DAYS).contains(&period) {
        bail!("--period must be between 1 and {} days, got {}", MAX_PERIOD_DAYS, period);
    }
    Ok(period)
}

async fn show_stats(pool: &PgPool) -> Result<()> {
    let counts = db::store_counts(pool).await?;

    println!("database stats:");
    println!("  users: {}", counts.users);
    println!("  songs: {}", counts.songs);
    println!("  play rollups: {}", counts.rollups);
    println!("  listen events: {}", counts.listen_events);
    println!("  favorites: {}", counts.favorites);
    println!("  playlists: {}", counts.playlists);
    println!("  albums: {}", counts.albums);
    println!("  friendships: {}", counts.friendships);

    Ok(())
}

async fn show_song(pool: &PgPool, song_id: Uuid) -> Result<()> {
    let Some(song) = db::get_song(pool, song_id).await? else {
        bail!("song {} not found", song_id);
    };

    let rollups = db::rollups_for_song(pool, song_id).await?;
    let summary = analytics::summarize_song(&rollups);

    println!("{} - {} ({})", song.title, song.artist, song.id);
    println!("  public: {}", song.is_public);
    println!("  total plays: {}", summary.total_plays);
    println!("  total duration: {}s", summary.total_duration);
    println!("  unique listeners: {}", summary.unique_listeners);
    println!("  avg duration per play: {:.1}s", summary.avg_duration);

    let today = Utc::now().date_naive();
    println!();
    println!("last {} days (by last play):", DEFAULT_WINDOW_DAYS);
    for day in analytics::daily_series(&rollups, DEFAULT_WINDOW_DAYS, today) {
        if day.plays > 0 {
            println!("  {}  {}", day.date, day.plays);
        }
    }

    Ok(())
}

async fn show_trending(pool: &PgPool, period: i64, limit: usize) -> Result<()> {
    let now = Utc::now();
    let rollups = db::public_rollups_since(pool, now - Duration::days(period)).await?;
    let ranked = analytics::trending(&rollups, period, limit, now);

    if ranked.is_empty() {
        println!("no plays in the last {} days", period);
        return Ok(());
    }

    let ids: Vec<Uuid> = ranked.iter().map(|e| e.song_id).collect();
    let songs = db::public_songs_by_ids(pool, &ids).await?;

    println!("trending over {} days:", period);
    for (rank, entry) in ranked.iter().enumerate() {
        let title = songs
            .iter()
            .find(|s| s.id == entry.song_id)
            .map(|s| format!("{} - {}", s.title, s.artist))
            .unwrap_or_else(|| entry.song_id.to_string());
        println!("  {:>2}. {} ({} plays)", rank + 1, title, entry.total_plays);
    }

    Ok(())
}

async fn show_creator(pool: &PgPool, creator_id: Uuid, period: i64) -> Result<()> {
    let stats = db::creator_stats(pool, creator_id).await?.unwrap_or_default();
    let songs = db::songs_for_creator(pool, creator_id).await?;
    let rollups = db::rollups_for_creator(pool, creator_id).await?;
    let songs = analytics::group_by_song(songs, rollups);

    println!("creator {}:", creator_id);
    println!("  songs: {}", stats.total_songs);
    println!("  listens: {}", stats.total_listens);
    println!("  favorites: {}", stats.total_favorites);
    println!("  monthly listeners: {}", stats.monthly_listeners);

    let overview = analytics::period_overview(&songs, period, Utc::now());
    println!();
    println!("songs released in the last {} days:", period);
    println!("  count: {}", overview.song_count);
    println!("  plays: {}", overview.total_plays);
    println!("  avg plays per song: {:.1}", overview.avg_plays_per_song);

    println!();
    println!("top songs:");
    for song in analytics::top_songs(&songs, DEFAULT_TOP_SONGS) {
        println!(
            "  {} - {} ({} plays, {}s)",
            song.title, song.artist, song.total_plays, song.total_duration
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_outside_a_year_is_refused() {
        assert_eq!(check_period(1).unwrap(), 1);
        assert_eq!(check_period(365).unwrap(), 365);
        assert!(check_period(0).is_err());
        assert!(check_period(-7).is_err());
        assert!(check_period(366).is_err());
        assert!(check_period(i64::MAX).is_err());
    }
}

//! Listening analytics computed from rollup rows already fetched from the
//! store. Nothing here does I/O or fails; callers pass `now`/`today` so the
//! results are reproducible.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::{ListenEvent, SongPlayRollup, SongRow};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_TOP_SONGS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSummary {
    pub total_plays: i64,
    pub total_duration: i64,
    pub unique_listeners: i64,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPlays {
    pub date: NaiveDate,
    pub plays: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodOverview {
    pub total_plays: i64,
    pub total_duration: i64,
    pub song_count: i64,
    pub avg_plays_per_song: f64,
}

/// A creator's song together with every rollup recorded against it.
#[derive(Debug, Clone)]
pub struct CreatorSong {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub created_at: DateTime<Utc>,
    pub rollups: Vec<SongPlayRollup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSong {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub total_plays: i64,
    pub total_duration: i64,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendingEntry {
    pub song_id: Uuid,
    pub total_plays: i64,
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// Attaches each song's rollups, keeping the song order.
pub fn group_by_song(songs: Vec<SongRow>, rollups: Vec<SongPlayRollup>) -> Vec<CreatorSong> {
    let mut per_song: HashMap<Uuid, Vec<SongPlayRollup>> = HashMap::new();
    for rollup in rollups {
        per_song.entry(rollup.song_id).or_default().push(rollup);
    }

    songs
        .into_iter()
        .map(|song| CreatorSong {
            rollups: per_song.remove(&song.id).unwrap_or_default(),
            id: song.id,
            title: song.title,
            artist: song.artist,
            created_at: song.created_at,
        })
        .collect()
}

/// Totals for one song over all of its rollups.
pub fn summarize_song(rollups: &[SongPlayRollup]) -> SongSummary {
    let total_plays: i64 = rollups.iter().map(|r| r.play_count).sum();
    let total_duration: i64 = rollups.iter().map(|r| r.total_listen_duration).sum();
    let unique_listeners = rollups
        .iter()
        .map(|r| r.listener_id)
        .collect::<HashSet<_>>()
        .len() as i64;

    SongSummary {
        total_plays,
        total_duration,
        unique_listeners,
        avg_duration: ratio(total_duration, total_plays),
    }
}

/// Dense day-by-day play counts for the `window_days` days ending at `today`
/// (inclusive). A rollup's whole `play_count` lands on its last-played day.
pub fn daily_series(rollups: &[SongPlayRollup], window_days: u32, today: NaiveDate) -> Vec<DayPlays> {
    dense_series(
        rollups
            .iter()
            .map(|r| (r.last_played_at.date_naive(), r.play_count)),
        window_days,
        today,
    )
}

/// Same shape as [`daily_series`] but built from the play log, one play per
/// event, so repeat listens on different days are counted where they happened.
pub fn daily_series_from_events(
    events: &[ListenEvent],
    window_days: u32,
    today: NaiveDate,
) -> Vec<DayPlays> {
    dense_series(
        events.iter().map(|e| (e.occurred_at.date_naive(), 1)),
        window_days,
        today,
    )
}

fn dense_series<I>(points: I, window_days: u32, today: NaiveDate) -> Vec<DayPlays>
where
    I: IntoIterator<Item = (NaiveDate, i64)>,
{
    let mut buckets: HashMap<NaiveDate, i64> = HashMap::new();
    for (date, plays) in points {
        *buckets.entry(date).or_insert(0) += plays;
    }

    (0..window_days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset as i64);
            DayPlays {
                date,
                plays: buckets.get(&date).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Aggregates the songs created within the last `period_days` days.
pub fn period_overview(songs: &[CreatorSong], period_days: i64, now: DateTime<Utc>) -> PeriodOverview {
    let since = now - Duration::days(period_days);

    let mut overview = PeriodOverview::default();
    for song in songs
        .iter()
        .filter(|s| s.created_at >= since && s.created_at <= now)
    {
        let summary = summarize_song(&song.rollups);
        overview.total_plays += summary.total_plays;
        overview.total_duration += summary.total_duration;
        overview.song_count += 1;
    }
    overview.avg_plays_per_song = ratio(overview.total_plays, overview.song_count);
    overview
}

/// The `k` most played songs. Equal play counts keep their input order,
/// which callers supply newest first.
pub fn top_songs(songs: &[CreatorSong], k: usize) -> Vec<TopSong> {
    let mut ranked: Vec<TopSong> = songs
        .iter()
        .map(|song| {
            let summary = summarize_song(&song.rollups);
            TopSong {
                id: song.id,
                title: song.title.clone(),
                artist: song.artist.clone(),
                total_plays: summary.total_plays,
                total_duration: summary.total_duration,
                avg_duration: summary.avg_duration,
            }
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.total_plays.cmp(&a.total_plays));
    ranked.truncate(k);
    ranked
}

/// Songs ranked by plays among rollups last played within `period_days`.
/// Ties go to the smaller song id.
pub fn trending(
    rollups: &[SongPlayRollup],
    period_days: i64,
    k: usize,
    now: DateTime<Utc>,
) -> Vec<TrendingEntry> {
    let since = now - Duration::days(period_days);

    let mut per_song: HashMap<Uuid, i64> = HashMap::new();
    for rollup in rollups.iter().filter(|r| r.last_played_at >= since) {
        *per_song.entry(rollup.song_id).or_insert(0) += rollup.play_count;
    }

    let mut entries: Vec<TrendingEntry> = per_song
        .into_iter()
        .map(|(song_id, total_plays)| TrendingEntry { song_id, total_plays })
        .collect();
    entries.sort_by(|a, b| {
        b.total_plays
            .cmp(&a.total_plays)
            .then_with(|| a.song_id.cmp(&b.song_id))
    });
    entries.truncate(k);
    entries
}

/// "For you" candidates: trending songs the listener has not favorited,
/// those matching `preferred` first, then the rest, each group keeping
/// trending order.
pub fn for_you<F>(
    ranked: &[TrendingEntry],
    preferred: F,
    excluded: &HashSet<Uuid>,
    k: usize,
) -> Vec<TrendingEntry>
where
    F: Fn(Uuid) -> bool,
{
    let (mut picks, rest): (Vec<TrendingEntry>, Vec<TrendingEntry>) = ranked
        .iter()
        .filter(|e| !excluded.contains(&e.song_id))
        .partition(|e| preferred(e.song_id));

    picks.extend(rest);
    picks.truncate(k);
    picks
}

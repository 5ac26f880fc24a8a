//! Playback-state synchronizer.
//!
//! Applies playback events to the persisted watch history and progress map
//! and answers the derived queries (continue watching, resume point, per
//! title state). Title state is never stored; it is derived from progress:
//!
//! ```text
//! NotStarted -> InProgress -> Completed
//!                         \-> Abandoned
//! ```

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use shared::config::PlaybackConfig;
use shared::{ContentKey, HistoryEntry, LocalStore, WatchProgressRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::source::{PlaybackEvent, PlaybackEventSource};

pub const WATCH_HISTORY_KEY: &str = "watch_history";
pub const WATCH_PROGRESS_KEY: &str = "watch_progress";

/// Persisted progress, keyed by [`ContentKey::storage_key`]
pub type ProgressMap = BTreeMap<String, WatchProgressRecord>;

/// Derived state of one title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    NotStarted,
    InProgress,
    Completed,
    Abandoned,
}

/// Where to pick a title back up
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResumePoint {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub seconds: f64,
}

pub struct PlaybackSynchronizer {
    store: Arc<LocalStore>,
    config: PlaybackConfig,
}

impl PlaybackSynchronizer {
    pub fn new(store: Arc<LocalStore>, config: PlaybackConfig) -> Self {
        Self { store, config }
    }

    /// Apply one event to persisted state
    pub fn handle(&self, event: &PlaybackEvent) -> Result<()> {
        match *event {
            PlaybackEvent::PlayStarted {
                key,
                season,
                episode,
                at,
            } => self.record_play(HistoryEntry {
                content_id: key.content_id,
                media_type: key.media_type,
                season,
                episode,
                watched_at: at,
            }),
            PlaybackEvent::Progress {
                key,
                season,
                episode,
                watched_seconds,
                duration_seconds,
                at,
            } => self.record_progress(key, season, episode, watched_seconds, duration_seconds, at),
        }
    }

    /// Drain a source until it ends; returns the number of events applied
    pub async fn run<S: PlaybackEventSource + ?Sized>(&self, source: &mut S) -> Result<usize> {
        let mut applied = 0;
        while let Some(event) = source.next_event().await {
            self.handle(&event)?;
            applied += 1;
        }
        info!(applied = applied, "Playback event source finished");
        Ok(applied)
    }

    fn record_play(&self, entry: HistoryEntry) -> Result<()> {
        let mut history: Vec<HistoryEntry> = self.store.load(WATCH_HISTORY_KEY)?;

        if history
            .iter()
            .take(self.config.dedupe_window)
            .any(|recent| recent.same_item(&entry))
        {
            debug!(content_id = entry.content_id, "Already in recent history, skipping");
            return Ok(());
        }

        debug!(
            content_id = entry.content_id,
            media_type = %entry.media_type,
            "Adding to watch history"
        );
        history.insert(0, entry);
        history.truncate(self.config.history_limit);
        self.store.save(WATCH_HISTORY_KEY, &history)
    }

    fn record_progress(
        &self,
        key: ContentKey,
        season: Option<u32>,
        episode: Option<u32>,
        watched_seconds: f64,
        duration_seconds: f64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut progress: ProgressMap = self.store.load(WATCH_PROGRESS_KEY)?;
        let storage_key = key.storage_key();
        let previous = progress.get(&storage_key);
        // Players report 0 until metadata loads; keep the last known length
        let duration_seconds = match previous {
            Some(p) if duration_seconds <= 0.0 => p.duration_seconds,
            _ => duration_seconds,
        };

        let record = WatchProgressRecord {
            content_id: key.content_id,
            media_type: key.media_type,
            season: season.or_else(|| previous.and_then(|p| p.season)),
            episode: episode.or_else(|| previous.and_then(|p| p.episode)),
            watched_seconds,
            duration_seconds,
            last_updated: at,
        };
        debug!(
            key = %storage_key,
            watched = watched_seconds,
            duration = duration_seconds,
            "Updating watch progress"
        );
        progress.insert(storage_key, record);
        self.store.save(WATCH_PROGRESS_KEY, &progress)
    }

    pub fn progress(&self) -> Result<Vec<WatchProgressRecord>> {
        let progress: ProgressMap = self.store.load(WATCH_PROGRESS_KEY)?;
        Ok(progress.into_values().collect())
    }

    pub fn progress_for(&self, key: ContentKey) -> Result<Option<WatchProgressRecord>> {
        let mut progress: ProgressMap = self.store.load(WATCH_PROGRESS_KEY)?;
        Ok(progress.remove(&key.storage_key()))
    }

    /// Partially watched titles, most recently updated first
    pub fn continue_watching(&self) -> Result<Vec<WatchProgressRecord>> {
        let mut records: Vec<WatchProgressRecord> = self
            .progress()?
            .into_iter()
            .filter(|record| {
                let fraction = record.watched_fraction();
                fraction > self.config.min_fraction && fraction < self.config.max_fraction
            })
            .collect();
        records.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        records.truncate(self.config.continue_watching_limit);
        Ok(records)
    }

    pub fn state_of(&self, key: ContentKey, now: DateTime<Utc>) -> Result<PlaybackState> {
        let Some(record) = self.progress_for(key)? else {
            return Ok(PlaybackState::NotStarted);
        };

        let fraction = record.watched_fraction();
        let idle = now - record.last_updated;
        let state = if fraction >= self.config.max_fraction {
            PlaybackState::Completed
        } else if fraction <= self.config.min_fraction
            && idle >= Duration::days(self.config.abandon_after_days)
        {
            PlaybackState::Abandoned
        } else {
            PlaybackState::InProgress
        };
        Ok(state)
    }

    /// Last known position of a title, if any
    pub fn resume_point(&self, key: ContentKey) -> Result<Option<ResumePoint>> {
        Ok(self.progress_for(key)?.map(|record| ResumePoint {
            season: record.season,
            episode: record.episode,
            seconds: record.watched_seconds,
        }))
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.store.load(WATCH_HISTORY_KEY)
    }

    /// Forget history and progress
    pub fn clear_history(&self) -> Result<()> {
        self.store.save(WATCH_HISTORY_KEY, &Vec::<HistoryEntry>::new())?;
        self.store.save(WATCH_PROGRESS_KEY, &ProgressMap::new())?;
        info!("Watch history cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::WatchMediaType;

    fn synchronizer() -> PlaybackSynchronizer {
        PlaybackSynchronizer::new(
            Arc::new(LocalStore::in_memory().unwrap()),
            PlaybackConfig::default(),
        )
    }

    fn movie(id: u64) -> ContentKey {
        ContentKey::new(id, WatchMediaType::Movie)
    }

    fn progress(key: ContentKey, watched: f64, duration: f64, at: DateTime<Utc>) -> PlaybackEvent {
        PlaybackEvent::Progress {
            key,
            season: None,
            episode: None,
            watched_seconds: watched,
            duration_seconds: duration,
            at,
        }
    }

    fn play(key: ContentKey, season: Option<u32>, episode: Option<u32>) -> PlaybackEvent {
        PlaybackEvent::PlayStarted {
            key,
            season,
            episode,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_continue_watching_boundaries() {
        let sync = synchronizer();
        let now = Utc::now();
        sync.handle(&progress(movie(4), 4.0, 100.0, now)).unwrap();
        sync.handle(&progress(movie(6), 6.0, 100.0, now)).unwrap();
        sync.handle(&progress(movie(89), 89.0, 100.0, now)).unwrap();
        sync.handle(&progress(movie(91), 91.0, 100.0, now)).unwrap();

        let mut ids: Vec<u64> = sync
            .continue_watching()
            .unwrap()
            .iter()
            .map(|r| r.content_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![6, 89]);
    }

    #[test]
    fn test_exact_thresholds_are_excluded() {
        let sync = synchronizer();
        let now = Utc::now();
        sync.handle(&progress(movie(1), 5.0, 100.0, now)).unwrap();
        sync.handle(&progress(movie(2), 90.0, 100.0, now)).unwrap();
        assert!(sync.continue_watching().unwrap().is_empty());
    }

    #[test]
    fn test_progress_overwrites_and_is_visible() {
        let sync = synchronizer();
        let start = Utc::now();
        let key = movie(550);

        for (i, watched) in [300.0, 1200.0, 2400.0].into_iter().enumerate() {
            sync.handle(&progress(key, watched, 8000.0, start + Duration::seconds(i as i64)))
                .unwrap();
            let listed = sync.continue_watching().unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].watched_seconds, watched);
        }
        assert_eq!(sync.progress().unwrap().len(), 1);
    }

    #[test]
    fn test_newest_first_and_capped() {
        let sync = synchronizer();
        let start = Utc::now();
        for id in 1..=12 {
            sync.handle(&progress(movie(id), 50.0, 100.0, start + Duration::minutes(id as i64)))
                .unwrap();
        }
        let listed = sync.continue_watching().unwrap();
        assert_eq!(listed.len(), 10);
        assert_eq!(listed[0].content_id, 12);
        assert_eq!(listed[9].content_id, 3);
    }

    #[test]
    fn test_movie_and_tv_ids_do_not_collide() {
        let sync = synchronizer();
        let now = Utc::now();
        sync.handle(&progress(movie(100), 30.0, 100.0, now)).unwrap();
        sync.handle(&progress(ContentKey::new(100, WatchMediaType::Tv), 60.0, 100.0, now))
            .unwrap();
        assert_eq!(sync.progress().unwrap().len(), 2);
    }

    #[test]
    fn test_states() {
        let sync = synchronizer();
        let now = Utc::now();
        let stale = now - Duration::days(15);

        assert_eq!(sync.state_of(movie(1), now).unwrap(), PlaybackState::NotStarted);

        sync.handle(&progress(movie(1), 50.0, 100.0, now)).unwrap();
        assert_eq!(sync.state_of(movie(1), now).unwrap(), PlaybackState::InProgress);

        sync.handle(&progress(movie(2), 95.0, 100.0, now)).unwrap();
        assert_eq!(sync.state_of(movie(2), now).unwrap(), PlaybackState::Completed);

        sync.handle(&progress(movie(3), 2.0, 100.0, stale)).unwrap();
        assert_eq!(sync.state_of(movie(3), now).unwrap(), PlaybackState::Abandoned);

        // Barely started but recent is still in progress
        sync.handle(&progress(movie(4), 2.0, 100.0, now)).unwrap();
        assert_eq!(sync.state_of(movie(4), now).unwrap(), PlaybackState::InProgress);
    }

    #[test]
    fn test_play_dedupes_within_window() {
        let sync = synchronizer();
        let show = ContentKey::new(1396, WatchMediaType::Tv);

        sync.handle(&play(show, Some(1), Some(1))).unwrap();
        sync.handle(&play(show, Some(1), Some(1))).unwrap();
        sync.handle(&play(show, Some(1), Some(2))).unwrap();
        assert_eq!(sync.history().unwrap().len(), 2);

        // Push the first episode out of the last five entries
        for id in 1..=5 {
            sync.handle(&play(movie(id), None, None)).unwrap();
        }
        sync.handle(&play(show, Some(1), Some(1))).unwrap();

        let history = sync.history().unwrap();
        assert_eq!(history.len(), 8);
        assert_eq!(history[0].content_id, 1396);
        assert_eq!(history[0].episode, Some(1));
    }

    #[test]
    fn test_history_is_bounded() {
        let sync = synchronizer();
        for id in 1..=60 {
            sync.handle(&play(movie(id), None, None)).unwrap();
        }
        let history = sync.history().unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].content_id, 60);
        assert_eq!(history[49].content_id, 11);
    }

    #[test]
    fn test_resume_point_keeps_episode() {
        let sync = synchronizer();
        let show = ContentKey::new(1396, WatchMediaType::Tv);
        let now = Utc::now();
        sync.handle(&PlaybackEvent::Progress {
            key: show,
            season: Some(2),
            episode: Some(4),
            watched_seconds: 600.0,
            duration_seconds: 2800.0,
            at: now,
        })
        .unwrap();
        // A later update without episode info keeps the last known one
        sync.handle(&progress(show, 900.0, 2800.0, now)).unwrap();

        let point = sync.resume_point(show).unwrap().unwrap();
        assert_eq!(point.season, Some(2));
        assert_eq!(point.episode, Some(4));
        assert_eq!(point.seconds, 900.0);
        assert_eq!(sync.resume_point(movie(1)).unwrap(), None);
    }

    #[test]
    fn test_unknown_duration_keeps_previous() {
        let sync = synchronizer();
        let key = movie(550);
        let now = Utc::now();
        sync.handle(&progress(key, 2400.0, 8000.0, now)).unwrap();
        sync.handle(&progress(key, 2460.0, 0.0, now + Duration::seconds(1)))
            .unwrap();

        let listed = sync.continue_watching().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].watched_seconds, 2460.0);
        assert_eq!(listed[0].duration_seconds, 8000.0);
    }

    #[test]
    fn test_clear_history_clears_progress() {
        let sync = synchronizer();
        sync.handle(&play(movie(1), None, None)).unwrap();
        sync.handle(&progress(movie(1), 50.0, 100.0, Utc::now())).unwrap();

        sync.clear_history().unwrap();
        assert!(sync.history().unwrap().is_empty());
        assert!(sync.continue_watching().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_applies_adapter_events() {
        use crate::message::{InboundMessage, OriginPolicy};
        use crate::source::VidsrcAdapter;
        use serde_json::json;
        use shared::config::PlayerConfig;
        use tokio::sync::mpsc;

        let (tx, rx) = mpsc::channel(8);
        let mut adapter = VidsrcAdapter::new(rx, OriginPolicy::from_config(&PlayerConfig::default()));
        let event = |name: &str, time: f64| InboundMessage {
            origin: "https://vidsrc.xyz".to_string(),
            data: json!({"type": "PLAYER_EVENT", "data": {
                "event": name, "currentTime": time, "duration": 1000,
                "tmdbId": 1396, "mediaType": "tv", "season": 1, "episode": 3
            }}),
        };

        tx.send(event("play", 0.0)).await.unwrap();
        tx.send(event("timeupdate", 120.0)).await.unwrap();
        tx.send(event("bogus", 1.0)).await.unwrap();
        tx.send(event("pause", 300.0)).await.unwrap();
        drop(tx);

        let sync = synchronizer();
        assert_eq!(sync.run(&mut adapter).await.unwrap(), 3);

        let show = ContentKey::new(1396, WatchMediaType::Tv);
        assert_eq!(sync.history().unwrap().len(), 1);
        assert_eq!(
            sync.resume_point(show).unwrap(),
            Some(ResumePoint {
                season: Some(1),
                episode: Some(3),
                seconds: 300.0
            })
        );
        assert_eq!(sync.continue_watching().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_progress_resets() {
        let store = Arc::new(LocalStore::in_memory().unwrap());
        store.set_raw(WATCH_PROGRESS_KEY, "{not json").unwrap();
        let sync = PlaybackSynchronizer::new(store.clone(), PlaybackConfig::default());

        assert!(sync.continue_watching().unwrap().is_empty());
        sync.handle(&progress(movie(7), 50.0, 100.0, Utc::now())).unwrap();
        assert_eq!(sync.continue_watching().unwrap().len(), 1);
    }
}

//! Playback event sources.
//!
//! The synchronizer consumes player-agnostic [`PlaybackEvent`]s. Each
//! supported player gets an adapter that turns its own message protocol
//! into those events; malformed or untrusted messages never get past the
//! adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::ContentKey;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::debug;

use crate::message::{InboundMessage, OriginPolicy, PlayerEventKind, PlayerMessage, ProgressReport};

/// Input to the synchronizer state machine
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Playback of a title (or an episode of it) began
    PlayStarted {
        key: ContentKey,
        season: Option<u32>,
        episode: Option<u32>,
        at: DateTime<Utc>,
    },
    /// Current position; replaces any stored progress for the title
    Progress {
        key: ContentKey,
        season: Option<u32>,
        episode: Option<u32>,
        watched_seconds: f64,
        duration_seconds: f64,
        at: DateTime<Utc>,
    },
}

impl PlaybackEvent {
    pub fn key(&self) -> ContentKey {
        match self {
            PlaybackEvent::PlayStarted { key, .. } | PlaybackEvent::Progress { key, .. } => *key,
        }
    }

    fn progress(report: ProgressReport, received_at: DateTime<Utc>) -> Self {
        PlaybackEvent::Progress {
            key: report.key,
            season: report.season,
            episode: report.episode,
            watched_seconds: report.watched_seconds,
            duration_seconds: report.duration_seconds,
            at: report.last_updated.unwrap_or(received_at),
        }
    }
}

/// Stream of playback events from one player
#[async_trait]
pub trait PlaybackEventSource: Send {
    /// Next event, or `None` once the player is gone
    async fn next_event(&mut self) -> Option<PlaybackEvent>;
}

/// Adapter for the vidsrc embed's `postMessage` protocol
pub struct VidsrcAdapter {
    messages: mpsc::Receiver<InboundMessage>,
    origins: OriginPolicy,
    pending: VecDeque<PlaybackEvent>,
    dropped: usize,
}

impl VidsrcAdapter {
    pub fn new(messages: mpsc::Receiver<InboundMessage>, origins: OriginPolicy) -> Self {
        Self {
            messages,
            origins,
            pending: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Messages dropped as malformed or untrusted so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Translate one message; an invalid one yields nothing
    pub fn translate(&mut self, message: &InboundMessage) -> Vec<PlaybackEvent> {
        let now = Utc::now();
        match PlayerMessage::from_inbound(message, &self.origins) {
            Ok(PlayerMessage::MediaData(reports)) => reports
                .into_iter()
                .map(|report| PlaybackEvent::progress(report, now))
                .collect(),
            Ok(PlayerMessage::PlayerEvent {
                kind: PlayerEventKind::Play,
                report,
            }) => vec![PlaybackEvent::PlayStarted {
                key: report.key,
                season: report.season,
                episode: report.episode,
                at: now,
            }],
            Ok(PlayerMessage::PlayerEvent { report, .. }) => {
                vec![PlaybackEvent::progress(report, now)]
            }
            Err(e) => {
                self.dropped += 1;
                debug!(origin = %message.origin, error = %e, "Dropping player message");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl PlaybackEventSource for VidsrcAdapter {
    async fn next_event(&mut self) -> Option<PlaybackEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let message = self.messages.recv().await?;
            let events = self.translate(&message);
            self.pending.extend(events);
        }
    }
}

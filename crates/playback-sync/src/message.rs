//! Player message protocol.
//!
//! The embedded player posts `{ origin, data }` envelopes. `data.type` is
//! either `MEDIA_DATA` (stored progress for one or many titles) or
//! `PLAYER_EVENT` (a single playback event). Field types are loose in
//! practice: ids and numbers arrive as JSON numbers or numeric strings, so
//! every field is validated by hand before it reaches the synchronizer.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::config::PlayerConfig;
use shared::{ContentKey, WatchMediaType};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};
use url::{Origin, Url};

/// Why a message was dropped
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MessageError {
    #[error("message from untrusted origin {0}")]
    UntrustedOrigin(String),

    #[error("unknown message type {0:?}")]
    UnknownType(String),

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl MessageError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Envelope as received from the player window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub origin: String,
    pub data: Value,
}

/// Origins allowed to post player messages
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<Origin>,
}

impl OriginPolicy {
    /// Unparseable entries are skipped with a warning
    pub fn new<S: AsRef<str>>(origins: &[S]) -> Self {
        let allowed = origins
            .iter()
            .filter_map(|raw| match Url::parse(raw.as_ref()) {
                Ok(url) if url.origin().is_tuple() => Some(url.origin()),
                _ => {
                    warn!(origin = raw.as_ref(), "Ignoring invalid allowed origin");
                    None
                }
            })
            .collect();
        Self { allowed }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(&config.allowed_origins)
    }

    /// Scheme, host, and port must match an allowed origin exactly
    pub fn check(&self, origin: &str) -> Result<(), MessageError> {
        let parsed = Url::parse(origin)
            .map(|url| url.origin())
            .map_err(|_| MessageError::UntrustedOrigin(origin.to_string()))?;
        if parsed.is_tuple() && self.allowed.contains(&parsed) {
            Ok(())
        } else {
            Err(MessageError::UntrustedOrigin(origin.to_string()))
        }
    }
}

/// Progress for one title as reported by the player
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub key: ContentKey,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub watched_seconds: f64,
    pub duration_seconds: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// `PLAYER_EVENT` event names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEventKind {
    Play,
    TimeUpdate,
    Pause,
    Seeked,
    Ended,
}

impl PlayerEventKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "play" => Some(Self::Play),
            "timeupdate" => Some(Self::TimeUpdate),
            "pause" => Some(Self::Pause),
            "seeked" => Some(Self::Seeked),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// Validated player message
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerMessage {
    MediaData(Vec<ProgressReport>),
    PlayerEvent {
        kind: PlayerEventKind,
        report: ProgressReport,
    },
}

impl PlayerMessage {
    /// Validate the origin, then the payload
    pub fn from_inbound(message: &InboundMessage, origins: &OriginPolicy) -> Result<Self, MessageError> {
        origins.check(&message.origin)?;
        Self::parse(&message.data)
    }

    pub fn parse(data: &Value) -> Result<Self, MessageError> {
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingField("type"))?;

        match kind {
            "MEDIA_DATA" => {
                let payload = data.get("data").ok_or(MessageError::MissingField("data"))?;
                parse_media_data(payload).map(PlayerMessage::MediaData)
            }
            "PLAYER_EVENT" => {
                let payload = data
                    .get("data")
                    .and_then(Value::as_object)
                    .ok_or(MessageError::MissingField("data"))?;
                parse_player_event(payload)
            }
            other => Err(MessageError::UnknownType(other.to_string())),
        }
    }
}

fn parse_media_data(payload: &Value) -> Result<Vec<ProgressReport>, MessageError> {
    let object = payload
        .as_object()
        .ok_or_else(|| MessageError::invalid("data", "expected an object"))?;

    // A single entry carries its own id; otherwise the object maps keys to entries
    if object.contains_key("id") {
        return parse_media_entry(object).map(|report| vec![report]);
    }

    let mut reports = Vec::with_capacity(object.len());
    for (key, entry) in object {
        let parsed = entry
            .as_object()
            .ok_or_else(|| MessageError::invalid("data", "expected an object entry"))
            .and_then(parse_media_entry);
        match parsed {
            Ok(report) => reports.push(report),
            Err(e) => debug!(entry = %key, error = %e, "Skipping malformed media entry"),
        }
    }
    Ok(reports)
}

fn parse_media_entry(entry: &Map<String, Value>) -> Result<ProgressReport, MessageError> {
    let id = require_id(entry, "id")?;
    let media = require_media(entry, "type")?;
    let progress = entry
        .get("progress")
        .and_then(Value::as_object)
        .ok_or(MessageError::MissingField("progress"))?;

    Ok(ProgressReport {
        key: ContentKey::new(id, media),
        season: optional_u32(entry, "last_season_watched"),
        episode: optional_u32(entry, "last_episode_watched"),
        watched_seconds: require_seconds(progress, "watched")?,
        duration_seconds: require_seconds(progress, "duration")?,
        last_updated: entry.get("last_updated").and_then(parse_timestamp),
    })
}

fn parse_player_event(payload: &Map<String, Value>) -> Result<PlayerMessage, MessageError> {
    let name = payload
        .get("event")
        .and_then(Value::as_str)
        .ok_or(MessageError::MissingField("event"))?;
    let kind = PlayerEventKind::parse(name)
        .ok_or_else(|| MessageError::invalid("event", format!("unsupported event {:?}", name)))?;

    let id = require_id(payload, "tmdbId")?;
    let media = require_media(payload, "mediaType")?;

    // A play event may arrive before the player knows the position
    let (watched, duration) = if kind == PlayerEventKind::Play {
        (
            optional_seconds(payload, "currentTime")?.unwrap_or(0.0),
            optional_seconds(payload, "duration")?.unwrap_or(0.0),
        )
    } else {
        let duration = require_seconds(payload, "duration")?;
        let watched = if kind == PlayerEventKind::Ended {
            duration
        } else {
            require_seconds(payload, "currentTime")?
        };
        (watched, duration)
    };

    Ok(PlayerMessage::PlayerEvent {
        kind,
        report: ProgressReport {
            key: ContentKey::new(id, media),
            season: optional_u32(payload, "season"),
            episode: optional_u32(payload, "episode"),
            watched_seconds: watched,
            duration_seconds: duration,
            last_updated: None,
        },
    })
}

fn require_id(map: &Map<String, Value>, field: &'static str) -> Result<u64, MessageError> {
    let value = map.get(field).ok_or(MessageError::MissingField(field))?;
    match loose::<u64>(value) {
        Some(id) if id > 0 => Ok(id),
        _ => Err(MessageError::invalid(field, format!("not a positive id: {}", value))),
    }
}

fn require_media(map: &Map<String, Value>, field: &'static str) -> Result<WatchMediaType, MessageError> {
    let raw = map
        .get(field)
        .and_then(Value::as_str)
        .ok_or(MessageError::MissingField(field))?;
    raw.trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|e: anyhow::Error| MessageError::invalid(field, e.to_string()))
}

fn optional_seconds(map: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, MessageError> {
    let Some(value) = map.get(field).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    match loose::<f64>(value) {
        Some(s) if s.is_finite() && s >= 0.0 => Ok(Some(s)),
        _ => Err(MessageError::invalid(field, format!("not a duration: {}", value))),
    }
}

fn require_seconds(map: &Map<String, Value>, field: &'static str) -> Result<f64, MessageError> {
    optional_seconds(map, field)?.ok_or(MessageError::MissingField(field))
}

/// Season and episode numbers are advisory; bad values read as absent
fn optional_u32(map: &Map<String, Value>, field: &str) -> Option<u32> {
    map.get(field).and_then(loose)
}

/// A JSON number or a numeric string
fn loose<T: FromStr>(value: &Value) -> Option<T> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Epoch milliseconds or an RFC 3339 string
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

//! Data models shared by the acquisition layer and the playback synchronizer.
//!
//! Every façade returns [`ContentRecord`] regardless of which upstream served
//! the data, and every field carries a documented default so callers never
//! deal with holes in the contract.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Title used when the upstream omits one
pub const DEFAULT_TITLE: &str = "Untitled";

/// Overview used when the upstream omits one
pub const DEFAULT_OVERVIEW: &str = "No overview available.";

const PLACEHOLDER_BASE: &str = "https://via.placeholder.com";

/// Deterministic poster placeholder for a title
pub fn placeholder_poster(title: &str) -> String {
    format!("{}/500x750?text={}", PLACEHOLDER_BASE, urlencoding::encode(title))
}

/// Deterministic backdrop placeholder for a title
pub fn placeholder_backdrop(title: &str) -> String {
    format!("{}/1280x720?text={}", PLACEHOLDER_BASE, urlencoding::encode(title))
}

/// Kind of content a record describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Anime,
    Manga,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Tv => write!(f, "tv"),
            MediaType::Anime => write!(f, "anime"),
            MediaType::Manga => write!(f, "manga"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            "anime" => Ok(MediaType::Anime),
            "manga" => Ok(MediaType::Manga),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

/// Media types the embedded video player reports progress for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WatchMediaType {
    Movie,
    Tv,
}

impl std::fmt::Display for WatchMediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchMediaType::Movie => write!(f, "movie"),
            WatchMediaType::Tv => write!(f, "tv"),
        }
    }
}

impl std::str::FromStr for WatchMediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(WatchMediaType::Movie),
            "tv" | "show" | "series" => Ok(WatchMediaType::Tv),
            _ => Err(anyhow::anyhow!("Invalid watch media type: {}", s)),
        }
    }
}

impl From<WatchMediaType> for MediaType {
    fn from(value: WatchMediaType) -> Self {
        match value {
            WatchMediaType::Movie => MediaType::Movie,
            WatchMediaType::Tv => MediaType::Tv,
        }
    }
}

/// Genre reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// Fields that only exist for one kind of content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentDetails {
    Movie {
        runtime_minutes: Option<u32>,
    },
    Tv {
        seasons: Option<u32>,
        episodes: Option<u32>,
    },
    Anime {
        episodes: Option<u32>,
        status: Option<String>,
        rank: Option<u32>,
        studios: Vec<String>,
    },
    Manga {
        chapters: Option<u32>,
        volumes: Option<u32>,
        status: Option<String>,
        authors: Vec<String>,
    },
}

impl ContentDetails {
    /// Empty details for a media type
    pub fn empty(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Movie => ContentDetails::Movie {
                runtime_minutes: None,
            },
            MediaType::Tv => ContentDetails::Tv {
                seasons: None,
                episodes: None,
            },
            MediaType::Anime => ContentDetails::Anime {
                episodes: None,
                status: None,
                rank: None,
                studios: Vec::new(),
            },
            MediaType::Manga => ContentDetails::Manga {
                chapters: None,
                volumes: None,
                status: None,
                authors: Vec::new(),
            },
        }
    }
}

/// Normalized content record returned by every façade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRecord {
    pub id: u64,
    pub title: String,
    pub poster_url: String,
    pub backdrop_url: String,
    pub overview: String,
    pub release_date: Option<NaiveDate>,
    pub rating_average: f64,
    pub rating_count: u64,
    pub genres: Vec<Genre>,
    pub media_type: MediaType,
    /// Set when the record came from a fallback dataset
    pub is_mock_data: bool,
    pub details: ContentDetails,
}

impl ContentRecord {
    /// Start a record with every optional field at its documented default
    pub fn new(id: u64, title: Option<&str>, media_type: MediaType) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string();

        Self {
            id,
            poster_url: placeholder_poster(&title),
            backdrop_url: placeholder_backdrop(&title),
            title,
            overview: DEFAULT_OVERVIEW.to_string(),
            release_date: None,
            rating_average: 0.0,
            rating_count: 0,
            genres: Vec::new(),
            media_type,
            is_mock_data: false,
            details: ContentDetails::empty(media_type),
        }
    }

    /// Replace the poster when the upstream provided a usable one
    pub fn with_poster(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.poster_url = url;
        }
        self
    }

    /// Replace the backdrop when the upstream provided a usable one
    pub fn with_backdrop(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.backdrop_url = url;
        }
        self
    }

    pub fn with_overview(mut self, overview: Option<String>) -> Self {
        if let Some(text) = overview.filter(|o| !o.trim().is_empty()) {
            self.overview = text;
        }
        self
    }

    /// Ratings: non-finite or negative scores collapse to 0
    pub fn with_rating(mut self, average: Option<f64>, count: Option<u64>) -> Self {
        self.rating_average = average.filter(|a| a.is_finite() && *a >= 0.0).unwrap_or(0.0);
        self.rating_count = count.unwrap_or(0);
        self
    }

    /// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; anything else is `None`
    pub fn with_release_date(mut self, raw: Option<&str>) -> Self {
        self.release_date = raw.and_then(parse_release_date);
        self
    }

    pub fn with_genres(mut self, genres: Vec<Genre>) -> Self {
        self.genres = genres;
        self
    }

    pub fn with_details(mut self, details: ContentDetails) -> Self {
        self.details = details;
        self
    }

    pub fn mock(mut self) -> Self {
        self.is_mock_data = true;
        self
    }
}

fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.date_naive())
    })
}

/// One episode of a TV season
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeSummary {
    pub season: u32,
    pub episode: u32,
    pub name: String,
    pub overview: String,
    pub air_date: Option<NaiveDate>,
    pub still_url: Option<String>,
    pub rating_average: f64,
}

/// Identity of a watchable title inside persisted playback state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub content_id: u64,
    pub media_type: WatchMediaType,
}

impl ContentKey {
    pub fn new(content_id: u64, media_type: WatchMediaType) -> Self {
        Self {
            content_id,
            media_type,
        }
    }

    /// Key inside the persisted progress map
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.media_type, self.content_id)
    }
}

/// Persisted watch progress for one title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchProgressRecord {
    pub content_id: u64,
    pub media_type: WatchMediaType,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub watched_seconds: f64,
    pub duration_seconds: f64,
    pub last_updated: DateTime<Utc>,
}

impl WatchProgressRecord {
    pub fn key(&self) -> ContentKey {
        ContentKey::new(self.content_id, self.media_type)
    }

    /// Fraction watched in `[0, 1]`; zero when the duration is unknown
    pub fn watched_fraction(&self) -> f64 {
        if self.duration_seconds <= 0.0 || !self.duration_seconds.is_finite() {
            return 0.0;
        }
        (self.watched_seconds / self.duration_seconds).clamp(0.0, 1.0)
    }
}

/// Entry of the bounded watch history, newest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub content_id: u64,
    pub media_type: WatchMediaType,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub watched_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Same title and, for series, the same episode
    pub fn same_item(&self, other: &HistoryEntry) -> bool {
        self.content_id == other.content_id
            && self.media_type == other.media_type
            && self.season == other.season
            && self.episode == other.episode
    }
}

/// User-saved item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultRecord {
    pub content_id: u64,
    pub media_type: MediaType,
    #[serde(default)]
    pub title: Option<String>,
    pub added_at: DateTime<Utc>,
}

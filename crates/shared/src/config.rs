//! Configuration management.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `tmdb.api_key`
pub const TMDB_API_KEY_ENV: &str = "TMDB_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Jikan (MyAnimeList) upstream settings
    pub jikan: JikanConfig,

    /// TMDB upstream settings
    pub tmdb: TmdbConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry, backoff, and negative-cache settings
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Device signal overrides
    #[serde(default)]
    pub device: DeviceConfig,

    /// Embedded player settings
    #[serde(default)]
    pub player: PlayerConfig,

    /// Watch progress settings
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (relative to data directory or absolute)
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Jikan upstream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JikanConfig {
    /// Jikan API base URL
    pub base_url: String,

    /// Minimum spacing between request starts, in milliseconds
    pub min_interval_ms: u64,

    /// Optional cap on requests started in any rolling minute
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

/// TMDB upstream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    /// TMDB API base URL
    pub base_url: String,

    /// API key appended to every request
    #[serde(default)]
    pub api_key: String,

    /// Base URL for poster and backdrop paths
    pub image_base_url: String,

    /// Fetch race budget in milliseconds; the device profile decides when unset
    #[serde(default)]
    pub race_timeout_ms: Option<u64>,
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for detail (metadata) endpoints
    pub metadata_ttl_seconds: u64,

    /// TTL for list endpoints on desktop
    pub list_ttl_seconds: u64,

    /// TTL for list endpoints on mobile
    pub mobile_list_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata_ttl_seconds: 600,
            list_ttl_seconds: 600,
            mobile_list_ttl_seconds: 300,
        }
    }
}

/// Retry and negative-cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Window in which recorded errors count against an upstream
    pub error_window_seconds: u64,

    /// Number of recent errors kept per upstream
    pub error_history: usize,

    /// Rate-limit errors within the window that suppress live calls
    pub rate_limit_threshold: usize,

    /// First retry delay in milliseconds (doubles per attempt)
    pub backoff_base_ms: u64,

    /// Upper bound for a single retry delay in milliseconds
    pub backoff_cap_ms: u64,

    /// Retries on mobile or slow connections
    pub mobile_retries: u32,

    /// Retries on desktop
    pub desktop_retries: u32,

    /// Per-attempt timeout on desktop, in milliseconds
    pub desktop_timeout_ms: u64,

    /// Per-attempt timeout on mobile, in milliseconds
    pub mobile_timeout_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            error_window_seconds: 60,
            error_history: 5,
            rate_limit_threshold: 3,
            backoff_base_ms: 1000,
            backoff_cap_ms: 5000,
            mobile_retries: 3,
            desktop_retries: 1,
            desktop_timeout_ms: 10_000,
            mobile_timeout_ms: 15_000,
        }
    }
}

/// Device signal overrides; unset values are detected or left unknown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// User agent to classify
    pub user_agent: Option<String>,

    /// Logical cores; detected from the host when unset
    pub hardware_concurrency: Option<u32>,

    /// Device memory in gigabytes
    pub device_memory_gb: Option<f64>,

    /// Effective connection type (slow-2g, 2g, 3g, 4g, wifi, ethernet)
    pub connection_type: Option<String>,

    /// Start in offline mode
    #[serde(default)]
    pub offline: bool,
}

/// Embedded player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Origins whose messages are accepted
    pub allowed_origins: Vec<String>,

    /// Embed base for movies and TV
    pub video_embed_base: String,

    /// Embed base for anime and manga
    pub anime_embed_base: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "https://vidsrc.xyz".to_string(),
                "https://vidsrc.icu".to_string(),
            ],
            video_embed_base: "https://vidsrc.xyz/embed".to_string(),
            anime_embed_base: "https://vidsrc.icu/embed".to_string(),
        }
    }
}

/// Watch progress configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Maximum watch history entries kept
    pub history_limit: usize,

    /// Recent history entries checked for duplicates on play
    pub dedupe_window: usize,

    /// Maximum continue-watching items
    pub continue_watching_limit: usize,

    /// Fraction at or below which a title counts as barely started
    pub min_fraction: f64,

    /// Fraction at or above which a title counts as finished
    pub max_fraction: f64,

    /// Days after which a barely started title is considered abandoned
    pub abandon_after_days: i64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            dedupe_window: 5,
            continue_watching_limit: 10,
            min_fraction: 0.05,
            max_fraction: 0.90,
            abandon_after_days: 14,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            database: DatabaseConfig {
                path: "local.db".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            jikan: JikanConfig {
                base_url: "https://api.jikan.moe/v4".to_string(),
                min_interval_ms: 1000,
                requests_per_minute: Some(60),
            },
            tmdb: TmdbConfig {
                base_url: "https://api.themoviedb.org/3".to_string(),
                api_key: String::new(),
                image_base_url: "https://image.tmdb.org/t/p".to_string(),
                race_timeout_ms: None,
            },
            cache: CacheConfig::default(),
            resilience: ResilienceConfig::default(),
            device: DeviceConfig::default(),
            player: PlayerConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    /// `TMDB_API_KEY` overrides the configured key in both cases.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            Self::default()
        } else {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            tracing::info!(
                path = %path.display(),
                "Configuration loaded successfully"
            );
            config
        };

        if let Ok(key) = std::env::var(TMDB_API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.tmdb.api_key = key.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Load configuration from a TOML file or create default if not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the absolute path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the database file
    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

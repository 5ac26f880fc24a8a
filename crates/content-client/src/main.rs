//! Content client CLI application.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use content_client::{ContentClients, TrendingScope};
use serde::Serialize;
use shared::{Config, ContentRecord, MediaType, WatchMediaType};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Treat the device as offline (cache and fallback data only)
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trending titles; for movies and TV the media may also be "all"
    Trending {
        #[arg(default_value = "all")]
        media: String,
    },
    /// Most popular titles
    Popular { media: MediaType },
    /// Highest rated titles
    TopRated { media: MediaType },
    /// Search by title
    Search {
        media: SearchDomain,
        query: String,
    },
    /// Details for one title
    Details { media: MediaType, id: u64 },
    /// Titles similar to one title
    Recommendations { media: MediaType, id: u64 },
    /// Anime airing this season
    Seasonal,
    /// Episodes of one TV season
    Season { tv_id: u64, season: u32 },
    /// Player embed URL
    Embed {
        media: MediaType,
        id: String,
        /// Season (tv), episode (tv, anime), or chapter (manga)
        #[arg(long, default_value_t = 1)]
        season: u32,
        #[arg(long, default_value_t = 1)]
        episode: u32,
        /// Dubbed audio (anime)
        #[arg(long)]
        dub: bool,
    },
    /// Cache statistics after warming the trending lists
    CacheStats,
}

#[derive(Debug, Clone, Copy)]
enum SearchDomain {
    /// Movies and TV together
    Media,
    Anime,
    Manga,
}

impl std::str::FromStr for SearchDomain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "media" | "movie" | "tv" | "multi" => Ok(SearchDomain::Media),
            "anime" => Ok(SearchDomain::Anime),
            "manga" => Ok(SearchDomain::Manga),
            _ => Err(anyhow::anyhow!("Invalid search domain: {}", s)),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

fn watch_media(media: MediaType) -> Result<WatchMediaType> {
    match media {
        MediaType::Movie => Ok(WatchMediaType::Movie),
        MediaType::Tv => Ok(WatchMediaType::Tv),
        other => bail!("{} is not a TMDB media type", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if args.offline {
        config.device.offline = true;
    }

    shared::logging::init(shared::LogConfig::from_config(
        &config,
        "content-client",
        args.verbose,
    ))?;

    info!(config_file = %args.config.display(), "Content client starting");

    let clients = ContentClients::from_config(&config).context("Failed to build content clients")?;

    match args.command {
        Command::Trending { media } => {
            let records = match media.as_str() {
                "anime" => clients.anime.fetch_trending_anime().await,
                "manga" => clients.manga.fetch_trending_manga().await,
                scope => clients.media.fetch_trending(scope.parse()?).await,
            };
            print_json(&records)?;
        }
        Command::Popular { media } => {
            let records = match media {
                MediaType::Movie => clients.media.fetch_popular_movies().await,
                MediaType::Tv => clients.media.fetch_popular_tv().await,
                MediaType::Anime => clients.anime.fetch_popular_anime().await,
                MediaType::Manga => clients.manga.fetch_popular_manga().await,
            };
            print_json(&records)?;
        }
        Command::TopRated { media } => {
            let records = match media {
                MediaType::Movie => clients.media.fetch_top_rated_movies().await,
                MediaType::Tv => clients.media.fetch_top_rated_tv().await,
                MediaType::Anime => clients.anime.fetch_top_rated_anime().await,
                MediaType::Manga => clients.manga.fetch_top_rated_manga().await,
            };
            print_json(&records)?;
        }
        Command::Search { media, query } => {
            let records = match media {
                SearchDomain::Media => clients.media.search_multi(&query).await,
                SearchDomain::Anime => clients.anime.search_anime(&query).await,
                SearchDomain::Manga => clients.manga.search_manga(&query).await,
            };
            print_json(&records)?;
        }
        Command::Details { media, id } => {
            let record: ContentRecord = match media {
                MediaType::Movie => clients.media.get_movie_details(id).await?,
                MediaType::Tv => clients.media.get_tv_details(id).await?,
                MediaType::Anime => clients.anime.get_anime_details(id).await?,
                MediaType::Manga => clients.manga.get_manga_details(id).await?,
            };
            print_json(&record)?;
        }
        Command::Recommendations { media, id } => {
            let records = match media {
                MediaType::Anime => clients.anime.get_anime_recommendations(id).await?,
                MediaType::Manga => clients.manga.get_manga_recommendations(id).await?,
                other => {
                    clients
                        .media
                        .get_recommendations(watch_media(other)?, id)
                        .await?
                }
            };
            print_json(&records)?;
        }
        Command::Seasonal => {
            print_json(&clients.anime.fetch_seasonal_anime().await)?;
        }
        Command::Season { tv_id, season } => {
            print_json(&clients.media.get_season_episodes(tv_id, season).await?)?;
        }
        Command::Embed {
            media,
            id,
            season,
            episode,
            dub,
        } => {
            let url = match media {
                MediaType::Movie => clients.embeds.movie_embed_url(&id),
                MediaType::Tv => clients.embeds.tv_embed_url(&id, season, episode),
                MediaType::Anime => clients.embeds.anime_embed_url(&id, episode, dub),
                MediaType::Manga => clients.embeds.manga_embed_url(&id, episode),
            };
            println!("{}", url);
        }
        Command::CacheStats => {
            clients.media.fetch_trending(TrendingScope::All).await;
            clients.anime.fetch_trending_anime().await;
            clients.manga.fetch_trending_manga().await;
            let stats = clients.cache.stats();
            info!(
                total_entries = stats.total_entries,
                fresh_entries = stats.fresh_entries,
                "Cache statistics"
            );
            print_json(&stats)?;
        }
    }

    Ok(())
}

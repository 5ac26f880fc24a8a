//! Upstream response types and their mapping to [`ContentRecord`].
//!
//! Every field is optional or defaulted so a sparse upstream payload still
//! deserializes; the documented defaults are applied during normalization.

use serde::{Deserialize, Serialize};
use shared::{ContentDetails, ContentRecord, EpisodeSummary, Genre, MediaType};

// ---------------------------------------------------------------------------
// Jikan
// ---------------------------------------------------------------------------

/// List wrapper (`/top/anime`, `/anime?q=`, `/seasons/now`, ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Single-item wrapper (`/anime/{id}/full`, `/manga/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse<T> {
    pub data: T,
}

/// Anime or manga entry; the two share almost every field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JikanEntry {
    pub mal_id: u64,
    pub title: Option<String>,
    pub title_english: Option<String>,
    pub images: Option<JikanImages>,
    pub trailer: Option<Trailer>,
    pub synopsis: Option<String>,
    pub score: Option<f64>,
    pub scored_by: Option<u64>,
    pub rank: Option<u32>,
    pub status: Option<String>,
    pub genres: Vec<MalEntity>,

    // Anime
    pub episodes: Option<u32>,
    pub aired: Option<DateRange>,
    pub studios: Vec<MalEntity>,

    // Manga
    pub chapters: Option<u32>,
    pub volumes: Option<u32>,
    pub published: Option<DateRange>,
    pub authors: Vec<MalEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JikanImages {
    pub jpg: Option<ImageSet>,
    pub webp: Option<ImageSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSet {
    pub image_url: Option<String>,
    pub small_image_url: Option<String>,
    pub large_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Trailer {
    pub images: Option<TrailerImages>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailerImages {
    pub maximum_image_url: Option<String>,
    pub large_image_url: Option<String>,
}

/// Aired / published range
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// MAL entity (genre, studio, author)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MalEntity {
    pub mal_id: u64,
    pub name: String,
}

/// Entry of `/anime/{id}/recommendations`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JikanRecommendation {
    pub entry: JikanEntry,
    pub votes: Option<u64>,
}

impl JikanImages {
    fn poster(&self) -> Option<String> {
        let pick = |set: &Option<ImageSet>| {
            set.as_ref()
                .and_then(|s| s.large_image_url.clone().or_else(|| s.image_url.clone()))
        };
        pick(&self.jpg).or_else(|| pick(&self.webp))
    }
}

impl JikanEntry {
    /// Normalize into a record of `media` (anime or manga)
    pub fn into_record(self, media: MediaType) -> ContentRecord {
        let title = self.title_english.filter(|t| !t.trim().is_empty()).or(self.title);
        let poster = self.images.as_ref().and_then(JikanImages::poster);
        let backdrop = self
            .trailer
            .and_then(|t| t.images)
            .and_then(|i| i.maximum_image_url.or(i.large_image_url))
            .or_else(|| poster.clone());
        let started = match media {
            MediaType::Manga => self.published.and_then(|d| d.from),
            _ => self.aired.and_then(|d| d.from),
        };

        let details = match media {
            MediaType::Manga => ContentDetails::Manga {
                chapters: self.chapters,
                volumes: self.volumes,
                status: self.status,
                authors: self.authors.into_iter().map(|a| a.name).collect(),
            },
            _ => ContentDetails::Anime {
                episodes: self.episodes,
                status: self.status,
                rank: self.rank,
                studios: self.studios.into_iter().map(|s| s.name).collect(),
            },
        };

        ContentRecord::new(self.mal_id, title.as_deref(), media)
            .with_poster(poster)
            .with_backdrop(backdrop)
            .with_overview(self.synopsis)
            .with_release_date(started.as_deref())
            .with_rating(self.score, self.scored_by)
            .with_genres(
                self.genres
                    .into_iter()
                    .map(|g| Genre {
                        id: g.mal_id,
                        name: g.name,
                    })
                    .collect(),
            )
            .with_details(details)
    }
}

// ---------------------------------------------------------------------------
// TMDB
// ---------------------------------------------------------------------------

/// Paged result list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbPage {
    pub page: u32,
    pub results: Vec<TmdbItem>,
    pub total_pages: u32,
}

/// Movie, TV show or (in multi search) person
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbItem {
    pub id: u64,
    pub title: Option<String>,
    pub name: Option<String>,
    pub media_type: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub genre_ids: Vec<u64>,
    /// Present on details responses instead of `genre_ids`
    pub genres: Vec<TmdbGenre>,
    pub runtime: Option<u32>,
    pub number_of_seasons: Option<u32>,
    pub number_of_episodes: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbGenre {
    pub id: u64,
    pub name: String,
}

/// `/tv/{id}/season/{n}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbSeason {
    pub season_number: u32,
    pub episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbEpisode {
    pub season_number: u32,
    pub episode_number: u32,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub still_path: Option<String>,
    pub vote_average: Option<f64>,
}

/// Builds absolute image URLs from TMDB relative paths
#[derive(Debug, Clone)]
pub struct TmdbImages {
    base_url: String,
}

impl TmdbImages {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn poster(&self, path: Option<&str>) -> Option<String> {
        self.sized("w500", path)
    }

    pub fn backdrop(&self, path: Option<&str>) -> Option<String> {
        self.sized("original", path)
    }

    pub fn still(&self, path: Option<&str>) -> Option<String> {
        self.sized("w300", path)
    }

    fn sized(&self, size: &str, path: Option<&str>) -> Option<String> {
        path.filter(|p| !p.trim().is_empty())
            .map(|p| format!("{}/{}{}", self.base_url, size, p))
    }
}

impl TmdbItem {
    /// Media type from the multi-search tag, if present
    pub fn tagged_media(&self) -> Option<MediaType> {
        match self.media_type.as_deref() {
            Some("movie") => Some(MediaType::Movie),
            Some("tv") => Some(MediaType::Tv),
            _ => None,
        }
    }

    pub fn is_person(&self) -> bool {
        self.media_type.as_deref() == Some("person")
    }

    /// Normalize into a record; `media` is used when the item is untagged
    pub fn into_record(self, media: MediaType, images: &TmdbImages) -> ContentRecord {
        let media = self.tagged_media().unwrap_or(media);
        let title = match media {
            MediaType::Tv => self.name.or(self.title),
            _ => self.title.or(self.name),
        };
        let date = match media {
            MediaType::Tv => self.first_air_date.or(self.release_date),
            _ => self.release_date.or(self.first_air_date),
        };

        let genres = if self.genres.is_empty() {
            self.genre_ids
                .iter()
                .map(|&id| Genre {
                    id,
                    name: tmdb_genre_name(id).to_string(),
                })
                .collect()
        } else {
            self.genres
                .into_iter()
                .map(|g| Genre {
                    id: g.id,
                    name: g.name,
                })
                .collect()
        };

        let details = match media {
            MediaType::Tv => ContentDetails::Tv {
                seasons: self.number_of_seasons,
                episodes: self.number_of_episodes,
            },
            _ => ContentDetails::Movie {
                runtime_minutes: self.runtime,
            },
        };

        ContentRecord::new(self.id, title.as_deref(), media)
            .with_poster(images.poster(self.poster_path.as_deref()))
            .with_backdrop(images.backdrop(self.backdrop_path.as_deref()))
            .with_overview(self.overview)
            .with_release_date(date.as_deref())
            .with_rating(self.vote_average, self.vote_count)
            .with_genres(genres)
            .with_details(details)
    }
}

impl TmdbEpisode {
    pub fn into_summary(self, images: &TmdbImages) -> EpisodeSummary {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Episode {}", self.episode_number));
        EpisodeSummary {
            season: self.season_number,
            episode: self.episode_number,
            name,
            overview: self
                .overview
                .filter(|o| !o.trim().is_empty())
                .unwrap_or_else(|| shared::DEFAULT_OVERVIEW.to_string()),
            air_date: self
                .air_date
                .as_deref()
                .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            still_url: images.still(self.still_path.as_deref()),
            rating_average: self
                .vote_average
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(0.0),
        }
    }
}

/// Names for TMDB's fixed movie and TV genre ids
pub fn tmdb_genre_name(id: u64) -> &'static str {
    match id {
        28 => "Action",
        12 => "Adventure",
        16 => "Animation",
        35 => "Comedy",
        80 => "Crime",
        99 => "Documentary",
        18 => "Drama",
        10751 => "Family",
        14 => "Fantasy",
        36 => "History",
        27 => "Horror",
        10402 => "Music",
        9648 => "Mystery",
        10749 => "Romance",
        878 => "Science Fiction",
        10770 => "TV Movie",
        53 => "Thriller",
        10752 => "War",
        37 => "Western",
        10759 => "Action & Adventure",
        10762 => "Kids",
        10763 => "News",
        10764 => "Reality",
        10765 => "Sci-Fi & Fantasy",
        10766 => "Soap",
        10767 => "Talk",
        10768 => "War & Politics",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sparse_jikan_entry_gets_defaults() {
        let entry: JikanEntry = serde_json::from_value(json!({"mal_id": 42})).unwrap();
        let record = entry.into_record(MediaType::Anime);

        assert_eq!(record.id, 42);
        assert_eq!(record.title, shared::DEFAULT_TITLE);
        assert_eq!(record.overview, shared::DEFAULT_OVERVIEW);
        assert!(record.poster_url.contains("placeholder"));
        assert_eq!(record.rating_average, 0.0);
        assert_eq!(record.rating_count, 0);
        assert!(record.genres.is_empty());
        assert!(!record.is_mock_data);
    }

    #[test]
    fn test_full_anime_entry() {
        let entry: JikanEntry = serde_json::from_value(json!({
            "mal_id": 5114,
            "title": "Hagane no Renkinjutsushi: Fullmetal Alchemist",
            "title_english": "Fullmetal Alchemist: Brotherhood",
            "images": {"jpg": {"image_url": "https://cdn/a.jpg", "large_image_url": "https://cdn/a_l.jpg"}},
            "synopsis": "Two brothers...",
            "score": 9.1,
            "scored_by": 2000000,
            "rank": 1,
            "episodes": 64,
            "status": "Finished Airing",
            "aired": {"from": "2009-04-05T00:00:00+00:00"},
            "genres": [{"mal_id": 1, "name": "Action", "type": "anime"}],
            "studios": [{"mal_id": 4, "name": "Bones"}]
        }))
        .unwrap();
        let record = entry.into_record(MediaType::Anime);

        assert_eq!(record.title, "Fullmetal Alchemist: Brotherhood");
        assert_eq!(record.poster_url, "https://cdn/a_l.jpg");
        assert_eq!(record.backdrop_url, "https://cdn/a_l.jpg");
        assert_eq!(record.release_date.unwrap().to_string(), "2009-04-05");
        assert_eq!(record.genres[0].name, "Action");
        assert_eq!(
            record.details,
            ContentDetails::Anime {
                episodes: Some(64),
                status: Some("Finished Airing".to_string()),
                rank: Some(1),
                studios: vec!["Bones".to_string()],
            }
        );
    }

    #[test]
    fn test_manga_uses_published_date() {
        let entry: JikanEntry = serde_json::from_value(json!({
            "mal_id": 2,
            "title": "Berserk",
            "chapters": null,
            "volumes": 41,
            "published": {"from": "1989-08-25T00:00:00+00:00"},
            "authors": [{"mal_id": 1868, "name": "Miura, Kentarou"}]
        }))
        .unwrap();
        let record = entry.into_record(MediaType::Manga);

        assert_eq!(record.release_date.unwrap().to_string(), "1989-08-25");
        assert!(matches!(
            record.details,
            ContentDetails::Manga { volumes: Some(41), ref authors, .. } if authors.len() == 1
        ));
    }

    #[test]
    fn test_tmdb_movie_and_tv() {
        let images = TmdbImages::new("https://image.tmdb.org/t/p/");
        let movie: TmdbItem = serde_json::from_value(json!({
            "id": 550,
            "title": "Fight Club",
            "poster_path": "/p.jpg",
            "release_date": "1999-10-15",
            "vote_average": 8.4,
            "vote_count": 100,
            "genre_ids": [18]
        }))
        .unwrap();
        let record = movie.into_record(MediaType::Movie, &images);
        assert_eq!(record.poster_url, "https://image.tmdb.org/t/p/w500/p.jpg");
        assert!(record.backdrop_url.contains("placeholder"));
        assert_eq!(record.genres[0].name, "Drama");

        let show: TmdbItem = serde_json::from_value(json!({
            "id": 1396,
            "name": "Breaking Bad",
            "media_type": "tv",
            "first_air_date": "2008-01-20",
            "number_of_seasons": 5
        }))
        .unwrap();
        let record = show.into_record(MediaType::Movie, &images);
        assert_eq!(record.media_type, MediaType::Tv);
        assert_eq!(record.title, "Breaking Bad");
        assert_eq!(
            record.details,
            ContentDetails::Tv {
                seasons: Some(5),
                episodes: None
            }
        );
    }

    #[test]
    fn test_invalid_date_is_none() {
        let images = TmdbImages::new("https://image.tmdb.org/t/p");
        let item: TmdbItem =
            serde_json::from_value(json!({"id": 1, "release_date": "", "vote_average": -3.0})).unwrap();
        let record = item.into_record(MediaType::Movie, &images);
        assert_eq!(record.release_date, None);
        assert_eq!(record.rating_average, 0.0);
    }
}

//! Movie and TV façade over TMDB.
//!
//! TMDB has no hard documented rate limit, so calls skip the queue and go
//! through the bounded fetch race instead. Anything that misses the race
//! window is answered from stale cache or the movie/TV catalog.

use serde_json::Value;
use shared::{ClientError, ContentRecord, EpisodeSummary, MediaType, WatchMediaType};
use tracing::{debug, info, warn};

use crate::api::client::RaceJsonClient;
use crate::api::types::{TmdbImages, TmdbItem, TmdbPage, TmdbSeason};
use crate::fallback::{RequestKind, RequestSignature};
use crate::jikan::require_id;
use crate::source::{list_or_fallback, single_or_fallback, CacheClass, ContentSource};

/// Media filter for `/trending/{scope}/week`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendingScope {
    All,
    Movie,
    Tv,
}

impl TrendingScope {
    fn segment(&self) -> &'static str {
        match self {
            TrendingScope::All => "all",
            TrendingScope::Movie => "movie",
            TrendingScope::Tv => "tv",
        }
    }

    fn media(&self) -> Option<MediaType> {
        match self {
            TrendingScope::All => None,
            TrendingScope::Movie => Some(MediaType::Movie),
            TrendingScope::Tv => Some(MediaType::Tv),
        }
    }
}

impl std::str::FromStr for TrendingScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TrendingScope::All),
            "movie" => Ok(TrendingScope::Movie),
            "tv" => Ok(TrendingScope::Tv),
            _ => Err(anyhow::anyhow!("Invalid trending scope: {}", s)),
        }
    }
}

pub struct MediaClient {
    source: RaceJsonClient,
    images: TmdbImages,
}

impl MediaClient {
    pub fn new(source: RaceJsonClient, image_base_url: &str) -> Self {
        Self {
            source,
            images: TmdbImages::new(image_base_url),
        }
    }

    pub fn source(&self) -> &RaceJsonClient {
        &self.source
    }

    /// Page of results; people are dropped, untagged items take `media`
    fn page(&self, payload: Value, media: MediaType) -> Result<Vec<ContentRecord>, serde_json::Error> {
        let page: TmdbPage = serde_json::from_value(payload)?;
        Ok(page
            .results
            .into_iter()
            .filter(|item| !item.is_person())
            .map(|item| item.into_record(media, &self.images))
            .collect())
    }

    async fn list(&self, path: &str, media: Option<MediaType>, kind: RequestKind) -> Vec<ContentRecord> {
        let signature = RequestSignature { media, kind };
        let default_media = media.unwrap_or(MediaType::Movie);
        list_or_fallback(&self.source, path, signature, |v| self.page(v, default_media)).await
    }

    pub async fn fetch_trending(&self, scope: TrendingScope) -> Vec<ContentRecord> {
        info!(scope = scope.segment(), "Fetching trending");
        let path = format!("/trending/{}/week", scope.segment());
        self.list(&path, scope.media(), RequestKind::Trending).await
    }

    pub async fn fetch_popular_movies(&self) -> Vec<ContentRecord> {
        self.list("/movie/popular", Some(MediaType::Movie), RequestKind::Popular)
            .await
    }

    pub async fn fetch_top_rated_movies(&self) -> Vec<ContentRecord> {
        self.list("/movie/top_rated", Some(MediaType::Movie), RequestKind::TopRated)
            .await
    }

    pub async fn fetch_popular_tv(&self) -> Vec<ContentRecord> {
        self.list("/tv/popular", Some(MediaType::Tv), RequestKind::Popular)
            .await
    }

    pub async fn fetch_top_rated_tv(&self) -> Vec<ContentRecord> {
        self.list("/tv/top_rated", Some(MediaType::Tv), RequestKind::TopRated)
            .await
    }

    /// Movies and shows matching `query`; blank queries return `[]` offline
    pub async fn search_multi(&self, query: &str) -> Vec<ContentRecord> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Empty search query, skipping request");
            return Vec::new();
        }
        let path = format!(
            "/search/multi?query={}&include_adult=false",
            urlencoding::encode(query)
        );
        self.list(&path, None, RequestKind::Search(query.to_string()))
            .await
    }

    async fn details(&self, media: WatchMediaType, id: u64) -> Result<ContentRecord, ClientError> {
        let id = require_id(id, media_label(media))?;
        let media: MediaType = media.into();
        let path = format!("/{}/{}", media, id);
        Ok(single_or_fallback(
            &self.source,
            &path,
            RequestSignature::new(media, RequestKind::Details(id)),
            |v| serde_json::from_value::<TmdbItem>(v).map(|item| item.into_record(media, &self.images)),
        )
        .await)
    }

    pub async fn get_movie_details(&self, id: u64) -> Result<ContentRecord, ClientError> {
        self.details(WatchMediaType::Movie, id).await
    }

    pub async fn get_tv_details(&self, id: u64) -> Result<ContentRecord, ClientError> {
        self.details(WatchMediaType::Tv, id).await
    }

    pub async fn get_recommendations(
        &self,
        media: WatchMediaType,
        id: u64,
    ) -> Result<Vec<ContentRecord>, ClientError> {
        let id = require_id(id, media_label(media))?;
        let path = format!("/{}/{}/recommendations", media, id);
        Ok(self
            .list(&path, Some(media.into()), RequestKind::Recommendations(id))
            .await)
    }

    /// Most popular titles in a genre
    pub async fn fetch_by_genre(&self, media: WatchMediaType, genre_id: u64) -> Vec<ContentRecord> {
        let path = format!(
            "/discover/{}?with_genres={}&sort_by=popularity.desc",
            media, genre_id
        );
        self.list(&path, Some(media.into()), RequestKind::ByGenre(genre_id))
            .await
    }

    /// Episodes of one season; empty when the season cannot be loaded
    pub async fn get_season_episodes(
        &self,
        tv_id: u64,
        season: u32,
    ) -> Result<Vec<EpisodeSummary>, ClientError> {
        let tv_id = require_id(tv_id, "tv")?;
        let path = format!("/tv/{}/season/{}", tv_id, season);

        let payload = match self.source.fetch(&path, CacheClass::Metadata).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(tv_id = tv_id, season = season, error = %e, "Season unavailable");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_value::<TmdbSeason>(payload) {
            Ok(listing) => Ok(listing
                .episodes
                .into_iter()
                .map(|episode| episode.into_summary(&self.images))
                .collect()),
            Err(e) => {
                warn!(tv_id = tv_id, season = season, error = %e, "Unexpected season shape");
                Ok(Vec::new())
            }
        }
    }
}

fn media_label(media: WatchMediaType) -> &'static str {
    match media {
        WatchMediaType::Movie => "movie",
        WatchMediaType::Tv => "tv",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::StaticCatalog;
    use crate::source::AcquisitionContext;
    use crate::testing::{self, ScriptedTransport};
    use serde_json::json;
    use shared::config::ResilienceConfig;
    use shared::Config;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use wiremock::matchers::{any, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, race_timeout: Duration) -> MediaClient {
        let (_monitor, context) = testing::desktop();
        MediaClient::new(
            testing::tmdb_client(&server.uri(), race_timeout, context),
            "https://image.tmdb.org/t/p",
        )
    }

    /// Client built from the default configuration, so the race budget comes from the profile
    fn configured(transport: Arc<ScriptedTransport>, context: AcquisitionContext) -> MediaClient {
        let config = Config::default();
        MediaClient::new(
            RaceJsonClient::tmdb(
                &config.tmdb,
                &ResilienceConfig::default(),
                transport,
                context,
                StaticCatalog::movies_and_tv(),
            ),
            &config.tmdb.image_base_url,
        )
    }

    fn popular_body() -> Value {
        json!({"results": [{"id": 550, "title": "Fight Club"}]})
    }

    #[tokio::test]
    async fn test_fast_response_returns_live_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/popular"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 1,
                "results": [{"id": 550, "title": "Fight Club", "vote_average": 8.4}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(&server, Duration::from_secs(1)).fetch_popular_movies().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_mock_data);
        assert_eq!(records[0].media_type, MediaType::Movie);
    }

    #[tokio::test]
    async fn test_slow_upstream_loses_race() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"results": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = client(&server, Duration::from_millis(300));
        let started = Instant::now();
        let records = client.fetch_trending(TrendingScope::All).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.is_mock_data));
    }

    #[tokio::test]
    async fn test_multi_search_drops_people() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/multi"))
            .and(query_param("query", "nolan"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"id": 525, "name": "Christopher Nolan", "media_type": "person"},
                    {"id": 27205, "title": "Inception", "media_type": "movie"},
                    {"id": 1, "name": "Some Show", "media_type": "tv"}
                ]
            })))
            .mount(&server)
            .await;

        let records = client(&server, Duration::from_secs(1)).search_multi("nolan").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].media_type, MediaType::Movie);
        assert_eq!(records[1].media_type, MediaType::Tv);
    }

    #[tokio::test]
    async fn test_blank_search_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(client(&server, Duration::from_secs(1)).search_multi("  ").await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_ids_rejected() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server, Duration::from_secs(1));
        assert_eq!(
            client.get_movie_details(0).await,
            Err(ClientError::MissingId { what: "movie" })
        );
        assert!(client.get_recommendations(WatchMediaType::Tv, 0).await.is_err());
        assert!(client.get_season_episodes(0, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_tv_details_and_season() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tv/1396"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1396,
                "name": "Breaking Bad",
                "genres": [{"id": 18, "name": "Drama"}],
                "number_of_seasons": 5,
                "number_of_episodes": 62
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tv/1396/season/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "season_number": 1,
                "episodes": [
                    {"season_number": 1, "episode_number": 1, "name": "Pilot", "air_date": "2008-01-20"},
                    {"season_number": 1, "episode_number": 2}
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server, Duration::from_secs(1));
        let show = client.get_tv_details(1396).await.unwrap();
        assert_eq!(show.title, "Breaking Bad");
        assert_eq!(show.genres[0].name, "Drama");

        let episodes = client.get_season_episodes(1396, 1).await.unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].name, "Pilot");
        assert_eq!(episodes[1].name, "Episode 2");
    }

    #[tokio::test]
    async fn test_season_failure_is_empty() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let episodes = client(&server, Duration::from_secs(5))
            .get_season_episodes(1396, 9)
            .await
            .unwrap();
        assert!(episodes.is_empty());
    }

    #[tokio::test]
    async fn test_by_genre_fallback_filters_catalog() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let records = client(&server, Duration::from_secs(5))
            .fetch_by_genre(WatchMediaType::Movie, 878)
            .await;
        assert!(!records.is_empty());
        assert!(records
            .iter()
            .all(|r| r.is_mock_data && r.genres.iter().any(|g| g.id == 878)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mobile_retries_fit_inside_device_timeout() {
        // Backoff of 1 s, 2 s, 4 s before the fourth attempt
        let transport = ScriptedTransport::new(popular_body(), 3, Duration::from_millis(50));
        let (_monitor, context) = testing::mobile();

        let records = configured(transport.clone(), context).fetch_popular_movies().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_mock_data);
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_desktop_retries_transient_failure_once() {
        let transport = ScriptedTransport::new(popular_body(), 1, Duration::from_millis(50));
        let (_monitor, context) = testing::desktop();

        let records = configured(transport.clone(), context).fetch_popular_movies().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_mock_data);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_upstream_bounded_by_profile_timeout() {
        let transport = ScriptedTransport::new(popular_body(), 0, Duration::from_secs(120));
        let (_monitor, context) = testing::desktop();

        let started = Instant::now();
        let records = configured(transport, context).fetch_popular_movies().await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
        assert!(records.iter().all(|r| r.is_mock_data));
    }
}

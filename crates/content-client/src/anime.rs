//! Anime façade over Jikan.

use shared::{ClientError, ContentRecord, MediaType};

use crate::api::client::RateLimitedJsonClient;
use crate::jikan::{JikanCatalog, TopFilter};

pub struct AnimeClient {
    catalog: JikanCatalog,
}

impl AnimeClient {
    pub fn new(source: RateLimitedJsonClient) -> Self {
        Self {
            catalog: JikanCatalog::new(source, MediaType::Anime),
        }
    }

    /// Currently airing, by score
    pub async fn fetch_trending_anime(&self) -> Vec<ContentRecord> {
        self.catalog.top(TopFilter::Current).await
    }

    pub async fn fetch_popular_anime(&self) -> Vec<ContentRecord> {
        self.catalog.top(TopFilter::ByPopularity).await
    }

    pub async fn fetch_top_rated_anime(&self) -> Vec<ContentRecord> {
        self.catalog.top(TopFilter::Score).await
    }

    pub async fn fetch_seasonal_anime(&self) -> Vec<ContentRecord> {
        self.catalog.seasonal().await
    }

    /// Returns `[]` for a blank query without a network call
    pub async fn search_anime(&self, query: &str) -> Vec<ContentRecord> {
        self.catalog.search(query).await
    }

    pub async fn get_anime_details(&self, id: u64) -> Result<ContentRecord, ClientError> {
        self.catalog.details(id).await
    }

    pub async fn get_anime_recommendations(&self, id: u64) -> Result<Vec<ContentRecord>, ClientError> {
        self.catalog.recommendations(id).await
    }

    pub fn source(&self) -> &RateLimitedJsonClient {
        self.catalog.source()
    }
}

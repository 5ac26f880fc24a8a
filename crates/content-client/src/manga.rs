//! Manga façade over Jikan.

use shared::{ClientError, ContentRecord, MediaType};

use crate::api::client::RateLimitedJsonClient;
use crate::jikan::{JikanCatalog, TopFilter};

pub struct MangaClient {
    catalog: JikanCatalog,
}

impl MangaClient {
    pub fn new(source: RateLimitedJsonClient) -> Self {
        Self {
            catalog: JikanCatalog::new(source, MediaType::Manga),
        }
    }

    /// Currently publishing, by score
    pub async fn fetch_trending_manga(&self) -> Vec<ContentRecord> {
        self.catalog.top(TopFilter::Current).await
    }

    pub async fn fetch_popular_manga(&self) -> Vec<ContentRecord> {
        self.catalog.top(TopFilter::ByPopularity).await
    }

    pub async fn fetch_top_rated_manga(&self) -> Vec<ContentRecord> {
        self.catalog.top(TopFilter::Score).await
    }

    pub async fn search_manga(&self, query: &str) -> Vec<ContentRecord> {
        self.catalog.search(query).await
    }

    pub async fn get_manga_details(&self, id: u64) -> Result<ContentRecord, ClientError> {
        self.catalog.details(id).await
    }

    pub async fn get_manga_recommendations(&self, id: u64) -> Result<Vec<ContentRecord>, ClientError> {
        self.catalog.recommendations(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::StaticCatalog;
    use crate::testing;
    use serde_json::json;
    use shared::ContentDetails;
    use wiremock::matchers::{any, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_trending_uses_publishing_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/top/manga"))
            .and(query_param("filter", "publishing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"mal_id": 13, "title": "One Piece", "chapters": null, "status": "Publishing"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (_monitor, context) = testing::desktop();
        let client = MangaClient::new(testing::jikan_client(
            testing::jikan_upstream(&server.uri()),
            context,
            StaticCatalog::manga(),
        ));

        let records = client.fetch_trending_manga().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].media_type, MediaType::Manga);
        assert!(matches!(
            records[0].details,
            ContentDetails::Manga { chapters: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_blank_search_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (_monitor, context) = testing::desktop();
        let client = MangaClient::new(testing::jikan_client(
            testing::jikan_upstream(&server.uri()),
            context,
            StaticCatalog::manga(),
        ));
        assert!(client.search_manga(" ").await.is_empty());
    }

    #[tokio::test]
    async fn test_shares_rate_limit_history_with_anime() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let (_monitor, context) = testing::desktop();
        let upstream = testing::jikan_upstream(&server.uri());
        let anime = crate::anime::AnimeClient::new(testing::jikan_client(
            upstream.clone(),
            context.clone(),
            StaticCatalog::anime(),
        ));
        let manga = MangaClient::new(testing::jikan_client(upstream, context, StaticCatalog::manga()));

        anime.fetch_trending_anime().await;
        manga.fetch_trending_manga().await;
        anime.fetch_popular_anime().await;

        // Upstream is now suppressed for both domains
        let records = manga.fetch_popular_manga().await;
        assert!(records.iter().all(|r| r.is_mock_data && r.media_type == MediaType::Manga));
    }

    #[tokio::test]
    async fn test_details_fallback_keeps_requested_id() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (_monitor, context) = testing::desktop();
        let client = MangaClient::new(testing::jikan_client(
            testing::jikan_upstream(&server.uri()),
            context,
            StaticCatalog::manga(),
        ));

        let record = client.get_manga_details(777).await.unwrap();
        assert_eq!(record.id, 777);
        assert!(record.is_mock_data);
        assert_eq!(
            client.get_manga_details(0).await,
            Err(ClientError::MissingId { what: "manga" })
        );
    }
}

//! Jikan-backed catalog shared by the anime and manga façades.
//!
//! Jikan serves anime and manga under parallel paths (`/top/anime`,
//! `/top/manga`, ...) with the same entry shape, so both façades are thin
//! wrappers over one [`JikanCatalog`] parameterized by media type.

use serde_json::Value;
use shared::{ClientError, ContentRecord, MediaType};
use tracing::{debug, info};

use crate::api::client::RateLimitedJsonClient;
use crate::api::types::{DataResponse, ItemResponse, JikanEntry, JikanRecommendation};
use crate::fallback::{RequestKind, RequestSignature};
use crate::source::{list_or_fallback, single_or_fallback};

/// Top-list ordering supported by `/top/{media}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopFilter {
    /// Currently airing or publishing
    Current,
    ByPopularity,
    /// Plain score ranking
    Score,
}

pub struct JikanCatalog {
    source: RateLimitedJsonClient,
    media: MediaType,
}

impl JikanCatalog {
    pub fn new(source: RateLimitedJsonClient, media: MediaType) -> Self {
        Self { source, media }
    }

    pub fn source(&self) -> &RateLimitedJsonClient {
        &self.source
    }

    fn segment(&self) -> &'static str {
        match self.media {
            MediaType::Manga => "manga",
            _ => "anime",
        }
    }

    fn signature(&self, kind: RequestKind) -> RequestSignature {
        RequestSignature::new(self.media, kind)
    }

    fn entries(&self, payload: Value) -> Result<Vec<ContentRecord>, serde_json::Error> {
        let media = self.media;
        let response: DataResponse<JikanEntry> = serde_json::from_value(payload)?;
        Ok(response
            .data
            .into_iter()
            .map(|entry| entry.into_record(media))
            .collect())
    }

    pub async fn top(&self, filter: TopFilter) -> Vec<ContentRecord> {
        let (path, kind) = match (filter, self.media) {
            (TopFilter::Current, MediaType::Manga) => {
                (format!("/top/{}?filter=publishing", self.segment()), RequestKind::Trending)
            }
            (TopFilter::Current, _) => {
                (format!("/top/{}?filter=airing", self.segment()), RequestKind::Trending)
            }
            (TopFilter::ByPopularity, _) => (
                format!("/top/{}?filter=bypopularity", self.segment()),
                RequestKind::Popular,
            ),
            (TopFilter::Score, _) => (format!("/top/{}", self.segment()), RequestKind::TopRated),
        };
        info!(media = %self.media, filter = ?filter, "Fetching top list");
        list_or_fallback(&self.source, &path, self.signature(kind), |v| self.entries(v)).await
    }

    pub async fn search(&self, query: &str) -> Vec<ContentRecord> {
        let query = query.trim();
        if query.is_empty() {
            debug!(media = %self.media, "Empty search query, skipping request");
            return Vec::new();
        }
        let path = format!(
            "/{}?q={}&sfw=true",
            self.segment(),
            urlencoding::encode(query)
        );
        list_or_fallback(
            &self.source,
            &path,
            self.signature(RequestKind::Search(query.to_string())),
            |v| self.entries(v),
        )
        .await
    }

    pub async fn details(&self, id: u64) -> Result<ContentRecord, ClientError> {
        let id = require_id(id, self.segment())?;
        let media = self.media;
        let path = format!("/{}/{}/full", self.segment(), id);
        Ok(
            single_or_fallback(&self.source, &path, self.signature(RequestKind::Details(id)), |v| {
                serde_json::from_value::<ItemResponse<JikanEntry>>(v)
                    .map(|response| response.data.into_record(media))
            })
            .await,
        )
    }

    pub async fn recommendations(&self, id: u64) -> Result<Vec<ContentRecord>, ClientError> {
        let id = require_id(id, self.segment())?;
        let media = self.media;
        let path = format!("/{}/{}/recommendations", self.segment(), id);
        Ok(list_or_fallback(
            &self.source,
            &path,
            self.signature(RequestKind::Recommendations(id)),
            |v| {
                let response: DataResponse<JikanRecommendation> = serde_json::from_value(v)?;
                Ok(response
                    .data
                    .into_iter()
                    .map(|rec| rec.entry.into_record(media))
                    .collect())
            },
        )
        .await)
    }

    /// Current season; anime only
    pub async fn seasonal(&self) -> Vec<ContentRecord> {
        list_or_fallback(
            &self.source,
            "/seasons/now",
            self.signature(RequestKind::Seasonal),
            |v| self.entries(v),
        )
        .await
    }
}

/// Reject the zero id before touching cache or network
pub(crate) fn require_id(id: u64, what: &'static str) -> Result<u64, ClientError> {
    if id == 0 {
        Err(ClientError::MissingId { what })
    } else {
        Ok(id)
    }
}

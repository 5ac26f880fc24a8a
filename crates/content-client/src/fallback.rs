//! Fallback datasets used when live data cannot be acquired.
//!
//! Each domain ships a small static catalog. Records produced here always
//! carry `is_mock_data = true` so callers can surface degraded mode.

use shared::{ContentDetails, ContentRecord, Genre, MediaType};

/// What a façade call asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Trending,
    Popular,
    TopRated,
    Seasonal,
    Search(String),
    Details(u64),
    Recommendations(u64),
    ByGenre(u64),
}

/// Request identity used to choose fallback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    /// `None` means mixed media (for example trending across movies and TV)
    pub media: Option<MediaType>,
    pub kind: RequestKind,
}

impl RequestSignature {
    pub fn new(media: MediaType, kind: RequestKind) -> Self {
        Self {
            media: Some(media),
            kind,
        }
    }

    pub fn mixed(kind: RequestKind) -> Self {
        Self { media: None, kind }
    }
}

/// Source of substitute data for one domain
pub trait FallbackProvider: Send + Sync {
    fn mock_for(&self, signature: &RequestSignature) -> Vec<ContentRecord>;
}

/// Static catalog entry
#[derive(Debug, Clone, Copy)]
pub struct MockItem {
    pub id: u64,
    pub title: &'static str,
    pub release_date: &'static str,
    pub rating: f64,
    pub genres: &'static [(u64, &'static str)],
    pub media: MediaType,
}

const fn item(
    id: u64,
    title: &'static str,
    release_date: &'static str,
    rating: f64,
    genres: &'static [(u64, &'static str)],
    media: MediaType,
) -> MockItem {
    MockItem {
        id,
        title,
        release_date,
        rating,
        genres,
        media,
    }
}

impl MockItem {
    fn to_record(self) -> ContentRecord {
        ContentRecord::new(self.id, Some(self.title), self.media)
            .with_release_date(Some(self.release_date))
            .with_rating(Some(self.rating), None)
            .with_genres(
                self.genres
                    .iter()
                    .map(|&(id, name)| Genre {
                        id,
                        name: name.to_string(),
                    })
                    .collect(),
            )
            .mock()
    }
}

/// Fallback provider over a fixed list of items
pub struct StaticCatalog {
    items: &'static [MockItem],
}

impl StaticCatalog {
    pub const fn new(items: &'static [MockItem]) -> Self {
        Self { items }
    }

    pub fn movies_and_tv() -> Self {
        Self::new(MEDIA_ITEMS)
    }

    pub fn anime() -> Self {
        Self::new(ANIME_ITEMS)
    }

    pub fn manga() -> Self {
        Self::new(MANGA_ITEMS)
    }

    fn matching(&self, media: Option<MediaType>) -> impl Iterator<Item = &'static MockItem> {
        self.items
            .iter()
            .filter(move |item| media.map_or(true, |m| item.media == m))
    }
}

impl FallbackProvider for StaticCatalog {
    fn mock_for(&self, signature: &RequestSignature) -> Vec<ContentRecord> {
        let media = signature.media;
        match &signature.kind {
            RequestKind::Trending | RequestKind::Popular | RequestKind::Seasonal => {
                self.matching(media).map(|item| item.to_record()).collect()
            }
            RequestKind::TopRated => {
                let mut items: Vec<&MockItem> = self.matching(media).collect();
                items.sort_by(|a, b| b.rating.total_cmp(&a.rating));
                items.into_iter().map(|item| item.to_record()).collect()
            }
            RequestKind::Search(query) => {
                let needle = query.trim().to_lowercase();
                if needle.is_empty() {
                    return Vec::new();
                }
                self.matching(media)
                    .filter(|item| item.title.to_lowercase().contains(&needle))
                    .map(|item| item.to_record())
                    .collect()
            }
            RequestKind::Details(id) => {
                let record = self
                    .matching(media)
                    .find(|item| item.id == *id)
                    .map(|item| item.to_record())
                    .unwrap_or_else(|| unavailable_record(*id, media.unwrap_or(MediaType::Movie)));
                vec![record]
            }
            RequestKind::Recommendations(id) => self
                .matching(media)
                .filter(|item| item.id != *id)
                .map(|item| item.to_record())
                .collect(),
            RequestKind::ByGenre(genre) => self
                .matching(media)
                .filter(|item| item.genres.iter().any(|(id, _)| id == genre))
                .map(|item| item.to_record())
                .collect(),
        }
    }
}

/// Templated details record for an id the catalog does not know
pub fn unavailable_record(id: u64, media: MediaType) -> ContentRecord {
    let title = format!("{} #{} (offline)", media_label(media), id);
    ContentRecord::new(id, Some(&title), media)
        .with_overview(Some(
            "Details are temporarily unavailable. Please try again later.".to_string(),
        ))
        .with_details(ContentDetails::empty(media))
        .mock()
}

fn media_label(media: MediaType) -> &'static str {
    match media {
        MediaType::Movie => "Movie",
        MediaType::Tv => "TV Show",
        MediaType::Anime => "Anime",
        MediaType::Manga => "Manga",
    }
}

#[rustfmt::skip]
static MEDIA_ITEMS: &[MockItem] = &[
    item(550, "Fight Club", "1999-10-15", 8.4, &[(18, "Drama")], MediaType::Movie),
    item(27205, "Inception", "2010-07-15", 8.4, &[(28, "Action"), (878, "Science Fiction"), (12, "Adventure")], MediaType::Movie),
    item(157336, "Interstellar", "2014-11-05", 8.4, &[(12, "Adventure"), (18, "Drama"), (878, "Science Fiction")], MediaType::Movie),
    item(438631, "Dune", "2021-09-15", 7.8, &[(878, "Science Fiction"), (12, "Adventure")], MediaType::Movie),
    item(1396, "Breaking Bad", "2008-01-20", 8.9, &[(18, "Drama"), (80, "Crime")], MediaType::Tv),
    item(94605, "Arcane", "2021-11-06", 8.7, &[(16, "Animation"), (10765, "Sci-Fi & Fantasy")], MediaType::Tv),
    item(66732, "Stranger Things", "2016-07-15", 8.6, &[(18, "Drama"), (9648, "Mystery"), (10765, "Sci-Fi & Fantasy")], MediaType::Tv),
];

#[rustfmt::skip]
static ANIME_ITEMS: &[MockItem] = &[
    item(5114, "Fullmetal Alchemist: Brotherhood", "2009-04-05", 9.1, &[(1, "Action"), (2, "Adventure"), (8, "Drama"), (10, "Fantasy")], MediaType::Anime),
    item(9253, "Steins;Gate", "2011-04-06", 9.07, &[(8, "Drama"), (24, "Sci-Fi"), (41, "Suspense")], MediaType::Anime),
    item(16498, "Attack on Titan", "2013-04-07", 8.55, &[(1, "Action"), (8, "Drama"), (41, "Suspense")], MediaType::Anime),
    item(1535, "Death Note", "2006-10-04", 8.62, &[(37, "Supernatural"), (41, "Suspense")], MediaType::Anime),
    item(21, "One Piece", "1999-10-20", 8.72, &[(1, "Action"), (2, "Adventure"), (10, "Fantasy")], MediaType::Anime),
];

#[rustfmt::skip]
static MANGA_ITEMS: &[MockItem] = &[
    item(2, "Berserk", "1989-08-25", 9.47, &[(1, "Action"), (2, "Adventure"), (8, "Drama"), (14, "Horror")], MediaType::Manga),
    item(13, "One Piece", "1997-07-22", 9.22, &[(1, "Action"), (2, "Adventure"), (10, "Fantasy")], MediaType::Manga),
    item(656, "Vagabond", "1998-09-03", 9.27, &[(1, "Action"), (2, "Adventure")], MediaType::Manga),
    item(1706, "JoJo no Kimyou na Bouken Part 7: Steel Ball Run", "2004-01-19", 9.31, &[(1, "Action"), (2, "Adventure"), (11, "Mystery")], MediaType::Manga),
];

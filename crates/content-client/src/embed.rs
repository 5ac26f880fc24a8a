//! Embed URL builders for the external player.

use shared::config::PlayerConfig;

#[derive(Debug, Clone)]
pub struct EmbedUrls {
    video_base: String,
    anime_base: String,
}

impl EmbedUrls {
    pub fn new(video_base: &str, anime_base: &str) -> Self {
        Self {
            video_base: video_base.trim_end_matches('/').to_string(),
            anime_base: anime_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(&config.video_embed_base, &config.anime_embed_base)
    }

    pub fn movie_embed_url(&self, id: &str) -> String {
        format!("{}/movie/{}", self.video_base, encode(id))
    }

    pub fn tv_embed_url(&self, id: &str, season: u32, episode: u32) -> String {
        format!("{}/tv/{}/{}/{}", self.video_base, encode(id), season, episode)
    }

    /// `dub` selects the dubbed track, otherwise subtitles
    pub fn anime_embed_url(&self, id: &str, episode: u32, dub: bool) -> String {
        let track = if dub { 1 } else { 0 };
        format!("{}/anime/{}/{}/{}", self.anime_base, encode(id), episode, track)
    }

    pub fn manga_embed_url(&self, id: &str, chapter: u32) -> String {
        format!("{}/manga/{}/{}", self.anime_base, encode(id), chapter)
    }
}

fn encode(raw: &str) -> String {
    urlencoding::encode(raw.trim()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> EmbedUrls {
        EmbedUrls::from_config(&PlayerConfig::default())
    }

    #[test]
    fn test_video_urls() {
        let urls = urls();
        assert_eq!(urls.movie_embed_url("550"), "https://vidsrc.xyz/embed/movie/550");
        assert_eq!(urls.tv_embed_url("1396", 2, 5), "https://vidsrc.xyz/embed/tv/1396/2/5");
    }

    #[test]
    fn test_anime_and_manga_urls() {
        let urls = urls();
        assert_eq!(
            urls.anime_embed_url("5114", 3, true),
            "https://vidsrc.icu/embed/anime/5114/3/1"
        );
        assert_eq!(
            urls.anime_embed_url("5114", 3, false),
            "https://vidsrc.icu/embed/anime/5114/3/0"
        );
        assert_eq!(urls.manga_embed_url("2", 10), "https://vidsrc.icu/embed/manga/2/10");
    }

    #[test]
    fn test_ids_are_encoded() {
        let urls = EmbedUrls::new("https://player.example/embed/", "https://player.example/embed");
        assert_eq!(
            urls.movie_embed_url("tt 01/2"),
            "https://player.example/embed/movie/tt%2001%2F2"
        );
    }
}

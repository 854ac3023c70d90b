use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::config::LastFmConfig;
use crate::spotify::Track;

/// Extra albums requested on top of the grid so failed cover downloads can be replaced.
pub const ALBUM_BUFFER: usize = 50;

#[derive(Error, Debug)]
pub enum LastFmError {
    #[error("Last.fm request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize, Debug)]
struct ImageResponse {
    size: String,
    #[serde(rename = "#text")]
    text: String,
}

#[derive(Deserialize, Debug)]
struct ArtistResponse {
    name: String,
}

#[derive(Deserialize, Debug)]
struct AlbumResponse {
    artist: ArtistResponse,
    #[serde(default)]
    image: Vec<ImageResponse>,
    #[serde(default)]
    playcount: String,
    name: String,
}

#[derive(Deserialize, Debug, Default)]
struct TopAlbums {
    #[serde(default)]
    album: Vec<AlbumResponse>,
}

#[derive(Deserialize, Debug)]
struct TopAlbumsResponse {
    #[serde(default)]
    topalbums: TopAlbums,
}

#[derive(Deserialize, Debug)]
struct TrackResponse {
    artist: ArtistResponse,
    name: String,
}

#[derive(Deserialize, Debug, Default)]
struct TopTracks {
    #[serde(default)]
    track: Vec<TrackResponse>,
}

#[derive(Deserialize, Debug)]
struct TopTracksResponse {
    #[serde(default)]
    toptracks: TopTracks,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoverSize {
    Medium,
    Large,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlbumImages {
    pub small: String,
    pub medium: String,
    pub large: String,
    pub extra_large: String,
}

impl AlbumImages {
    /// `None` when an entry has no URL or an unknown size; such albums have no usable art.
    fn from_response(images: &[ImageResponse]) -> Option<Self> {
        let mut urls = AlbumImages::default();
        for img in images {
            if img.text.is_empty() {
                return None;
            }
            let slot = match img.size.as_str() {
                "small" => &mut urls.small,
                "medium" => &mut urls.medium,
                "large" => &mut urls.large,
                "extralarge" => &mut urls.extra_large,
                _ => return None,
            };
            *slot = img.text.clone();
        }
        Some(urls)
    }

    pub fn url(&self, size: CoverSize) -> &str {
        match size {
            CoverSize::Medium => &self.medium,
            CoverSize::Large => &self.large,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Album {
    pub artist: String,
    pub title: String,
    pub playcount: u64,
    pub images: AlbumImages,
}

pub struct LastFmClient {
    http: reqwest::Client,
    api_root: String,
    api_key: String,
}

impl LastFmClient {
    pub fn new(http: reqwest::Client, config: &LastFmConfig) -> Self {
        Self {
            http,
            api_root: config.api_root.clone(),
            api_key: config.api_key.clone(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T, LastFmError> {
        let response = self
            .http
            .get(&self.api_root)
            .query(&[("method", method), ("api_key", self.api_key.as_str()), ("format", "json")])
            .query(params)
            .send()
            .await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn top_albums(&self, username: &str, limit: usize) -> Result<Vec<Album>, LastFmError> {
        let limit = limit.to_string();
        let response: TopAlbumsResponse = self
            .call(
                "user.gettopalbums",
                &[("user", username), ("period", "overall"), ("limit", limit.as_str())],
            )
            .await?;
        Ok(parse_albums(response))
    }

    pub async fn top_tracks(&self, username: &str, period: &str, limit: u32) -> Result<Vec<Track>, LastFmError> {
        let limit = limit.to_string();
        let response: TopTracksResponse = self
            .call(
                "user.gettoptracks",
                &[("user", username), ("period", period), ("limit", limit.as_str())],
            )
            .await?;

        Ok(response
            .toptracks
            .track
            .into_iter()
            .map(|t| Track {
                artist: t.artist.name,
                title: t.name,
                spotify_uri: String::new(),
            })
            .collect())
    }
}

fn parse_albums(response: TopAlbumsResponse) -> Vec<Album> {
    response
        .topalbums
        .album
        .into_iter()
        .filter_map(|a| {
            let Some(images) = AlbumImages::from_response(&a.image) else {
                debug!("Skipping {} - {}: no album art", a.artist.name, a.name);
                return None;
            };
            Some(Album {
                artist: a.artist.name,
                title: a.name,
                playcount: a.playcount.parse().unwrap_or(0),
                images,
            })
        })
        .collect()
}

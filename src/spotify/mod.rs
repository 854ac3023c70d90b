pub mod auth;
pub mod data;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token bundle a logged in user sends along with every authenticated request.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AuthDetails {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub time_obtained: i64,
}

/// A track on its way from Last.fm to a Spotify playlist. Field names match
/// what the frontend reads back from `tracksNotFound`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Track {
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "SpotifyURI")]
    pub spotify_uri: String,
}

#[derive(Error, Debug)]
pub enum SpotifyError {
    #[error("invalid Spotify url: {0}")]
    Url(#[from] url::ParseError),

    #[error("token request failed: {0}")]
    Token(String),

    #[error("Spotify request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected Spotify response: {0}")]
    Unexpected(String),
}

pub struct SpotifyClient {
    pub http: reqwest::Client,
    pub api_root: String,
    pub token: String,
}

impl SpotifyClient {
    pub fn new(http: reqwest::Client, api_root: &str, token: String) -> Self {
        Self {
            http,
            api_root: api_root.trim_end_matches('/').to_string(),
            token,
        }
    }
}

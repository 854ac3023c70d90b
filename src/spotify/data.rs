use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

use crate::spotify::{SpotifyClient, SpotifyError, Track};

/// Spotify caps `POST /playlists/{id}/tracks` at this many URIs.
pub const ADD_TRACKS_BATCH: usize = 100;
pub const MAX_RATE_LIMIT_RETRIES: u32 = 5;

pub const PLAYLIST_NAME: &str = "Lastools Playlist";
pub const PLAYLIST_DESCRIPTION: &str = "This playlist was generated automatically with lastools";

#[derive(Deserialize, Debug)]
pub struct SpotifyUser {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct Playlist {
    pub id: String,
}

#[derive(Serialize)]
struct CreatePlaylistRequest<'a> {
    name: &'a str,
    description: &'a str,
}

async fn send_request_with_rate_limit(request: reqwest::RequestBuilder) -> Result<reqwest::Response, SpotifyError> {
    let mut attempts = 0;
    loop {
        let attempt = request
            .try_clone()
            .ok_or_else(|| SpotifyError::Unexpected("request body cannot be retried".to_string()))?;
        let response = attempt.send().await?;

        if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS || attempts >= MAX_RATE_LIMIT_RETRIES {
            return Ok(response);
        }
        attempts += 1;

        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1);
        warn!("Rate limited by Spotify. Retrying after {} seconds...", retry_after_secs);
        sleep(Duration::from_secs(retry_after_secs)).await;
    }
}

/// First search hit for `artist` and `title`, `None` when nothing matches.
pub async fn search_track_uri(client: &SpotifyClient, artist: &str, title: &str) -> Result<Option<String>, SpotifyError> {
    let url = format!("{}/search", client.api_root);
    let query = format!("artist:{} track:{}", artist, title);
    let request = client
        .http
        .get(&url)
        .bearer_auth(&client.token)
        .query(&[("type", "track"), ("limit", "10"), ("q", query.as_str())]);

    let response = send_request_with_rate_limit(request).await?.error_for_status()?;
    let response_json = response.json::<Value>().await?;

    let uri = response_json["tracks"]["items"]
        .get(0)
        .and_then(|item| item["uri"].as_str())
        .map(str::to_string);
    debug!("Search for {} - {}: {:?}", artist, title, uri);
    Ok(uri)
}

/// Fills in `spotify_uri` for every track. A failed search leaves that track unmatched.
pub async fn resolve_track_uris(client: &SpotifyClient, tracks: &mut [Track]) {
    for track in tracks.iter_mut() {
        let result = search_track_uri(client, &track.artist, &track.title).await;
        match result {
            Ok(Some(uri)) => track.spotify_uri = uri,
            Ok(None) => debug!("No Spotify match for {} - {}", track.artist, track.title),
            Err(e) => warn!("Search failed for {} - {}: {}", track.artist, track.title, e),
        }
    }
}

pub async fn get_current_user(client: &SpotifyClient) -> Result<SpotifyUser, SpotifyError> {
    let url = format!("{}/me", client.api_root);
    let request = client.http.get(url).bearer_auth(&client.token);

    let response = send_request_with_rate_limit(request).await?.error_for_status()?;
    Ok(response.json::<SpotifyUser>().await?)
}

pub async fn create_playlist(client: &SpotifyClient, user_id: &str) -> Result<Playlist, SpotifyError> {
    let url = format!("{}/users/{}/playlists", client.api_root, user_id);
    let request = client
        .http
        .post(&url)
        .bearer_auth(&client.token)
        .json(&CreatePlaylistRequest {
            name: PLAYLIST_NAME,
            description: PLAYLIST_DESCRIPTION,
        });

    let response = send_request_with_rate_limit(request).await?.error_for_status()?;
    Ok(response.json::<Playlist>().await?)
}

/// Adds every matched track and returns the ones without a Spotify URI.
pub async fn add_tracks_to_playlist(client: &SpotifyClient, playlist: &Playlist, tracks: Vec<Track>) -> Result<Vec<Track>, SpotifyError> {
    let (found, not_found): (Vec<Track>, Vec<Track>) = tracks.into_iter().partition(|t| !t.spotify_uri.is_empty());
    let track_uris: Vec<String> = found.into_iter().map(|t| t.spotify_uri).collect();

    if track_uris.is_empty() {
        warn!("No tracks matched on Spotify, playlist {} left empty", playlist.id);
        return Ok(not_found);
    }

    let url = format!("{}/playlists/{}/tracks", client.api_root, playlist.id);
    for batch in track_uris.chunks(ADD_TRACKS_BATCH) {
        let request = client
            .http
            .post(&url)
            .bearer_auth(&client.token)
            .json(&serde_json::json!({ "uris": batch }));

        let response = send_request_with_rate_limit(request).await?;
        if !response.status().is_success() {
            return Err(SpotifyError::Unexpected(format!(
                "adding tracks to playlist returned {}",
                response.status()
            )));
        }
    }

    Ok(not_found)
}

use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::lastfm::LastFmClient;
use crate::spotify::auth::client_credentials_token;
use crate::spotify::data::{add_tracks_to_playlist, create_playlist, get_current_user, resolve_track_uris};
use crate::spotify::{AuthDetails, SpotifyClient, Track};
use oauth2::basic::BasicClient;

/// Import parameters of `/port_toptracks`. The token bundle travels in the
/// same body and is picked up by the auth gate.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortRequest {
    pub last_fm_username: String,
    #[serde(deserialize_with = "string_or_number")]
    pub song_number: String,
    pub time_period: String,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortResponse {
    pub tracks_not_found: Vec<Track>,
}

/// Select values arrive as strings, hand-written clients tend to send numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

impl PortRequest {
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(body).map_err(|_| AppError::BadRequest("Malformed JSON".to_string()))
    }

    fn limit(&self) -> Result<u32, AppError> {
        self.song_number
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::BadRequest("Malformed JSON".to_string()))
    }
}

/// Copies a user's Last.fm top tracks into a new Spotify playlist and reports
/// the tracks Spotify had no match for.
pub async fn port_top_tracks(
    http: &reqwest::Client,
    lastfm: &LastFmClient,
    oauth: &BasicClient,
    spotify_api_root: &str,
    auth: &AuthDetails,
    request: &PortRequest,
) -> Result<PortResponse, AppError> {
    let limit = request.limit()?;

    let mut tracks = lastfm
        .top_tracks(&request.last_fm_username, &request.time_period, limit)
        .await
        .map_err(|e| {
            warn!("Fetching top tracks for {} failed: {}", request.last_fm_username, e);
            AppError::Internal("Could not get top tracks data from LastFm".to_string())
        })?;

    if tracks.is_empty() {
        return Err(AppError::BadRequest(
            "No songs found on Last.fm. Check the username".to_string(),
        ));
    }

    let app_token = client_credentials_token(oauth).await.map_err(|e| {
        warn!("Client credentials grant failed: {}", e);
        AppError::Internal("Could not get Spotify URIs for tracks".to_string())
    })?;
    let search_client = SpotifyClient::new(http.clone(), spotify_api_root, app_token);
    resolve_track_uris(&search_client, &mut tracks).await;

    let user_client = SpotifyClient::new(http.clone(), spotify_api_root, auth.access_token.clone());
    let user = get_current_user(&user_client).await.map_err(|e| {
        warn!("Fetching Spotify user failed: {}", e);
        AppError::Internal("Could not get Spotify user info".to_string())
    })?;

    let playlist = create_playlist(&user_client, &user.id).await.map_err(|e| {
        warn!("Creating playlist for {} failed: {}", user.id, e);
        AppError::Internal("Could not create playlist on spotify".to_string())
    })?;

    let requested = tracks.len();
    let tracks_not_found = add_tracks_to_playlist(&user_client, &playlist, tracks)
        .await
        .map_err(|e| {
            warn!("Adding tracks to playlist {} failed: {}", playlist.id, e);
            AppError::Internal("Could not add the tracks to the new playlist on spotify".to_string())
        })?;

    info!(
        "Ported {}/{} top tracks of {} into playlist {}",
        requested - tracks_not_found.len(),
        requested,
        request.last_fm_username,
        playlist.id
    );
    Ok(PortResponse { tracks_not_found })
}

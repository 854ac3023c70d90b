//! In-process stand-ins for Last.fm and Spotify, plus helpers for running the
//! lastools router on an ephemeral port.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{AUTHORIZATION, RETRY_AFTER},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::utils::epoch_millis;

pub const USER_TOKEN: &str = "user-token";
pub const REFRESHED_TOKEN: &str = "refreshed-token";
pub const APP_TOKEN: &str = "app-token";
pub const UNKNOWN_USER: &str = "nobody";
/// Last.fm user with more top tracks than fit in one add-tracks call.
pub const MANY_TRACKS_USER: &str = "hoarder";
pub const MANY_TRACKS: usize = 150;
pub const COVER_SIDE: u32 = 6;

const COVER_COLORS: [[u8; 3]; 4] = [[200, 30, 30], [30, 200, 30], [30, 30, 200], [200, 200, 30]];
const TOP_TRACKS: [(&str, &str); 5] = [
    ("Artist A", "Song One"),
    ("Artist B", "Missing One"),
    ("Artist C", "Song Two"),
    ("Artist D", "Missing Two"),
    ("Artist E", "Song Three"),
];

/// Upstream calls that can be switched to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Refresh-token grants are rejected with `invalid_grant`.
    Refresh,
    Me,
    CreatePlaylist,
    AddTracks,
    /// Every search answers 429 with `Retry-After: 0`.
    RateLimitedSearch,
    /// Covers with an odd id answer 404.
    MissingCovers,
}

#[derive(Clone, Debug, Default)]
pub struct Recorded {
    pub me_tokens: Vec<String>,
    pub playlists_created: Vec<String>,
    pub added_uris: Vec<String>,
    /// Number of URIs in each add-tracks call.
    pub add_batches: Vec<usize>,
    pub searches: usize,
}

#[derive(Clone)]
struct Upstream {
    addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

impl Upstream {
    fn failing(&self, fault: Fault) -> bool {
        self.faults.lock().unwrap().contains(&fault)
    }
}

pub struct FakeUpstream {
    pub addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

impl FakeUpstream {
    pub async fn spawn() -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let faults = Arc::new(Mutex::new(HashSet::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/lastfm", get(lastfm))
            .route("/cover/:id", get(cover))
            .route("/token", post(token))
            .route("/spotify/search", get(search))
            .route("/spotify/me", get(me))
            .route("/spotify/users/:user/playlists", post(create_playlist))
            .route("/spotify/playlists/:id/tracks", post(add_tracks))
            .with_state(Upstream {
                addr,
                recorded: recorded.clone(),
                faults: faults.clone(),
            });
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self { addr, recorded, faults }
    }

    pub fn fail(&self, fault: Fault) {
        self.faults.lock().unwrap().insert(fault);
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }
}

/// Serves `app` on 127.0.0.1 and returns its base URL.
pub async fn spawn_app(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

/// A local URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

pub fn config(upstream: &FakeUpstream) -> Config {
    let mut config = Config::default();
    config.lastfm.api_root = upstream.url("/lastfm");
    config.spotify.token_url = upstream.url("/token");
    config.spotify.api_root = upstream.url("/spotify");
    config
}

pub fn fresh_auth_json() -> Value {
    json!({
        "access_token": USER_TOKEN,
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-me",
        "time_obtained": epoch_millis(),
    })
}

async fn lastfm(State(upstream): State<Upstream>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.get("user").map(String::as_str) == Some(UNKNOWN_USER) {
        return Json(json!({"error": 6, "message": "User not found"}));
    }
    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(50);

    match params.get("method").map(String::as_str) {
        Some("user.gettopalbums") => {
            let albums: Vec<Value> = (0..COVER_COLORS.len())
                .map(|i| {
                    let url = format!("http://{}/cover/{}", upstream.addr, i);
                    json!({
                        "artist": {"name": format!("Artist {}", i)},
                        "name": format!("Album {}", i),
                        "playcount": "10",
                        "image": [
                            {"size": "small", "#text": url},
                            {"size": "medium", "#text": url},
                            {"size": "large", "#text": url},
                            {"size": "extralarge", "#text": url},
                        ],
                    })
                })
                .take(limit)
                .collect();
            Json(json!({"topalbums": {"album": albums}}))
        }
        Some("user.gettoptracks") => {
            let many = params.get("user").map(String::as_str) == Some(MANY_TRACKS_USER);
            let listing: Vec<(String, String)> = if many {
                (0..MANY_TRACKS)
                    .map(|i| (format!("Artist {}", i), format!("Song {}", i)))
                    .collect()
            } else {
                TOP_TRACKS.iter().map(|(a, t)| (a.to_string(), t.to_string())).collect()
            };
            let tracks: Vec<Value> = listing
                .into_iter()
                .take(limit)
                .map(|(artist, name)| json!({"artist": {"name": artist}, "name": name}))
                .collect();
            Json(json!({"toptracks": {"track": tracks}}))
        }
        _ => Json(json!({"error": 3, "message": "Invalid method"})),
    }
}

async fn cover(State(upstream): State<Upstream>, Path(id): Path<usize>) -> Response {
    if upstream.failing(Fault::MissingCovers) && id % 2 == 1 {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(color) = COVER_COLORS.get(id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let img = RgbImage::from_pixel(COVER_SIDE, COVER_SIDE, Rgb(*color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    ([("content-type", "image/png")], out.into_inner()).into_response()
}

async fn token(State(upstream): State<Upstream>, Form(form): Form<HashMap<String, String>>) -> Response {
    let grant = |access_token: &str, refresh_token: Option<&str>| {
        let mut body = json!({"access_token": access_token, "token_type": "bearer", "expires_in": 3600});
        if let Some(refresh_token) = refresh_token {
            body["refresh_token"] = json!(refresh_token);
        }
        Json(body).into_response()
    };

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some("bad") => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid authorization code"})),
        )
            .into_response(),
        Some("authorization_code") => grant(USER_TOKEN, Some("refresh-me")),
        Some("client_credentials") => grant(APP_TOKEN, None),
        Some("refresh_token") if upstream.failing(Fault::Refresh) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Refresh token revoked"})),
        )
            .into_response(),
        Some("refresh_token") => grant(REFRESHED_TOKEN, None),
        _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "unsupported_grant_type"}))).into_response(),
    }
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

async fn search(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    upstream.recorded.lock().unwrap().searches += 1;
    if bearer(&headers) != APP_TOKEN {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if upstream.failing(Fault::RateLimitedSearch) {
        return (StatusCode::TOO_MANY_REQUESTS, [(RETRY_AFTER, "0")]).into_response();
    }
    let q = params.get("q").cloned().unwrap_or_default();
    if q.contains("Missing") {
        return Json(json!({"tracks": {"items": []}})).into_response();
    }
    let id = q.replace(' ', "-");
    Json(json!({"tracks": {"items": [{"uri": format!("spotify:track:{}", id)}]}})).into_response()
}

async fn me(State(upstream): State<Upstream>, headers: HeaderMap) -> Response {
    upstream.recorded.lock().unwrap().me_tokens.push(bearer(&headers));
    if upstream.failing(Fault::Me) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({"id": "user-1", "uri": "spotify:user:user-1"})).into_response()
}

async fn create_playlist(State(upstream): State<Upstream>, Path(user): Path<String>) -> Response {
    if upstream.failing(Fault::CreatePlaylist) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    upstream.recorded.lock().unwrap().playlists_created.push(user);
    (
        StatusCode::CREATED,
        Json(json!({"id": "playlist-1", "uri": "spotify:playlist:playlist-1"})),
    )
        .into_response()
}

async fn add_tracks(State(upstream): State<Upstream>, Path(_id): Path<String>, Json(body): Json<Value>) -> Response {
    let uris = body["uris"]
        .as_array()
        .map(|a| a.iter().filter_map(|u| u.as_str().map(str::to_string)).collect::<Vec<_>>())
        .unwrap_or_default();
    if upstream.failing(Fault::AddTracks) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let mut recorded = upstream.recorded.lock().unwrap();
    recorded.add_batches.push(uris.len());
    recorded.added_uris.extend(uris);
    (StatusCode::CREATED, Json(json!({"snapshot_id": "snapshot"}))).into_response()
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{
        header::{CONTENT_TYPE, LOCATION},
        StatusCode,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
    Extension, Json, Router,
};
use log::{error, info, warn};
use oauth2::basic::BasicClient;
use serde::Deserialize;
use tokio::{net::TcpListener, signal};
use tower_http::services::{ServeDir, ServeFile};

use crate::chart::{self, ChartQuery, ChartRequest};
use crate::config::Config;
use crate::error::AppError;
use crate::lastfm::LastFmClient;
use crate::middleware::spotify_auth_required;
use crate::playlist::{port_top_tracks, PortRequest, PortResponse};
use crate::spotify::auth::{exchange_code, login_url, oauth_client, TokenExchange};
use crate::spotify::{AuthDetails, SpotifyError};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub lastfm: LastFmClient,
    pub oauth: BasicClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, SpotifyError> {
        let http = reqwest::Client::builder().timeout(UPSTREAM_TIMEOUT).build()?;
        let lastfm = LastFmClient::new(http.clone(), &config.lastfm);
        let oauth = oauth_client(&config.spotify)?;

        Ok(Arc::new(Self {
            config,
            http,
            lastfm,
            oauth,
        }))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let web_root = PathBuf::from(&state.config.server.web_root);
    let page = |name: &str| get_service(ServeFile::new(web_root.join("template").join(name)));

    Router::new()
        .route("/", page("index.html"))
        .route("/chart", page("chart.html"))
        .route("/playlist", page("playlist.html"))
        .nest_service("/static", ServeDir::new(web_root.join("static")))
        .route("/login", get(login_handler))
        .route("/get_access_token", get(get_access_token_handler))
        .route("/generate_chart", get(generate_chart_handler))
        .route(
            "/port_toptracks",
            post(port_toptracks_handler).route_layer(from_fn_with_state(state.clone(), spotify_auth_required)),
        )
        .with_state(state)
}

async fn login_handler(State(state): State<Arc<AppState>>) -> Response {
    let url = login_url(&state.oauth, &state.config.spotify);
    (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
}

#[derive(Deserialize)]
struct CodeQuery {
    code: Option<String>,
}

async fn get_access_token_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CodeQuery>,
) -> Result<Json<TokenExchange>, AppError> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Code is missing".to_string()))?;

    let exchange = exchange_code(&state.oauth, &code).await.map_err(|e| {
        warn!("Authorization code exchange failed: {}", e);
        AppError::Internal("Error sending code to Spotify Token Endpoint".to_string())
    })?;

    if let TokenExchange::Rejected { error } = &exchange {
        info!("Spotify rejected authorization code: {}", error);
    }
    Ok(Json(exchange))
}

async fn generate_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartQuery>,
) -> Result<Response, AppError> {
    let request = ChartRequest::try_from(query)?;
    info!("Chart requested: {} {}x{}", request.username, request.cols, request.rows);

    if let Some(path) = &state.config.server.request_log {
        chart::log_request(path, &request).await;
    }

    let jpeg = chart::generate_chart(&state.http, &state.lastfm, &request).await?;
    Ok(([(CONTENT_TYPE, "image/jpeg")], jpeg).into_response())
}

async fn port_toptracks_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthDetails>,
    body: Bytes,
) -> Result<Json<PortResponse>, AppError> {
    let request = PortRequest::from_body(&body)?;
    info!(
        "Porting {} {} top tracks of {}",
        request.song_number, request.time_period, request.last_fm_username
    );

    let response = port_top_tracks(
        &state.http,
        &state.lastfm,
        &state.oauth,
        &state.config.spotify.api_root,
        &auth,
        &request,
    )
    .await?;
    Ok(Json(response))
}

pub async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.server.port;
    let state = AppState::new(config)?;
    let app = router(state);

    let address = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

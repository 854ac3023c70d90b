use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use log::{debug, warn};

use crate::error::AppError;
use crate::spotify::auth::refresh_auth;
use crate::spotify::AuthDetails;
use crate::utils::{epoch_millis, is_token_expired};
use crate::web::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Requires a Spotify token bundle in the JSON body. Expired tokens are
/// refreshed; the bundle is handed to the route as an `Extension<AuthDetails>`
/// and the body is passed on untouched.
pub async fn spotify_auth_required(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            debug!("Could not read request body: {}", e);
            AppError::PayloadTooLarge("Request body is too large.".to_string())
        })?;

    let mut auth = serde_json::from_slice::<AuthDetails>(&bytes)
        .ok()
        .filter(|auth| !auth.access_token.is_empty())
        .ok_or_else(|| AppError::BadRequest("Request does not contain Spotify auth details.".to_string()))?;

    if is_token_expired(auth.time_obtained, auth.expires_in, epoch_millis()) {
        debug!("Spotify token expired, refreshing");
        refresh_auth(&state.oauth, &mut auth).await.map_err(|e| {
            warn!("Refreshing Spotify token failed: {}", e);
            AppError::Internal("Could not refresh expired spotify auth details".to_string())
        })?;
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

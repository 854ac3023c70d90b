use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SpotifyConfig;
use crate::spotify::{AuthDetails, SpotifyError};
use crate::utils::epoch_millis;

const DEFAULT_EXPIRES_IN: i64 = 3600;

/// What `/get_access_token` hands back to the frontend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum TokenExchange {
    Rejected {
        error: String,
    },
    Granted {
        access_token: String,
        token_type: String,
        expires_in: i64,
        refresh_token: String,
    },
}

pub fn oauth_client(config: &SpotifyConfig) -> Result<BasicClient, SpotifyError> {
    let client = BasicClient::new(
        ClientId::new(config.client_id.clone()),
        Some(ClientSecret::new(config.client_secret.clone())),
        AuthUrl::new(config.authorize_url.clone())?,
        Some(TokenUrl::new(config.token_url.clone())?),
    )
    .set_redirect_uri(RedirectUrl::new(config.redirect_uri.clone())?);
    Ok(client)
}

/// Spotify authorize URL the `/login` route redirects to.
pub fn login_url(client: &BasicClient, config: &SpotifyConfig) -> Url {
    let (auth_url, _csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(config.scopes.iter().cloned().map(Scope::new))
        .url();
    auth_url
}

fn expires_in_secs(token: &BasicTokenResponse) -> i64 {
    token
        .expires_in()
        .map(|d| d.as_secs() as i64)
        .unwrap_or(DEFAULT_EXPIRES_IN)
}

pub async fn exchange_code(client: &BasicClient, code: &str) -> Result<TokenExchange, SpotifyError> {
    let result = client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .request_async(async_http_client)
        .await;

    match result {
        Ok(token) => Ok(TokenExchange::Granted {
            access_token: token.access_token().secret().to_string(),
            token_type: token.token_type().as_ref().to_string(),
            expires_in: expires_in_secs(&token),
            refresh_token: token
                .refresh_token()
                .map(|t| t.secret().to_string())
                .unwrap_or_default(),
        }),
        Err(RequestTokenError::ServerResponse(response)) => Ok(TokenExchange::Rejected {
            error: response.error().to_string(),
        }),
        Err(e) => Err(SpotifyError::Token(e.to_string())),
    }
}

/// App-level access token used for public catalogue searches.
pub async fn client_credentials_token(client: &BasicClient) -> Result<String, SpotifyError> {
    let token = client
        .exchange_client_credentials()
        .request_async(async_http_client)
        .await
        .map_err(|e| SpotifyError::Token(e.to_string()))?;
    Ok(token.access_token().secret().to_string())
}

pub async fn refresh_auth(client: &BasicClient, auth: &mut AuthDetails) -> Result<(), SpotifyError> {
    let token = client
        .exchange_refresh_token(&RefreshToken::new(auth.refresh_token.clone()))
        .request_async(async_http_client)
        .await
        .map_err(|e| SpotifyError::Token(e.to_string()))?;

    auth.access_token = token.access_token().secret().to_string();
    auth.token_type = token.token_type().as_ref().to_string();
    auth.expires_in = expires_in_secs(&token);
    if let Some(refresh_token) = token.refresh_token() {
        auth.refresh_token = refresh_token.secret().to_string();
    }
    auth.time_obtained = epoch_millis();
    Ok(())
}

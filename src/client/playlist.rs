use log::{debug, info, warn};
use serde::Serialize;
use url::{form_urlencoded, Url};

use crate::client::storage::LocalStorage;
use crate::client::{ClientError, Panel, Ui, INTERNAL_ERROR_MESSAGE};
use crate::playlist::PortResponse;
use crate::spotify::auth::TokenExchange;
use crate::spotify::AuthDetails;
use crate::utils::epoch_millis;

pub const LOGIN_FAILED_MESSAGE: &str = "Failed to log into Spotify.";
pub const LOGIN_SERVER_ERROR_MESSAGE: &str = "There was a server error logging you into Spotify.";
const PLAYLIST_PAGE: &str = "/playlist";

/// The three inputs of the selection form, as entered.
#[derive(Clone, Debug, Default)]
pub struct PortForm {
    pub last_fm_username: String,
    pub song_number: String,
    pub time_period: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PortSubmission<'a> {
    last_fm_username: &'a str,
    song_number: &'a str,
    time_period: &'a str,
    #[serde(flatten)]
    auth: AuthDetails,
}

#[derive(Debug, PartialEq)]
pub enum LoadOutcome {
    LoggedIn,
    LoginRequired,
}

#[derive(Debug, PartialEq)]
pub enum SubmitOutcome {
    /// A required field was empty, nothing was sent.
    Skipped,
    Imported { imported: i64, requested: i64 },
    Rejected(String),
}

pub struct PlaylistController<U: Ui> {
    http: reqwest::Client,
    server: Url,
    storage: LocalStorage,
    pub ui: U,
}

impl<U: Ui> PlaylistController<U> {
    pub fn new(http: reqwest::Client, server_url: &str, storage: LocalStorage, ui: U) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            server: Url::parse(server_url)?,
            storage,
            ui,
        })
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Page load. `location` is the page URL or just its query string, as
    /// Spotify redirected back to it.
    pub async fn load(&mut self, location: &str) -> Result<LoadOutcome, ClientError> {
        let query = location.split_once('?').map(|(_, q)| q).unwrap_or(location);
        let mut code = None;
        let mut error = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" if !value.is_empty() => code = Some(value.into_owned()),
                "error" if !value.is_empty() => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(code) = code {
            self.exchange_code(&code).await?;
        }
        if let Some(error) = error {
            warn!("Spotify login failed: {}", error);
            self.ui.alert(LOGIN_FAILED_MESSAGE);
        }

        if self.storage.is_logged_in() {
            self.ui.set_visible(Panel::PortSelection, true);
            Ok(LoadOutcome::LoggedIn)
        } else {
            self.ui.set_visible(Panel::SpotifyLogin, true);
            Ok(LoadOutcome::LoginRequired)
        }
    }

    async fn exchange_code(&mut self, code: &str) -> Result<(), ClientError> {
        let mut url = self.server.join("/get_access_token")?;
        url.query_pairs_mut().append_pair("code", code);

        let exchange = match self.fetch_token(url).await {
            Ok(exchange) => exchange,
            Err(e) => {
                self.ui.toast(LOGIN_SERVER_ERROR_MESSAGE);
                return Err(e.into());
            }
        };

        match exchange {
            TokenExchange::Rejected { error } => {
                info!("Authorization code rejected: {}", error);
                self.ui.navigate(PLAYLIST_PAGE);
            }
            TokenExchange::Granted {
                access_token,
                token_type,
                expires_in,
                refresh_token,
            } => {
                self.storage.store_tokens(&AuthDetails {
                    access_token,
                    token_type,
                    expires_in,
                    refresh_token,
                    time_obtained: epoch_millis(),
                })?;
                self.ui.set_visible(Panel::SpotifyLogin, false);
            }
        }
        Ok(())
    }

    async fn fetch_token(&self, url: Url) -> Result<TokenExchange, reqwest::Error> {
        self.http.get(url).send().await?.json::<TokenExchange>().await
    }

    fn loading(&mut self) {
        self.ui.set_visible(Panel::PortSelection, false);
        self.ui.set_visible(Panel::PortLoading, true);
    }

    fn finished_loading(&mut self) {
        self.ui.set_visible(Panel::PortSelection, true);
        self.ui.set_visible(Panel::PortLoading, false);
    }

    pub async fn submit(&mut self, form: &PortForm) -> Result<SubmitOutcome, ClientError> {
        if form.last_fm_username.is_empty() || form.song_number.is_empty() || form.time_period.is_empty() {
            return Ok(SubmitOutcome::Skipped);
        }
        let Ok(requested) = form.song_number.trim().parse::<i64>() else {
            debug!("Ignoring non-numeric song count {:?}", form.song_number);
            return Ok(SubmitOutcome::Skipped);
        };

        let auth = self.storage.auth_details().ok_or(ClientError::NotLoggedIn)?;
        let submission = PortSubmission {
            last_fm_username: &form.last_fm_username,
            song_number: &form.song_number,
            time_period: &form.time_period,
            auth,
        };
        let url = self.server.join("/port_toptracks")?;

        self.loading();
        let result = self.post(url, &submission).await;
        self.finished_loading();

        match result {
            Ok(Ok(response)) => {
                let imported = requested - response.tracks_not_found.len() as i64;
                self.ui.toast(&format!(
                    "{}/{} songs were successfully imported.",
                    imported, requested
                ));
                Ok(SubmitOutcome::Imported { imported, requested })
            }
            Ok(Err(message)) => {
                self.ui.toast(&message);
                Ok(SubmitOutcome::Rejected(message))
            }
            Err(e) => {
                warn!("Porting top tracks failed: {}", e);
                self.ui.toast(INTERNAL_ERROR_MESSAGE);
                Err(e.into())
            }
        }
    }

    /// Outer error: the request failed. Inner error: the server's message.
    async fn post(&self, url: Url, submission: &PortSubmission<'_>) -> Result<Result<PortResponse, String>, reqwest::Error> {
        let response = self.http.post(url).json(submission).send().await?;
        if response.status() == reqwest::StatusCode::OK {
            Ok(Ok(response.json::<PortResponse>().await?))
        } else {
            Ok(Err(response.text().await?))
        }
    }
}

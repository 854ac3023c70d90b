use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use toml;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/playlist";

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub lastfm: LastFmConfig,
    pub spotify: SpotifyConfig,
    pub client: ClientConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub web_root: String,
    /// Every chart request is appended here when set.
    #[serde(default)]
    pub request_log: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct LastFmConfig {
    pub api_key: String,
    pub api_root: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_root: String,
    pub scopes: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub token_store: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                port: DEFAULT_PORT,
                web_root: "web".to_string(),
                request_log: None,
            },
            lastfm: LastFmConfig {
                api_key: "your_lastfm_api_key".to_string(),
                api_root: "https://ws.audioscrobbler.com/2.0/".to_string(),
            },
            spotify: SpotifyConfig {
                client_id: "your_spotify_client_id".to_string(),
                client_secret: "your_spotify_client_secret".to_string(),
                redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
                authorize_url: "https://accounts.spotify.com/authorize".to_string(),
                token_url: "https://accounts.spotify.com/api/token".to_string(),
                api_root: "https://api.spotify.com/v1".to_string(),
                scopes: [
                    "user-follow-read",
                    "user-read-recently-played",
                    "playlist-read-private",
                    "user-top-read",
                    "user-library-read",
                    "user-library-modify",
                    "playlist-modify-private",
                    "playlist-modify-public",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
            client: ClientConfig {
                server_url: "http://localhost:8080".to_string(),
                token_store: "spotify_tokens.json".to_string(),
            },
        }
    }
}

pub fn load_config(config_path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    if !Path::new(config_path).exists() {
        let toml_string = toml::to_string_pretty(&Config::default())?;

        let mut file = fs::File::create(config_path)?;
        file.write_all(toml_string.as_bytes())?;

        return Err(format!(
            "Configuration file not found. A default '{}' has been created. Please update it with your credentials.",
            config_path
        )
        .into());
    }

    let config_str = fs::read_to_string(config_path)?;
    let mut config: Config = toml::from_str(&config_str)?;
    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    Ok(config)
}

/// `PORT` and `SPOTIFY_REDIRECT_URL` win over the file; empty values are ignored.
fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(redirect) = lookup("SPOTIFY_REDIRECT_URL").filter(|v| !v.is_empty()) {
        config.spotify.redirect_uri = redirect;
    }
    if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
        config.server.port = port
            .parse()
            .map_err(|e| format!("Invalid PORT value '{}': {}", port, e))?;
    }
    Ok(())
}

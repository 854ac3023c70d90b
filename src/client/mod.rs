//! Page controllers for the chart and playlist pages.
//!
//! Each controller turns a user action into at most one request against the
//! lastools server and reports back through a [`Ui`].

pub mod chart;
pub mod playlist;
pub mod storage;

use std::path::PathBuf;

use log::{debug, error};
use thiserror::Error;

use crate::utils::epoch_millis;

pub const INTERNAL_ERROR_MESSAGE: &str = "There was an internal server error.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("User is not logged in")]
    NotLoggedIn,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("local storage: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Panel {
    GenerateButton,
    Loader,
    SpotifyLogin,
    PortSelection,
    PortLoading,
}

pub trait Ui {
    /// Transient notification.
    fn toast(&mut self, message: &str);
    /// Blocking notification.
    fn alert(&mut self, message: &str);
    fn open_image(&mut self, image: &[u8]);
    fn set_visible(&mut self, panel: Panel, visible: bool);
    fn navigate(&mut self, path: &str);
}

/// Prints notifications and opens charts in the system image viewer.
pub struct TerminalUi {
    server_url: String,
}

impl TerminalUi {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    fn save_image(image: &[u8]) -> std::io::Result<PathBuf> {
        let path = std::env::temp_dir().join(format!("lastools-chart-{}.jpg", epoch_millis()));
        std::fs::write(&path, image)?;
        open::that(&path)?;
        Ok(path)
    }
}

impl Ui for TerminalUi {
    fn toast(&mut self, message: &str) {
        println!("{}", message);
    }

    fn alert(&mut self, message: &str) {
        eprintln!("!! {}", message);
    }

    fn open_image(&mut self, image: &[u8]) {
        match Self::save_image(image) {
            Ok(path) => println!("Chart saved to {}", path.display()),
            Err(e) => error!("Could not open chart: {}", e),
        }
    }

    fn set_visible(&mut self, panel: Panel, visible: bool) {
        debug!("{:?} {}", panel, if visible { "shown" } else { "hidden" });
    }

    fn navigate(&mut self, path: &str) {
        println!("Continue at {}{}", self.server_url, path);
    }
}

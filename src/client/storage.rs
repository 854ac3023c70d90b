use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::spotify::AuthDetails;

pub const ACCESS_TOKEN: &str = "access_token";
pub const TOKEN_TYPE: &str = "token_type";
pub const EXPIRES_IN: &str = "expires_in";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const TIME_OBTAINED: &str = "time_obtained";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("corrupt store: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key/value store persisted as a JSON object, the CLI's local storage.
#[derive(Debug)]
pub struct LocalStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl LocalStorage {
    /// A missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set<V: ToString>(&mut self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn save(&self) -> Result<(), StorageError> {
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        debug!("Saved {} entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    pub fn store_tokens(&mut self, auth: &AuthDetails) -> Result<(), StorageError> {
        self.set(ACCESS_TOKEN, &auth.access_token);
        self.set(TOKEN_TYPE, &auth.token_type);
        self.set(EXPIRES_IN, auth.expires_in);
        self.set(REFRESH_TOKEN, &auth.refresh_token);
        self.set(TIME_OBTAINED, auth.time_obtained);
        self.save()
    }

    pub fn is_logged_in(&self) -> bool {
        self.get(ACCESS_TOKEN).is_some()
    }

    /// The stored bundle, `None` when no access token was ever stored.
    /// Unparsable numbers read back as zero.
    pub fn auth_details(&self) -> Option<AuthDetails> {
        let text = |key: &str| self.get(key).unwrap_or_default().to_string();
        let number = |key: &str| self.get(key).and_then(|v| v.parse().ok()).unwrap_or(0);

        Some(AuthDetails {
            access_token: self.get(ACCESS_TOKEN)?.to_string(),
            token_type: text(TOKEN_TYPE),
            expires_in: number(EXPIRES_IN),
            refresh_token: text(REFRESH_TOKEN),
            time_obtained: number(TIME_OBTAINED),
        })
    }
}

/// Store path in the temp dir, removed again when dropped.
#[cfg(test)]
pub struct TempStore(PathBuf);

#[cfg(test)]
impl TempStore {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("lastools-{}-{}.json", name, std::process::id()));
        let _ = fs::remove_file(&path);
        TempStore(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
impl Drop for TempStore {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

//! Runtime configuration, read from the environment (optionally seeded from a `.env` file).

use crate::oauth::OAuthIdentity;
use eyre::Context;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:5001";
const DEFAULT_INSERT_DELAY_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// One backing Google project: a search key with its own quota, plus an OAuth client.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub api_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl Project {
    pub fn identity(&self) -> OAuthIdentity {
        OAuthIdentity {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
        }
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for SpotifyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Ordered; rotation walks them round-robin starting at index 0.
    pub projects: Vec<Project>,
    /// OAuth client used before any rotation has happened.
    pub default_identity: OAuthIdentity,
    pub spotify: SpotifyCredentials,
    pub server_address: SocketAddr,
    pub credentials_dir: PathBuf,
    pub insert_delay: Duration,
    pub request_timeout: Duration,
    pub open_browser: bool,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> eyre::Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(e) if e.not_found() => tracing::debug!("no .env file found"),
            Err(e) => return Err(e).context("load .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| eyre::eyre!("{key} must be set"))
        };

        let projects: Vec<Project> = serde_json::from_str(&required("PROJECT_KEYS_AND_CLIENTS")?)
            .context("parse PROJECT_KEYS_AND_CLIENTS as a JSON array of projects")?;
        if projects.is_empty() {
            eyre::bail!("PROJECT_KEYS_AND_CLIENTS must list at least one project");
        }

        let default_identity = OAuthIdentity {
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            redirect_uri: required("REDIRECT_URI")?,
        };

        let spotify = SpotifyCredentials {
            client_id: required("SPOTIFY_CLIENT_ID")?,
            client_secret: required("SPOTIFY_CLIENT_SECRET")?,
        };

        let server_address = lookup("SERVER_ADDRESS")
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string())
            .parse()
            .context("parse SERVER_ADDRESS")?;

        let credentials_dir = lookup("CREDENTIALS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let insert_delay = match lookup("INSERT_DELAY_MS") {
            Some(ms) => Duration::from_millis(ms.parse().context("parse INSERT_DELAY_MS")?),
            None => Duration::from_millis(DEFAULT_INSERT_DELAY_MS),
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.parse().context("parse REQUEST_TIMEOUT_SECS")?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        if request_timeout.is_zero() {
            eyre::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let open_browser = match lookup("OPEN_BROWSER").as_deref() {
            None => false,
            Some("1" | "true" | "yes") => true,
            Some("0" | "false" | "no" | "") => false,
            Some(other) => eyre::bail!("OPEN_BROWSER must be true or false, got {other:?}"),
        };

        Ok(Self {
            projects,
            default_identity,
            spotify,
            server_address,
            credentials_dir,
            insert_delay,
            request_timeout,
            open_browser,
        })
    }
}

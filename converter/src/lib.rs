use crate::config::Config;
use crate::convert::Converter;
use crate::credentials::FileCredentialStore;
use crate::oauth::GoogleOAuth;
use crate::rotation::ProjectRotation;
use crate::server::{App, LiveApp};
use crate::spotify::SpotifyClient;
use crate::youtube_api::YouTubeClient;
use eyre::Context;
use std::sync::Arc;

pub mod builder;
pub mod config;
pub mod convert;
pub mod credentials;
pub mod error;
pub mod matcher;
pub mod oauth;
pub mod paging;
pub mod rotation;
pub mod server;
pub mod spotify;
pub mod token;
pub mod youtube_api;

#[cfg(test)]
pub(crate) mod testing;

/// Wires the live clients together from `config`.
///
/// Reads the default refresh credential from disk; a missing one is only warned about, since
/// `/auth` can still provide it once the server is up.
pub async fn build_app(config: &Config) -> eyre::Result<LiveApp> {
    let store = FileCredentialStore::new(&config.credentials_dir);
    tracing::debug!(dir = %store.dir().display(), "using credential directory");

    let authorizer = GoogleOAuth::new(config.request_timeout)?;
    let rotation = ProjectRotation::new(
        config.projects.clone(),
        config.default_identity.clone(),
        store,
        authorizer,
    )
    .await
    .context("initialise project rotation")?;

    let youtube = YouTubeClient::new(config.request_timeout)?;
    let spotify = SpotifyClient::new(&config.spotify, config.request_timeout)?;

    let converter = Converter::new(
        youtube.clone(),
        youtube,
        Arc::new(rotation),
        config.insert_delay,
    );
    Ok(App::new(converter, spotify))
}

//! Read-only access to Spotify playlists using the client-credentials grant.

use crate::config::SpotifyCredentials;
use crate::error::ConvertError;
use crate::oauth::IssuedToken;
use crate::paging::PagedStream;
use crate::token::CachedToken;
use eyre::Context;
use jiff::Timestamp;
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, EndpointNotSet, EndpointSet, TokenUrl};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tracing::instrument;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

type SpotifyOAuthClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceTrack {
    pub name: String,
    /// All credited artists, joined with `", "`.
    pub artist: String,
    pub album: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePlaylist {
    pub name: String,
    pub description: String,
    pub tracks: Vec<SourceTrack>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    name: String,
    description: Option<String>,
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    /// Null for unavailable or local-only entries.
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    name: String,
    #[serde(default)]
    artists: Vec<NamedObject>,
    album: Option<NamedObject>,
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    name: String,
}

impl PlaylistItem {
    fn into_source_track(self) -> Option<SourceTrack> {
        let track = self.track?;
        let artist = track
            .artists
            .into_iter()
            .map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", ");
        Some(SourceTrack {
            name: track.name,
            artist,
            album: track.album.map(|a| a.name).unwrap_or_default(),
        })
    }
}

/// Anything a playlist can be read from.
pub trait PlaylistSource: Send + Sync {
    fn get_playlist(
        &self,
        playlist_id: &str,
    ) -> impl Future<Output = Result<SourcePlaylist, ConvertError>> + Send;
}

pub struct SpotifyClient {
    oauth: SpotifyOAuthClient,
    oauth_http: oauth2::reqwest::Client,
    http: reqwest::Client,
    /// Every request and every followed page link must live under this prefix.
    api_base: String,
    token: Mutex<CachedToken>,
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("client_id", self.oauth.client_id())
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl SpotifyClient {
    pub fn new(credentials: &SpotifyCredentials, timeout: Duration) -> eyre::Result<Self> {
        Self::with_endpoints(credentials, timeout, TOKEN_URL, API_BASE)
    }

    /// Like [`SpotifyClient::new`], but against another token endpoint and API root.
    pub fn with_endpoints(
        credentials: &SpotifyCredentials,
        timeout: Duration,
        token_url: &str,
        api_base: &str,
    ) -> eyre::Result<Self> {
        let oauth = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_token_uri(TokenUrl::new(token_url.to_string()).context("Spotify token endpoint")?);
        let oauth_http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .context("build Spotify OAuth HTTP client")?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build Spotify HTTP client")?;
        Ok(Self {
            oauth,
            oauth_http,
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: Mutex::new(CachedToken::absent()),
        })
    }

    /// Returns an app access token, requesting a new one if none is cached or it has expired.
    pub async fn ensure_source_token(&self) -> Result<String, ConvertError> {
        let mut token = self.token.lock().await;
        token
            .ensure(Timestamp::now(), || async {
                let response = self
                    .oauth
                    .exchange_client_credentials()
                    .request_async(&self.oauth_http)
                    .await
                    .context("request Spotify client-credentials token")?;
                tracing::debug!("obtained Spotify access token");
                Ok::<_, eyre::Report>(IssuedToken::from(response))
            })
            .await
            .map_err(ConvertError::AuthFailure)
    }

    /// Reads a playlist with all of its tracks, following pagination to the end.
    #[instrument(skip(self))]
    pub async fn fetch_playlist(&self, playlist_id: &str) -> Result<SourcePlaylist, ConvertError> {
        if playlist_id.is_empty() || !playlist_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConvertError::InvalidInput(format!(
                "{playlist_id:?} is not a playlist id"
            )));
        }

        let access_token = self.ensure_source_token().await?;
        let playlist = self
            .read_all_pages(&access_token, playlist_id)
            .await
            .map_err(ConvertError::Upstream)?;
        tracing::info!(
            name = %playlist.name,
            tracks = playlist.tracks.len(),
            "read source playlist"
        );
        Ok(playlist)
    }

    async fn read_all_pages(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> eyre::Result<SourcePlaylist> {
        let url = format!("{}/playlists/{playlist_id}", self.api_base);
        let PlaylistResponse {
            name,
            description,
            tracks: first,
        } = self.get_json(access_token, &url).await?;

        let mut items = PagedStream::new(first.items, first.next, move |next: String| async move {
            let page: TrackPage = self.get_json(access_token, &next).await?;
            Ok::<_, eyre::Report>((VecDeque::from(page.items), page.next))
        });

        let mut tracks = Vec::new();
        let mut skipped = 0usize;
        while let Some(item) = items.next().await {
            match item?.into_source_track() {
                Some(track) => tracks.push(track),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "skipped unavailable playlist entries");
        }

        Ok(SourcePlaylist {
            name,
            description: description.unwrap_or_default(),
            tracks,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, access_token: &str, url: &str) -> eyre::Result<T> {
        let inside_api = url
            .strip_prefix(&self.api_base)
            .is_some_and(|rest| rest.starts_with('/'));
        if !inside_api {
            eyre::bail!("refusing to follow Spotify page link outside the API: {url}");
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .with_context(|| format!("send request to Spotify API: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            eyre::bail!("Spotify API request failed with status {status}: {error_text}");
        }

        response
            .json()
            .await
            .context("parse Spotify API response as JSON")
    }
}

impl PlaylistSource for SpotifyClient {
    async fn get_playlist(&self, playlist_id: &str) -> Result<SourcePlaylist, ConvertError> {
        self.fetch_playlist(playlist_id).await
    }
}

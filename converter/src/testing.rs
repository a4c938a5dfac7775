//! In-memory stand-ins for the network and disk seams.

use crate::builder::PlaylistWriter;
use crate::config::Project;
use crate::credentials::{CredentialSlot, CredentialStore};
use crate::error::ConvertError;
use crate::matcher::VideoSearch;
use crate::oauth::{Authorizer, IssuedToken, OAuthIdentity};
use crate::spotify::{PlaylistSource, SourcePlaylist, SourceTrack};
use crate::youtube_api::{SearchOutcome, VideoCandidate};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn project(index: usize) -> Project {
    Project {
        api_key: format!("key-{index}"),
        client_id: format!("client-{index}"),
        client_secret: format!("secret-{index}"),
        redirect_uri: "http://localhost:5001/oauth2callback".into(),
    }
}

pub(crate) fn default_identity() -> OAuthIdentity {
    OAuthIdentity {
        client_id: "default-client".into(),
        client_secret: "default-secret".into(),
        redirect_uri: "http://localhost:5001/oauth2callback".into(),
    }
}

/// A landscape video with a plain description.
pub(crate) fn candidate(id: &str, title: &str) -> VideoCandidate {
    VideoCandidate {
        id: id.into(),
        title: title.into(),
        description: String::new(),
        thumbnail_width: 120,
        thumbnail_height: 90,
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryCredentialStore {
    slots: Arc<Mutex<HashMap<CredentialSlot, String>>>,
    fail_save: bool,
}

impl MemoryCredentialStore {
    /// A store whose disk is full: loads work, saves fail.
    pub(crate) fn failing_save() -> Self {
        Self {
            fail_save: true,
            ..Self::default()
        }
    }

    pub(crate) fn put(&self, slot: CredentialSlot, token: &str) {
        self.slots.lock().unwrap().insert(slot, token.to_string());
    }

    pub(crate) fn get(&self, slot: CredentialSlot) -> Option<String> {
        self.slots.lock().unwrap().get(&slot).cloned()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, slot: CredentialSlot) -> eyre::Result<Option<String>> {
        Ok(self.get(slot))
    }

    async fn save(&self, slot: CredentialSlot, refresh_token: &str) -> eyre::Result<()> {
        if self.fail_save {
            eyre::bail!("no space left on device");
        }
        self.put(slot, refresh_token);
        Ok(())
    }
}

/// Issues hour-long tokens and records which client each refresh was made for.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeAuthorizer {
    refreshed_with: Arc<Mutex<Vec<String>>>,
    issued: Arc<AtomicUsize>,
    fail_refresh: bool,
    fail_exchange: bool,
}

impl FakeAuthorizer {
    pub(crate) fn failing_refresh() -> Self {
        Self {
            fail_refresh: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_exchange() -> Self {
        Self {
            fail_exchange: true,
            ..Self::default()
        }
    }

    /// Client ids of every refresh, in order.
    pub(crate) fn refreshed_with(&self) -> Vec<String> {
        self.refreshed_with.lock().unwrap().clone()
    }
}

impl Authorizer for FakeAuthorizer {
    fn authorize_url(&self, identity: &OAuthIdentity) -> eyre::Result<String> {
        Ok(format!(
            "https://consent.example/auth?client_id={}&access_type=offline",
            identity.client_id
        ))
    }

    async fn exchange_code(&self, _identity: &OAuthIdentity, code: &str) -> eyre::Result<IssuedToken> {
        if self.fail_exchange {
            eyre::bail!("invalid authorization code");
        }
        Ok(IssuedToken {
            access_token: format!("access-for-{code}"),
            refresh_token: Some(format!("refresh-for-{code}")),
            expires_in: Some(Duration::from_secs(3600)),
        })
    }

    async fn refresh(&self, identity: &OAuthIdentity, _refresh_token: &str) -> eyre::Result<IssuedToken> {
        if self.fail_refresh {
            eyre::bail!("refresh credential considered invalid grant");
        }
        self.refreshed_with
            .lock()
            .unwrap()
            .push(identity.client_id.clone());
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(IssuedToken {
            access_token: format!("access-{n}"),
            refresh_token: None,
            expires_in: Some(Duration::from_secs(3600)),
        })
    }
}

/// Answers searches from a fixed table; the first needle contained in the query wins.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSearch {
    results: Vec<(String, Vec<VideoCandidate>)>,
    exhausted_keys: HashSet<String>,
    fail: bool,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeSearch {
    pub(crate) fn with_results(mut self, needle: &str, candidates: Vec<VideoCandidate>) -> Self {
        self.results.push((needle.to_string(), candidates));
        self
    }

    pub(crate) fn with_exhausted_key(mut self, key: &str) -> Self {
        self.exhausted_keys.insert(key.to_string());
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// `(api key, query)` of every search, in order.
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl VideoSearch for FakeSearch {
    async fn search(&self, api_key: &str, query: &str) -> eyre::Result<SearchOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((api_key.to_string(), query.to_string()));
        if self.fail {
            eyre::bail!("connection reset");
        }
        if self.exhausted_keys.contains(api_key) {
            return Ok(SearchOutcome::QuotaExceeded);
        }
        let found = self
            .results
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, candidates)| candidates.clone())
            .unwrap_or_default();
        Ok(SearchOutcome::Found(found))
    }
}

#[derive(Debug, Default)]
struct WriterState {
    /// `(id, title, description)` in creation order.
    playlists: Vec<(String, String, String)>,
    items: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeWriter {
    state: Arc<Mutex<WriterState>>,
    failing_videos: HashSet<String>,
    fail_creation: bool,
}

impl FakeWriter {
    pub(crate) fn failing_video(mut self, video_id: &str) -> Self {
        self.failing_videos.insert(video_id.to_string());
        self
    }

    pub(crate) fn failing_creation(mut self) -> Self {
        self.fail_creation = true;
        self
    }

    /// `(title, description)` of every created playlist.
    pub(crate) fn playlists(&self) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .map(|(_, title, description)| (title.clone(), description.clone()))
            .collect()
    }

    pub(crate) fn playlist_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.playlists.iter().map(|(id, _, _)| id.clone()).collect()
    }

    pub(crate) fn items(&self, playlist_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.items.get(playlist_id).cloned().unwrap_or_default()
    }
}

impl PlaylistWriter for FakeWriter {
    async fn create_playlist(
        &self,
        _access_token: &str,
        title: &str,
        description: &str,
    ) -> eyre::Result<String> {
        if self.fail_creation {
            eyre::bail!("YouTube API POST request failed with status 403 Forbidden");
        }
        let mut state = self.state.lock().unwrap();
        let id = format!("PL{}", state.playlists.len());
        state
            .playlists
            .push((id.clone(), title.to_string(), description.to_string()));
        state.items.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn append_video(
        &self,
        _access_token: &str,
        playlist_id: &str,
        video_id: &str,
    ) -> eyre::Result<()> {
        if self.failing_videos.contains(video_id) {
            eyre::bail!("video {video_id} not found");
        }
        let mut state = self.state.lock().unwrap();
        let Some(items) = state.items.get_mut(playlist_id) else {
            eyre::bail!("playlist {playlist_id} not found");
        };
        items.push(video_id.to_string());
        Ok(())
    }
}

/// Knows exactly one playlist, `abc`.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSource;

impl PlaylistSource for FakeSource {
    async fn get_playlist(&self, playlist_id: &str) -> Result<SourcePlaylist, ConvertError> {
        if playlist_id != "abc" {
            return Err(ConvertError::Upstream(eyre::eyre!(
                "Spotify API request failed with status 404 Not Found"
            )));
        }
        Ok(SourcePlaylist {
            name: "Fake playlist".into(),
            description: String::new(),
            tracks: vec![SourceTrack {
                name: "Alpha".into(),
                artist: "Artist".into(),
                album: "Record".into(),
            }],
        })
    }
}

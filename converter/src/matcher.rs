//! Turning a `track name + artist` pair into the best matching video.
//!
//! Search results are noisy: covers, reaction videos, vertical shorts and live sessions all
//! rank well. [`select_candidate`] applies a fixed set of filters and a priority order that
//! favours the label-provided "auto-generated" uploads, then anything calling itself official,
//! and otherwise trusts the search ranking.

use crate::credentials::CredentialStore;
use crate::error::ConvertError;
use crate::oauth::Authorizer;
use crate::rotation::ProjectRotation;
use crate::youtube_api::{SearchOutcome, VideoCandidate, YouTubeClient};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::LazyLock;

/// Live-session channel whose uploads are only wanted when the track itself is one.
const LIVE_SESSION_MARKER: &str = "a colors show";

static WITH_CREDIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(with [^)]+\)").expect("valid pattern"));
static FEAT_CREDIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(feat\. [^)]+\)").expect("valid pattern"));

/// Matching input. `artist` may be a comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
}

impl Track {
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
        }
    }
}

/// Why a candidate was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    AutoGenerated,
    Official,
    FirstResult,
}

/// Removes `(with ...)` and `(feat. ...)` credits, which search poorly.
pub fn clean_title(name: &str) -> String {
    let without_with = WITH_CREDIT.replace_all(name, "");
    let without_feat = FEAT_CREDIT.replace_all(&without_with, "");
    without_feat.trim().to_string()
}

pub fn search_query(track: &Track) -> String {
    format!("\"{}\" \"{}\"", clean_title(&track.name), track.artist.trim())
}

/// Picks the best candidate for `track_name` (the name as listed on the source platform).
///
/// Returns `None` when no candidate has a landscape thumbnail.
pub fn select_candidate<'c>(
    track_name: &str,
    candidates: &'c [VideoCandidate],
) -> Option<(&'c VideoCandidate, SelectionRule)> {
    let landscape: Vec<&VideoCandidate> = candidates.iter().filter(|c| c.is_landscape()).collect();
    if landscape.is_empty() {
        return None;
    }

    let track_name = track_name.to_lowercase();
    let pool = if track_name.contains(LIVE_SESSION_MARKER) {
        landscape
    } else {
        let filtered: Vec<&VideoCandidate> = landscape
            .iter()
            .copied()
            .filter(|c| !c.title.to_lowercase().contains(LIVE_SESSION_MARKER))
            .collect();
        tracing::trace!(remaining = filtered.len(), "dropped live-session uploads");
        if filtered.is_empty() { landscape } else { filtered }
    };

    let auto_generated = pool.iter().find(|c| {
        let description = c.description.to_lowercase();
        description.contains("provided to youtube by")
            && description.contains("auto-generated by youtube")
            && c.title.to_lowercase().contains(&track_name)
    });
    if let Some(c) = auto_generated {
        return Some((*c, SelectionRule::AutoGenerated));
    }

    if let Some(c) = pool
        .iter()
        .find(|c| c.title.to_lowercase().contains("official"))
    {
        return Some((*c, SelectionRule::Official));
    }

    pool.first().map(|c| (*c, SelectionRule::FirstResult))
}

/// Keyed video search; the seam between matching and the YouTube API.
pub trait VideoSearch: Send + Sync {
    fn search(
        &self,
        api_key: &str,
        query: &str,
    ) -> impl Future<Output = eyre::Result<SearchOutcome>> + Send;
}

impl VideoSearch for YouTubeClient {
    async fn search(&self, api_key: &str, query: &str) -> eyre::Result<SearchOutcome> {
        self.search_videos(api_key, query).await
    }
}

pub struct TrackMatcher<'a, V, S, A> {
    search: &'a V,
    rotation: &'a ProjectRotation<S, A>,
}

impl<'a, V, S, A> TrackMatcher<'a, V, S, A>
where
    V: VideoSearch,
    S: CredentialStore,
    A: Authorizer,
{
    pub fn new(search: &'a V, rotation: &'a ProjectRotation<S, A>) -> Self {
        Self { search, rotation }
    }

    /// Finds the video id for `track`, or `None` if it should be skipped.
    pub async fn match_track(&self, track: &Track) -> Option<String> {
        match self.try_match(track).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(track = %track.name, artist = %track.artist, "no video for track: {}", e);
                None
            }
        }
    }

    /// Like [`Self::match_track`], but says why nothing was found.
    ///
    /// Each exhausted quota rotates to the next project and retries, for at most one attempt
    /// per project.
    #[tracing::instrument(skip_all, fields(track = %track.name))]
    pub async fn try_match(&self, track: &Track) -> Result<String, ConvertError> {
        let name = track.name.trim();
        let artist = track.artist.trim();
        if name.is_empty() || artist.is_empty() {
            return Err(ConvertError::InvalidInput(
                "track needs both a name and an artist".to_string(),
            ));
        }

        let query = search_query(track);
        let attempts = self.rotation.project_count();
        for attempt in 1..=attempts {
            let (index, key) = self.rotation.current_search_key().await;
            let outcome = self
                .search
                .search(&key, &query)
                .await
                .map_err(ConvertError::Upstream)?;

            let candidates = match outcome {
                SearchOutcome::Found(candidates) => candidates,
                SearchOutcome::QuotaExceeded => {
                    tracing::info!(index, attempt, "search quota exceeded, rotating project");
                    self.rotation.rotate_from(index).await;
                    continue;
                }
            };

            if candidates.is_empty() {
                return Err(ConvertError::NoMatchFound(format!("no results for {query}")));
            }
            let Some((chosen, rule)) = select_candidate(&track.name, &candidates) else {
                return Err(ConvertError::NoMatchFound(format!(
                    "no landscape video among {} results for {query}",
                    candidates.len()
                )));
            };
            tracing::debug!(video_id = chosen.id, title = chosen.title, ?rule, "selected video");
            return Ok(chosen.id.clone());
        }

        Err(ConvertError::QuotaExhausted { projects: attempts })
    }
}

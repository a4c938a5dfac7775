//! Video search (`search.list`), keyed by a project's API key.

use super::client::{API_BASE, YouTubeClient};
use super::types::{ApiErrorResponse, ResourceId, ThumbnailDetails};
use eyre::Context;
use http::StatusCode;
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResult {
    pub id: ResourceId,
    pub snippet: SearchResultSnippet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResultSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnails: ThumbnailDetails,
}

/// One video from a search, flattened to what candidate selection looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Of the `default` thumbnail; 0 when not reported.
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl VideoCandidate {
    pub fn is_landscape(&self) -> bool {
        self.thumbnail_width > self.thumbnail_height
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Vec<VideoCandidate>),
    /// The key's daily quota is used up; another project's key may still work.
    QuotaExceeded,
}

impl SearchResult {
    /// `None` for results that are not videos.
    fn into_candidate(self) -> Option<VideoCandidate> {
        let id = self.id.video_id?;
        let thumbnail = self.snippet.thumbnails.default.unwrap_or_default();
        Some(VideoCandidate {
            id,
            title: self.snippet.title,
            description: self.snippet.description,
            thumbnail_width: thumbnail.width.unwrap_or(0),
            thumbnail_height: thumbnail.height.unwrap_or(0),
        })
    }
}

/// Interprets a `search.list` reply.
///
/// Results that are not videos are dropped. A quota error becomes
/// [`SearchOutcome::QuotaExceeded`]; any other error status is an `Err`.
pub fn decode_search_response(status: StatusCode, body: &str) -> eyre::Result<SearchOutcome> {
    if status.is_success() {
        let response: SearchListResponse =
            serde_json::from_str(body).context("parse YouTube search response as JSON")?;
        let candidates = response
            .items
            .into_iter()
            .filter_map(SearchResult::into_candidate)
            .collect();
        return Ok(SearchOutcome::Found(candidates));
    }

    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(error) if error.is_quota_exceeded() => Ok(SearchOutcome::QuotaExceeded),
        Ok(error) => Err(eyre::eyre!(
            "YouTube search failed with status {}: {}",
            status,
            error.error.message
        )),
        Err(_) => Err(eyre::eyre!(
            "YouTube search failed with status {}: {}",
            status,
            body
        )),
    }
}

impl YouTubeClient {
    /// Searches for videos matching `query`, most relevant first.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/search/list>
    #[instrument(skip(self, api_key))]
    pub async fn search_videos(&self, api_key: &str, query: &str) -> eyre::Result<SearchOutcome> {
        let url = format!("{API_BASE}/search");
        let query_params = [
            ("part", "snippet"),
            ("type", "video"),
            ("order", "relevance"),
            ("key", api_key),
            ("q", query),
        ];

        let response = self
            .http_client()
            .get(&url)
            .query(&query_params)
            .send()
            .await
            .context("send search request to YouTube API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("read YouTube search response body")?;

        let outcome = decode_search_response(status, &body)?;
        if let SearchOutcome::Found(candidates) = &outcome {
            tracing::debug!(results = candidates.len(), "search completed");
        }
        Ok(outcome)
    }
}

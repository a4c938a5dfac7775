//! Playlist creation and item insertion, authorized by an OAuth access token.

use super::client::{API_BASE, YouTubeClient};
use super::types::ResourceId;
use eyre::Context;
use http::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyStatus {
    Private,
}

/// Body of `playlists.insert`.
#[derive(Debug, Serialize)]
pub struct PlaylistInsertRequest {
    pub snippet: PlaylistSnippet,
    pub status: PlaylistStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: PrivacyStatus,
}

/// The subset of a playlist resource we read back.
#[derive(Debug, Deserialize)]
pub struct Playlist {
    pub id: String,
}

/// Body of `playlistItems.insert`.
#[derive(Debug, Serialize)]
pub struct PlaylistItemInsertRequest {
    pub snippet: PlaylistItemSnippet,
}

#[derive(Debug, Serialize)]
pub struct PlaylistItemSnippet {
    #[serde(rename = "playlistId")]
    pub playlist_id: String,
    #[serde(rename = "resourceId")]
    pub resource_id: ResourceId,
}

impl PlaylistItemInsertRequest {
    pub fn video(playlist_id: &str, video_id: &str) -> Self {
        Self {
            snippet: PlaylistItemSnippet {
                playlist_id: playlist_id.to_string(),
                resource_id: ResourceId {
                    kind: "youtube#video".to_string(),
                    video_id: Some(video_id.to_string()),
                },
            },
        }
    }
}

impl YouTubeClient {
    /// Creates a playlist owned by the authorized account and returns its id.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlists/insert>
    #[instrument(skip(self, access_token, description))]
    pub async fn insert_playlist(
        &self,
        access_token: &str,
        title: &str,
        description: &str,
        privacy_status: PrivacyStatus,
    ) -> eyre::Result<String> {
        let url = format!("{API_BASE}/playlists");
        let body = PlaylistInsertRequest {
            snippet: PlaylistSnippet {
                title: title.to_string(),
                description: description.to_string(),
            },
            status: PlaylistStatus { privacy_status },
        };

        let response = self
            .make_authenticated_request(
                access_token,
                Method::POST,
                &url,
                Some(&[("part", "snippet,status")]),
                Some(&body),
            )
            .await?;

        let playlist: Playlist = response
            .json()
            .await
            .context("parse YouTube API playlist insert response as JSON")?;

        tracing::debug!(playlist_id = playlist.id, "created playlist");
        Ok(playlist.id)
    }

    /// Appends a video to the end of a playlist.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/insert>
    #[instrument(skip(self, access_token))]
    pub async fn insert_playlist_item(
        &self,
        access_token: &str,
        playlist_id: &str,
        video_id: &str,
    ) -> eyre::Result<()> {
        let url = format!("{API_BASE}/playlistItems");
        let body = PlaylistItemInsertRequest::video(playlist_id, video_id);

        self.make_authenticated_request(
            access_token,
            Method::POST,
            &url,
            Some(&[("part", "snippet")]),
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

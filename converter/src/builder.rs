//! Assembling the destination playlist from matched video ids.

use crate::credentials::CredentialStore;
use crate::error::ConvertError;
use crate::oauth::Authorizer;
use crate::rotation::ProjectRotation;
use crate::youtube_api::{PrivacyStatus, YouTubeClient};
use std::future::Future;
use std::time::Duration;

pub const PLAYLIST_DESCRIPTION: &str = "Generated by Playlist Converter";

/// Playlist writes on the destination platform.
pub trait PlaylistWriter: Send + Sync {
    /// Creates a private playlist and returns its id.
    fn create_playlist(
        &self,
        access_token: &str,
        title: &str,
        description: &str,
    ) -> impl Future<Output = eyre::Result<String>> + Send;

    fn append_video(
        &self,
        access_token: &str,
        playlist_id: &str,
        video_id: &str,
    ) -> impl Future<Output = eyre::Result<()>> + Send;
}

impl PlaylistWriter for YouTubeClient {
    async fn create_playlist(
        &self,
        access_token: &str,
        title: &str,
        description: &str,
    ) -> eyre::Result<String> {
        self.insert_playlist(access_token, title, description, PrivacyStatus::Private)
            .await
    }

    async fn append_video(
        &self,
        access_token: &str,
        playlist_id: &str,
        video_id: &str,
    ) -> eyre::Result<()> {
        self.insert_playlist_item(access_token, playlist_id, video_id)
            .await
    }
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPlaylist {
    pub id: String,
    pub url: String,
    pub inserted: usize,
    pub failed: usize,
}

pub struct PlaylistBuilder<'a, W, S, A> {
    writer: &'a W,
    rotation: &'a ProjectRotation<S, A>,
    item_delay: Duration,
}

impl<'a, W, S, A> PlaylistBuilder<'a, W, S, A>
where
    W: PlaylistWriter,
    S: CredentialStore,
    A: Authorizer,
{
    pub fn new(writer: &'a W, rotation: &'a ProjectRotation<S, A>, item_delay: Duration) -> Self {
        Self {
            writer,
            rotation,
            item_delay,
        }
    }

    /// Creates the playlist and appends `video_ids` in order, pausing `item_delay` between
    /// insertions.
    ///
    /// Only creation failures are returned. A video that cannot be appended is logged and
    /// skipped, so the result may hold fewer items than requested.
    #[tracing::instrument(skip(self, video_ids), fields(videos = video_ids.len()))]
    pub async fn build(
        &self,
        name: &str,
        video_ids: &[String],
    ) -> Result<BuiltPlaylist, ConvertError> {
        let access_token = self.rotation.ensure_destination_token().await?;
        let id = self
            .writer
            .create_playlist(&access_token, name, PLAYLIST_DESCRIPTION)
            .await
            .map_err(ConvertError::Upstream)?;
        tracing::info!(playlist_id = %id, "created destination playlist");

        let mut inserted = 0;
        let mut failed = 0;
        for (i, video_id) in video_ids.iter().enumerate() {
            if i > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            let result = match self.rotation.ensure_destination_token().await {
                Ok(access_token) => self
                    .writer
                    .append_video(&access_token, &id, video_id)
                    .await
                    .map_err(ConvertError::Upstream),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    tracing::debug!(%video_id, "added video to playlist");
                    inserted += 1;
                }
                Err(e) => {
                    tracing::warn!(%video_id, "failed to add video to playlist: {}", e);
                    failed += 1;
                }
            }
        }

        tracing::info!(playlist_id = %id, inserted, failed, "finished filling playlist");
        Ok(BuiltPlaylist {
            url: playlist_url(&id),
            id,
            inserted,
            failed,
        })
    }
}

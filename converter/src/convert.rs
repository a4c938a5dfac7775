//! End-to-end conversion: match every track, then build the playlist from the matches.

use crate::builder::{PlaylistBuilder, PlaylistWriter};
use crate::credentials::CredentialStore;
use crate::error::ConvertError;
use crate::matcher::{Track, TrackMatcher, VideoSearch};
use crate::oauth::Authorizer;
use crate::rotation::ProjectRotation;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const SUPPORTED_SOURCE: &str = "spotify";
const SUPPORTED_DESTINATION: &str = "youtube";

/// Body of `POST /convert`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub source_platform: String,
    pub destination_platform: String,
    pub playlist_data: PlaylistData,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlaylistData {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub playlist_url: String,
}

pub struct Converter<V, W, S, A> {
    search: V,
    writer: W,
    rotation: Arc<ProjectRotation<S, A>>,
    item_delay: Duration,
}

impl<V, W, S, A> Converter<V, W, S, A>
where
    V: VideoSearch,
    W: PlaylistWriter,
    S: CredentialStore,
    A: Authorizer,
{
    pub fn new(
        search: V,
        writer: W,
        rotation: Arc<ProjectRotation<S, A>>,
        item_delay: Duration,
    ) -> Self {
        Self {
            search,
            writer,
            rotation,
            item_delay,
        }
    }

    pub fn rotation(&self) -> &ProjectRotation<S, A> {
        &self.rotation
    }

    /// Converts one playlist. Tracks are matched one at a time, in order; unmatched tracks are
    /// left out. Nothing is created on the destination unless at least one track matched.
    #[tracing::instrument(skip_all, fields(playlist = %request.playlist_data.name, tracks = request.playlist_data.tracks.len()))]
    pub async fn convert(&self, request: &ConvertRequest) -> Result<ConvertResponse, ConvertError> {
        if !request.source_platform.eq_ignore_ascii_case(SUPPORTED_SOURCE)
            || !request
                .destination_platform
                .eq_ignore_ascii_case(SUPPORTED_DESTINATION)
        {
            return Err(ConvertError::UnsupportedPlatforms {
                source_platform: request.source_platform.clone(),
                destination_platform: request.destination_platform.clone(),
            });
        }

        let name = request.playlist_data.name.trim();
        if name.is_empty() {
            return Err(ConvertError::InvalidInput("playlist name is empty".to_string()));
        }

        let tracks = &request.playlist_data.tracks;
        let matcher = TrackMatcher::new(&self.search, &self.rotation);
        let mut video_ids = Vec::with_capacity(tracks.len());
        for track in tracks {
            if let Some(id) = matcher.match_track(track).await {
                video_ids.push(id);
            }
        }
        tracing::info!(
            matched = video_ids.len(),
            skipped = tracks.len() - video_ids.len(),
            "matching finished"
        );

        if video_ids.is_empty() {
            return Err(ConvertError::NoMatchFound(format!(
                "none of the {} tracks matched",
                tracks.len()
            )));
        }

        let built = PlaylistBuilder::new(&self.writer, &self.rotation, self.item_delay)
            .build(name, &video_ids)
            .await?;
        Ok(ConvertResponse {
            playlist_url: built.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialSlot;
    use crate::testing::{
        FakeAuthorizer, FakeSearch, FakeWriter, MemoryCredentialStore, candidate,
        default_identity, project,
    };
    use pretty_assertions::assert_eq;

    type TestConverter = Converter<FakeSearch, FakeWriter, MemoryCredentialStore, FakeAuthorizer>;

    async fn converter(search: FakeSearch, writer: FakeWriter) -> TestConverter {
        let store = MemoryCredentialStore::default();
        store.put(CredentialSlot::Default, "1//default");
        let rotation = ProjectRotation::new(
            (0..2).map(project).collect(),
            default_identity(),
            store,
            FakeAuthorizer::default(),
        )
        .await
        .unwrap();
        Converter::new(search, writer, Arc::new(rotation), Duration::ZERO)
    }

    fn request(tracks: Vec<Track>) -> ConvertRequest {
        ConvertRequest {
            source_platform: "spotify".into(),
            destination_platform: "youtube".into(),
            playlist_data: PlaylistData {
                name: "Road trip".into(),
                tracks,
            },
        }
    }

    #[test]
    fn request_uses_camel_case() {
        let body = r#"{
            "sourcePlatform": "spotify",
            "destinationPlatform": "youtube",
            "playlistData": {"name": "Mix", "tracks": [{"name": "Song", "artist": "Artist"}, {"name": "Bare"}]}
        }"#;
        let parsed: ConvertRequest = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.playlist_data.tracks,
            vec![Track::new("Song", "Artist"), Track::new("Bare", "")]
        );

        let response = ConvertResponse {
            playlist_url: "u".into(),
        };
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"playlistUrl":"u"}"#);
    }

    #[tokio::test]
    async fn unmatched_track_is_left_out() {
        let search = FakeSearch::default()
            .with_results("Alpha", vec![candidate("vid-a", "Alpha")])
            .with_results("Gamma", vec![candidate("vid-c", "Gamma")]);
        let writer = FakeWriter::default();
        let converter = converter(search, writer.clone()).await;

        let response = converter
            .convert(&request(vec![
                Track::new("Alpha", "Artist"),
                Track::new("Beta", "Artist"),
                Track::new("Gamma", "Artist"),
            ]))
            .await
            .unwrap();

        let playlists = writer.playlist_ids();
        assert_eq!(playlists.len(), 1);
        assert_eq!(
            response.playlist_url,
            format!("https://www.youtube.com/playlist?list={}", playlists[0])
        );
        assert_eq!(
            writer.items(&playlists[0]),
            vec!["vid-a".to_string(), "vid-c".to_string()]
        );
    }

    #[tokio::test]
    async fn nothing_matched_creates_nothing() {
        let writer = FakeWriter::default();
        let converter = converter(FakeSearch::default(), writer.clone()).await;

        let err = converter
            .convert(&request(vec![
                Track::new("Alpha", "Artist"),
                Track::new("Beta", ""),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::NoMatchFound(_)), "{err}");
        assert!(writer.playlists().is_empty());
    }

    #[tokio::test]
    async fn quota_exhaustion_everywhere_skips_tracks() {
        let search = FakeSearch::default()
            .with_results("Alpha", vec![candidate("vid-a", "Alpha")])
            .with_exhausted_key("key-0")
            .with_exhausted_key("key-1");
        let writer = FakeWriter::default();
        let converter = converter(search, writer.clone()).await;

        let err = converter
            .convert(&request(vec![Track::new("Alpha", "Artist")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::NoMatchFound(_)), "{err}");
        assert!(writer.playlists().is_empty());
    }

    #[tokio::test]
    async fn only_spotify_to_youtube_is_supported() {
        let writer = FakeWriter::default();
        let search = FakeSearch::default().with_results("Alpha", vec![candidate("vid-a", "Alpha")]);
        let converter = converter(search, writer.clone()).await;

        let mut req = request(vec![Track::new("Alpha", "Artist")]);
        req.source_platform = "apple".into();
        let err = converter.convert(&req).await.unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedPlatforms { .. }), "{err}");
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);

        let mut req = request(vec![Track::new("Alpha", "Artist")]);
        req.source_platform = "Spotify".into();
        req.destination_platform = "YouTube".into();
        converter.convert(&req).await.unwrap();
        assert_eq!(writer.playlists().len(), 1);
    }
}

//! Shared wire types for the YouTube Data API v3.

use serde::{Deserialize, Serialize};

/// Error envelope returned alongside any non-2xx status.
///
/// See: <https://developers.google.com/youtube/v3/docs/errors>
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub message: String,
}

impl ApiErrorResponse {
    /// The daily quota of the key used for the call is used up.
    pub fn is_quota_exceeded(&self) -> bool {
        self.error.errors.iter().any(|e| e.reason == "quotaExceeded")
    }
}

/// A thumbnail image; dimensions are optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThumbnailDetails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
}

/// Identifies the resource a search result or playlist item points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: String,
    #[serde(rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

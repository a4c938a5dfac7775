//! Failure taxonomy shared by matching, token handling and playlist building.
//!
//! Internal plumbing (HTTP calls, OAuth exchanges, file IO) reports [`eyre::Report`]s with
//! context attached. Those are wrapped into a [`ConvertError`] at component boundaries so the
//! HTTP layer can pick a status code and a generic message without leaking diagnostics.

use http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The caller sent something unusable (malformed track, missing query parameter, bad body).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Only Spotify → YouTube is supported.
    #[error("unsupported platform pair: {source_platform} -> {destination_platform}")]
    UnsupportedPlatforms {
        source_platform: String,
        destination_platform: String,
    },

    /// Every configured project reported an exhausted search quota.
    #[error("search quota exhausted on all {projects} projects")]
    QuotaExhausted { projects: usize },

    /// Search results contained nothing usable, or no track of a playlist matched.
    #[error("no match found: {0}")]
    NoMatchFound(String),

    /// A token exchange or refresh failed, or no refresh credential is stored.
    #[error("authorization failed: {0:#}")]
    AuthFailure(eyre::Report),

    /// A remote API call failed for a reason other than the ones above.
    #[error("upstream request failed: {0:#}")]
    Upstream(eyre::Report),
}

impl ConvertError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::UnsupportedPlatforms { .. } => StatusCode::BAD_REQUEST,
            Self::QuotaExhausted { .. }
            | Self::NoMatchFound(_)
            | Self::AuthFailure(_)
            | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to an HTTP caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "The request is missing required data or is malformed.",
            Self::UnsupportedPlatforms { .. } => "This platform combination is not supported.",
            Self::QuotaExhausted { .. } | Self::NoMatchFound(_) => {
                "None of the playlist tracks could be matched."
            }
            Self::AuthFailure(_) => "Authorization with the music platform failed.",
            Self::Upstream(_) => "The music platform request failed.",
        }
    }
}

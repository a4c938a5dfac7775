//! YouTube Data API v3 client library.
//!
//! Two kinds of calls are made, with different authorization:
//!
//! - [`YouTubeClient::search_videos`] uses a project's API key, which carries that project's
//!   daily quota. A quota failure is reported as [`SearchOutcome::QuotaExceeded`] rather than an
//!   error so the caller can switch projects.
//! - [`YouTubeClient::insert_playlist`] and [`YouTubeClient::insert_playlist_item`] act on the
//!   user's account and need an OAuth access token with the `youtube` scope.

pub mod client;
pub mod playlists;
pub mod search;
pub mod types;

pub use client::YouTubeClient;
pub use playlists::PrivacyStatus;
pub use search::{SearchOutcome, VideoCandidate, decode_search_response};

//! Expiry-gated access token cache.
//!
//! Both the Spotify read token and the YouTube write token go through the same small state
//! machine: a token is [`TokenState::Absent`] until something is installed, [`TokenState::Valid`]
//! while `now < expires_at`, and [`TokenState::Expired`] from the expiry instant onwards. The only
//! transition callers use is [`CachedToken::ensure`], which fetches a replacement whenever the
//! token is not valid.

use crate::oauth::IssuedToken;
use jiff::{SignedDuration, Timestamp};
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
    Expired,
}

#[derive(Clone, Default)]
pub struct CachedToken {
    current: Option<HeldToken>,
}

#[derive(Clone)]
struct HeldToken {
    secret: String,
    /// `None` when the issuer did not say; such a token is trusted until a call fails.
    expires_at: Option<Timestamp>,
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("present", &self.current.is_some())
            .field("expires_at", &self.current.as_ref().and_then(|t| t.expires_at))
            .finish()
    }
}

impl CachedToken {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn state(&self, now: Timestamp) -> TokenState {
        match &self.current {
            None => TokenState::Absent,
            Some(HeldToken {
                expires_at: Some(expires_at),
                ..
            }) if now >= *expires_at => TokenState::Expired,
            Some(_) => TokenState::Valid,
        }
    }

    /// Stores `token` as the current one, expiring `expires_in` after `now`.
    pub fn install(&mut self, token: &IssuedToken, now: Timestamp) {
        let expires_at = token.expires_in.and_then(|ttl| {
            let ttl = SignedDuration::try_from(ttl).ok()?;
            now.checked_add(ttl).ok()
        });
        self.current = Some(HeldToken {
            secret: token.access_token.clone(),
            expires_at,
        });
    }

    /// Returns the cached access token, calling `fetch` first if it is absent or expired.
    ///
    /// A failed fetch leaves the cache untouched and is returned to the caller.
    pub async fn ensure<F, Fut>(&mut self, now: Timestamp, fetch: F) -> eyre::Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = eyre::Result<IssuedToken>>,
    {
        let state = self.state(now);
        if state != TokenState::Valid {
            tracing::debug!(?state, "access token needs to be fetched");
            let token = fetch().await?;
            self.install(&token, now);
        }

        match &self.current {
            Some(held) => Ok(held.secret.clone()),
            None => Err(eyre::eyre!("token cache empty after successful fetch")),
        }
    }
}

//! Round-robin rotation across the configured projects.
//!
//! Each project has its own search quota and its own OAuth client. When a search reports that
//! the quota is exhausted, the matcher asks this module to move on to the next project; doing
//! so also swaps the OAuth identity, reloads that project's stored refresh credential and drops
//! the cached destination access token, since that token belonged to the previous identity.
//!
//! All of that lives behind one async mutex so no caller ever sees a half-applied rotation.

use crate::config::Project;
use crate::credentials::{CredentialSlot, CredentialStore};
use crate::error::ConvertError;
use crate::oauth::{Authorizer, OAuthIdentity};
use crate::token::CachedToken;
use eyre::Context;
use jiff::Timestamp;
use tokio::sync::Mutex;

#[derive(Debug)]
struct ActiveProject {
    index: usize,
    identity: OAuthIdentity,
    slot: CredentialSlot,
    refresh_token: Option<String>,
    token: CachedToken,
}

pub struct ProjectRotation<S, A> {
    projects: Vec<Project>,
    store: S,
    authorizer: A,
    active: Mutex<ActiveProject>,
}

impl<S, A> std::fmt::Debug for ProjectRotation<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectRotation")
            .field("projects", &self.projects.len())
            .finish_non_exhaustive()
    }
}

impl<S, A> ProjectRotation<S, A>
where
    S: CredentialStore,
    A: Authorizer,
{
    /// Starts at project 0's search key with the default OAuth identity and whatever refresh
    /// credential is stored in the [`CredentialSlot::Default`] slot.
    pub async fn new(
        projects: Vec<Project>,
        default_identity: OAuthIdentity,
        store: S,
        authorizer: A,
    ) -> eyre::Result<Self> {
        if projects.is_empty() {
            eyre::bail!("at least one project is required for rotation");
        }

        let slot = CredentialSlot::Default;
        let refresh_token = store
            .load(slot)
            .await
            .with_context(|| format!("load {slot} refresh credential"))?;
        if refresh_token.is_none() {
            tracing::warn!(%slot, "no stored refresh credential, visit /auth to authorize");
        }

        Ok(Self {
            projects,
            store,
            authorizer,
            active: Mutex::new(ActiveProject {
                index: 0,
                identity: default_identity,
                slot,
                refresh_token,
                token: CachedToken::absent(),
            }),
        })
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub async fn current_index(&self) -> usize {
        self.active.lock().await.index
    }

    /// Search key of the active project.
    pub async fn current_key(&self) -> String {
        self.current_search_key().await.1
    }

    /// Active index together with its search key, read under one lock so the pair is
    /// consistent for a later [`Self::rotate_from`].
    pub async fn current_search_key(&self) -> (usize, String) {
        let active = self.active.lock().await;
        (active.index, self.projects[active.index].api_key.clone())
    }

    pub async fn has_refresh_credential(&self) -> bool {
        self.active.lock().await.refresh_token.is_some()
    }

    /// Advances to the next project unconditionally and returns its index.
    pub async fn rotate(&self) -> usize {
        let mut active = self.active.lock().await;
        self.advance(&mut active).await
    }

    /// Advances only if `observed` is still the active index, so that several callers that
    /// hit the same exhausted quota rotate once between them. Returns the index now active.
    pub async fn rotate_from(&self, observed: usize) -> usize {
        let mut active = self.active.lock().await;
        if active.index != observed {
            tracing::debug!(
                observed,
                current = active.index,
                "rotation already happened elsewhere"
            );
            return active.index;
        }
        self.advance(&mut active).await
    }

    async fn advance(&self, active: &mut ActiveProject) -> usize {
        let next = (active.index + 1) % self.projects.len();
        let slot = CredentialSlot::Project(next);

        let refresh_token = match self.store.load(slot).await {
            Ok(Some(token)) => Some(token),
            Ok(None) => {
                tracing::warn!(%slot, "no stored refresh credential, visit /auth to authorize");
                None
            }
            Err(e) => {
                tracing::warn!(%slot, "failed to load refresh credential: {:#}", e);
                None
            }
        };

        *active = ActiveProject {
            index: next,
            identity: self.projects[next].identity(),
            slot,
            refresh_token,
            token: CachedToken::absent(),
        };
        tracing::info!(index = next, client_id = %active.identity.client_id, "rotated to next project");
        next
    }

    /// Consent URL for the active OAuth identity.
    pub async fn authorize_url(&self) -> Result<String, ConvertError> {
        let active = self.active.lock().await;
        self.authorizer
            .authorize_url(&active.identity)
            .map_err(ConvertError::AuthFailure)
    }

    /// Exchanges an authorization code for the active identity and persists the resulting
    /// refresh credential in the active slot, which is returned.
    #[tracing::instrument(skip_all)]
    pub async fn complete_authorization(&self, code: &str) -> Result<CredentialSlot, ConvertError> {
        let mut active = self.active.lock().await;
        let issued = self
            .authorizer
            .exchange_code(&active.identity, code)
            .await
            .map_err(ConvertError::AuthFailure)?;

        let slot = active.slot;
        match &issued.refresh_token {
            Some(refresh_token) => {
                self.store
                    .save(slot, refresh_token)
                    .await
                    .with_context(|| format!("persist {slot} refresh credential"))
                    .map_err(ConvertError::AuthFailure)?;
                active.refresh_token = Some(refresh_token.clone());
            }
            None => {
                tracing::warn!(%slot, "authorization returned no refresh credential, nothing saved");
            }
        }
        // only a persisted authorization becomes the active one
        active.token.install(&issued, Timestamp::now());
        Ok(slot)
    }

    /// Returns a destination access token that is valid right now, refreshing it with the
    /// active slot's refresh credential when it is absent or expired.
    pub async fn ensure_destination_token(&self) -> Result<String, ConvertError> {
        let mut guard = self.active.lock().await;
        let ActiveProject {
            identity,
            slot,
            refresh_token,
            token,
            ..
        } = &mut *guard;
        let identity = &*identity;
        let slot = *slot;
        let authorizer = &self.authorizer;

        token
            .ensure(Timestamp::now(), move || async move {
                let Some(current) = refresh_token.as_deref() else {
                    eyre::bail!("no refresh credential stored for {slot}, visit /auth");
                };
                let issued = authorizer.refresh(identity, current).await?;
                if let Some(rotated) = &issued.refresh_token {
                    *refresh_token = Some(rotated.clone());
                }
                Ok::<_, eyre::Report>(issued)
            })
            .await
            .map_err(ConvertError::AuthFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAuthorizer, MemoryCredentialStore, default_identity, project};
    use pretty_assertions::assert_eq;

    async fn rotation(
        n: usize,
        store: MemoryCredentialStore,
        authorizer: FakeAuthorizer,
    ) -> ProjectRotation<MemoryCredentialStore, FakeAuthorizer> {
        let projects = (0..n).map(project).collect();
        ProjectRotation::new(projects, default_identity(), store, authorizer)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_project_list_is_rejected() {
        let result = ProjectRotation::new(
            Vec::new(),
            default_identity(),
            MemoryCredentialStore::default(),
            FakeAuthorizer::default(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn n_rotations_return_to_start() {
        let r = rotation(3, MemoryCredentialStore::default(), FakeAuthorizer::default()).await;
        assert_eq!(r.current_search_key().await, (0, "key-0".to_string()));

        assert_eq!(r.rotate().await, 1);
        assert_eq!(r.current_key().await, "key-1");
        assert_eq!(r.rotate().await, 2);
        assert_eq!(r.rotate().await, 0);
        assert_eq!(r.current_index().await, 0);
        assert_eq!(r.current_key().await, "key-0");
    }

    #[tokio::test]
    async fn rotate_from_stale_index_is_a_no_op() {
        let r = rotation(3, MemoryCredentialStore::default(), FakeAuthorizer::default()).await;
        assert_eq!(r.rotate_from(0).await, 1);
        // a second caller that also saw index 0 exhausted must not skip project 1
        assert_eq!(r.rotate_from(0).await, 1);
        assert_eq!(r.current_index().await, 1);
    }

    #[tokio::test]
    async fn rotation_loads_the_projects_credential() {
        let store = MemoryCredentialStore::default();
        store.put(CredentialSlot::Default, "1//default");
        store.put(CredentialSlot::Project(1), "1//one");

        let r = rotation(3, store, FakeAuthorizer::default()).await;
        assert!(r.has_refresh_credential().await);

        r.rotate().await;
        assert!(r.has_refresh_credential().await);

        r.rotate().await;
        assert!(!r.has_refresh_credential().await);
    }

    #[tokio::test]
    async fn destination_token_is_cached_until_rotation() {
        let store = MemoryCredentialStore::default();
        store.put(CredentialSlot::Default, "1//default");
        store.put(CredentialSlot::Project(1), "1//one");
        let authorizer = FakeAuthorizer::default();

        let r = rotation(2, store, authorizer.clone()).await;
        let first = r.ensure_destination_token().await.unwrap();
        let again = r.ensure_destination_token().await.unwrap();
        assert_eq!(first, again);
        assert_eq!(authorizer.refreshed_with(), vec!["default-client".to_string()]);

        r.rotate().await;
        r.ensure_destination_token().await.unwrap();
        assert_eq!(
            authorizer.refreshed_with(),
            vec!["default-client".to_string(), "client-1".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_refresh_credential_is_an_auth_failure() {
        let authorizer = FakeAuthorizer::default();
        let r = rotation(1, MemoryCredentialStore::default(), authorizer.clone()).await;

        let err = r.ensure_destination_token().await.unwrap_err();
        assert!(matches!(err, ConvertError::AuthFailure(_)), "{err}");
        assert!(authorizer.refreshed_with().is_empty());
    }

    #[tokio::test]
    async fn rejected_refresh_is_an_auth_failure() {
        let store = MemoryCredentialStore::default();
        store.put(CredentialSlot::Default, "1//revoked");
        let authorizer = FakeAuthorizer::failing_refresh();

        let r = rotation(1, store, authorizer).await;
        let err = r.ensure_destination_token().await.unwrap_err();
        assert!(matches!(err, ConvertError::AuthFailure(_)), "{err}");
    }

    #[tokio::test]
    async fn authorization_persists_to_the_active_slot() {
        let store = MemoryCredentialStore::default();
        let authorizer = FakeAuthorizer::default();
        let r = rotation(3, store.clone(), authorizer.clone()).await;

        assert_eq!(
            r.complete_authorization("code-a").await.unwrap(),
            CredentialSlot::Default
        );
        assert_eq!(
            store.get(CredentialSlot::Default).as_deref(),
            Some("refresh-for-code-a")
        );

        r.rotate().await;
        assert_eq!(
            r.complete_authorization("code-b").await.unwrap(),
            CredentialSlot::Project(1)
        );
        assert_eq!(
            store.get(CredentialSlot::Project(1)).as_deref(),
            Some("refresh-for-code-b")
        );

        // the exchanged access token is installed, so no refresh is needed
        r.ensure_destination_token().await.unwrap();
        assert!(authorizer.refreshed_with().is_empty());
    }

    #[tokio::test]
    async fn failed_persist_leaves_the_cache_unauthenticated() {
        let authorizer = FakeAuthorizer::default();
        let r = rotation(2, MemoryCredentialStore::failing_save(), authorizer.clone()).await;

        let err = r.complete_authorization("code-a").await.unwrap_err();
        assert!(matches!(err, ConvertError::AuthFailure(_)), "{err}");
        assert!(err.to_string().contains("no space left on device"), "{err}");
        assert!(!r.has_refresh_credential().await);

        // nothing was installed, and there is nothing to refresh with either
        let err = r.ensure_destination_token().await.unwrap_err();
        assert!(matches!(err, ConvertError::AuthFailure(_)), "{err}");
        assert!(authorizer.refreshed_with().is_empty());
    }

    #[tokio::test]
    async fn consent_url_uses_active_identity() {
        let r = rotation(2, MemoryCredentialStore::default(), FakeAuthorizer::default()).await;
        assert!(r.authorize_url().await.unwrap().contains("default-client"));
        r.rotate().await;
        assert!(r.authorize_url().await.unwrap().contains("client-1"));
    }
}

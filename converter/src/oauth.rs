//! OAuth 2.0 plumbing for the YouTube (Google) write API.
//!
//! Every project carries its own OAuth client, so nothing here holds an identity: callers pass
//! the [`OAuthIdentity`] that is active at the time of the call. Token *state* lives in
//! [`crate::token::CachedToken`]; this module only performs the exchanges.

use eyre::Context;
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl, reqwest,
};
use std::future::Future;
use std::time::Duration;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth2 token endpoint used for both code exchange and token refresh
const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v3/token";

const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// One OAuth client registration (the top-level default one, or a project's).
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthIdentity {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl std::fmt::Debug for OAuthIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthIdentity")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

/// The useful parts of a token endpoint response.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<Duration>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

impl From<BasicTokenResponse> for IssuedToken {
    fn from(token: BasicTokenResponse) -> Self {
        Self {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|t| t.secret().to_string()),
            expires_in: token.expires_in(),
        }
    }
}

/// The three OAuth interactions the destination side needs.
pub trait Authorizer: Send + Sync {
    /// URL of the consent screen requesting offline access with the YouTube scope.
    fn authorize_url(&self, identity: &OAuthIdentity) -> eyre::Result<String>;

    /// Exchanges the code handed to the OAuth callback.
    fn exchange_code(
        &self,
        identity: &OAuthIdentity,
        code: &str,
    ) -> impl Future<Output = eyre::Result<IssuedToken>> + Send;

    /// Trades a stored refresh credential for a fresh access token.
    fn refresh(
        &self,
        identity: &OAuthIdentity,
        refresh_token: &str,
    ) -> impl Future<Output = eyre::Result<IssuedToken>> + Send;
}

/// [`Authorizer`] talking to Google's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(timeout: Duration) -> eyre::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self { http })
    }

    fn client(identity: &OAuthIdentity) -> eyre::Result<GoogleClient> {
        let redirect_url = RedirectUrl::new(identity.redirect_uri.clone())
            .with_context(|| format!("parse redirect uri {}", identity.redirect_uri))?;
        Ok(BasicClient::new(ClientId::new(identity.client_id.clone()))
            .set_client_secret(ClientSecret::new(identity.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(AUTH_URL.to_string()).context("authorization endpoint")?)
            .set_token_uri(TokenUrl::new(TOKEN_URL.to_string()).context("token endpoint")?)
            .set_redirect_uri(redirect_url))
    }
}

impl Authorizer for GoogleOAuth {
    fn authorize_url(&self, identity: &OAuthIdentity) -> eyre::Result<String> {
        let client = Self::client(identity)?;
        // The callback never checks state: it only ever deposits a refresh credential for
        // whichever identity is active.
        let (url, _csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(YOUTUBE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok(url.to_string())
    }

    #[tracing::instrument(skip(self, code), fields(client_id = %identity.client_id))]
    async fn exchange_code(
        &self,
        identity: &OAuthIdentity,
        code: &str,
    ) -> eyre::Result<IssuedToken> {
        let client = Self::client(identity)?;
        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .context("exchange authorization code with access token")?;
        tracing::debug!(
            has_refresh_token = token.refresh_token().is_some(),
            "authorization code exchanged"
        );
        Ok(token.into())
    }

    #[tracing::instrument(skip(self, refresh_token), fields(client_id = %identity.client_id))]
    async fn refresh(
        &self,
        identity: &OAuthIdentity,
        refresh_token: &str,
    ) -> eyre::Result<IssuedToken> {
        tracing::debug!("attempting to refresh OAuth token");
        let client = Self::client(identity)?;
        let refresh_token = RefreshToken::new(refresh_token.to_string());

        match client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
        {
            Ok(token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(token.into())
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(sr.error(), BasicErrorResponseType::InvalidGrant) =>
            {
                tracing::warn!("stored refresh credential rejected, run /auth again: {}", e);
                eyre::bail!("refresh credential considered invalid grant")
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

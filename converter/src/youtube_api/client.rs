//! Core YouTube API client: shared HTTP client and request plumbing.

use eyre::Context;
use http::Method;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

pub(crate) const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Client for the parts of the YouTube Data API v3 the converter needs.
///
/// The client holds no credentials. Searches are authorized with a project's API key and
/// writes with an OAuth access token, both supplied per call, because the active project can
/// change between any two calls.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    client: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(timeout: Duration) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build YouTube HTTP client")?;
        Ok(Self { client })
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Makes an OAuth-authorized request and fails on any non-success status.
    ///
    /// Returns the raw [`reqwest::Response`] for method-specific JSON parsing.
    #[instrument(skip(self, access_token, json_body), level = tracing::Level::TRACE)]
    pub(crate) async fn make_authenticated_request(
        &self,
        access_token: &str,
        method: Method,
        url: &str,
        query_params: Option<&[(&str, &str)]>,
        json_body: Option<&impl Serialize>,
    ) -> eyre::Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request = request.query(params);
        }

        if let Some(body) = json_body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("send {method} request to YouTube API: {url}"))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "YouTube API {} request failed with status {}: {}",
                method,
                status_code,
                error_text
            ));
        }

        Ok(response)
    }
}

//! HTTP surface: JSON routes for the browser front-end plus the OAuth hand-off.

use crate::builder::PlaylistWriter;
use crate::convert::{ConvertRequest, Converter};
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::error::ConvertError;
use crate::matcher::VideoSearch;
use crate::oauth::{Authorizer, GoogleOAuth};
use crate::spotify::{PlaylistSource, SpotifyClient};
use crate::youtube_api::YouTubeClient;
use bytes::Bytes;
use eyre::Context;
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{self, Body};
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Upper bound on a `/convert` body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub type LiveApp = App<YouTubeClient, YouTubeClient, FileCredentialStore, GoogleOAuth, SpotifyClient>;

pub struct App<V, W, S, A, R> {
    converter: Converter<V, W, S, A>,
    source: R,
}

impl<V, W, S, A, R> App<V, W, S, A, R>
where
    V: VideoSearch,
    W: PlaylistWriter,
    S: CredentialStore,
    A: Authorizer,
    R: PlaylistSource,
{
    pub fn new(converter: Converter<V, W, S, A>, source: R) -> Self {
        Self { converter, source }
    }

    pub fn converter(&self) -> &Converter<V, W, S, A> {
        &self.converter
    }

    /// Answers one request. Never fails: every error becomes a response.
    #[tracing::instrument(skip_all, fields(method = %req.method(), path = req.uri().path()))]
    pub async fn route<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let mut response = match (&method, path.as_str()) {
            (&Method::OPTIONS, _) => preflight(),
            (&Method::GET, "/health") => json_response(
                StatusCode::OK,
                &json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
            ),
            (&Method::GET, "/source/playlist" | "/spotify/playlist") => {
                self.source_playlist(query_param(&req, "id")).await
            }
            (&Method::POST, "/convert") => self.convert(req.into_body()).await,
            (&Method::GET, "/auth") => self.auth().await,
            (&Method::GET, "/oauth2callback") => {
                self.oauth_callback(query_param(&req, "code")).await
            }
            _ => json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not found." })),
        };
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        tracing::debug!(status = %response.status(), "request handled");
        response
    }

    async fn source_playlist(&self, id: Option<String>) -> Response<Full<Bytes>> {
        let Some(id) = id.filter(|id| !id.trim().is_empty()) else {
            return error_response(&ConvertError::InvalidInput("missing playlist id".into()));
        };
        match self.source.get_playlist(id.trim()).await {
            Ok(playlist) => json_response(StatusCode::OK, &playlist),
            Err(e) => error_response(&e),
        }
    }

    async fn convert<B>(&self, body: B) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let bytes = match Limited::new(body, MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                return error_response(&ConvertError::InvalidInput(format!(
                    "unreadable request body: {e}"
                )));
            }
        };
        let request: ConvertRequest = match serde_json::from_slice(&bytes) {
            Ok(request) => request,
            Err(e) => {
                return error_response(&ConvertError::InvalidInput(format!(
                    "malformed conversion request: {e}"
                )));
            }
        };

        match self.converter.convert(&request).await {
            Ok(converted) => json_response(StatusCode::OK, &converted),
            Err(e) => error_response(&e),
        }
    }

    async fn auth(&self) -> Response<Full<Bytes>> {
        match self.converter.rotation().authorize_url().await {
            Ok(url) => match HeaderValue::from_str(&url) {
                Ok(location) => {
                    let mut response = Response::new(Full::default());
                    *response.status_mut() = StatusCode::FOUND;
                    response.headers_mut().insert(header::LOCATION, location);
                    response
                }
                Err(e) => {
                    tracing::error!("consent url is not a valid header value: {}", e);
                    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Authorization failed.")
                }
            },
            Err(e) => {
                tracing::error!("failed to build consent url: {}", e);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Authorization failed.")
            }
        }
    }

    async fn oauth_callback(&self, code: Option<String>) -> Response<Full<Bytes>> {
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            return text_response(StatusCode::BAD_REQUEST, "Authorization code missing.");
        };
        match self.converter.rotation().complete_authorization(&code).await {
            Ok(slot) => {
                tracing::info!(%slot, "authorization completed");
                text_response(
                    StatusCode::OK,
                    "Authentication successful! You can close this window.",
                )
            }
            Err(e) => {
                tracing::error!("authorization callback failed: {}", e);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed.")
            }
        }
    }
}

fn query_param<B>(req: &Request<B>, name: &str) -> Option<String> {
    form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn json_response(status: StatusCode, body: &impl Serialize) -> Response<Full<Bytes>> {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("failed to serialize response body: {}", e);
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error.");
        }
    };
    let mut response = Response::new(Full::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn error_response(error: &ConvertError) -> Response<Full<Bytes>> {
    if error.status().is_server_error() {
        tracing::error!("request failed: {}", error);
    } else {
        tracing::warn!("request rejected: {}", error);
    }
    json_response(error.status(), &json!({ "error": error.public_message() }))
}

fn preflight() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::default());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// Accepts connections until the listener fails, serving each on its own task.
///
/// A conversion runs inside its request's task, so it is dropped if the client goes away.
pub async fn serve(app: Arc<LiveApp>, listener: TcpListener) -> eyre::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.context("accept connection")?;
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<body::Incoming>| {
                let app = Arc::clone(&app);
                async move { Ok::<_, Infallible>(app.route(req).await) }
            });
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(%peer, "connection ended with error: {}", e);
            }
        });
    }
}

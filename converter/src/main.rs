use eyre::Context;
use playlist_converter::config::Config;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let config = Config::from_env().context("load configuration")?;
    tracing::info!(projects = config.projects.len(), "configuration loaded");

    let app = Arc::new(playlist_converter::build_app(&config).await?);

    let listener = tokio::net::TcpListener::bind(config.server_address)
        .await
        .with_context(|| format!("bind to {}", config.server_address))?;
    let addr = listener.local_addr().context("get local address")?;
    tracing::info!("server is running on http://{addr}");

    if !app.converter().rotation().has_refresh_credential().await {
        let auth_url = format!("http://{addr}/auth");
        tracing::warn!("YouTube is not authorized yet, visit {auth_url}");
        if config.open_browser {
            if let Err(e) = webbrowser::open(&auth_url) {
                tracing::warn!("failed to open browser: {}", e);
            }
        }
    }

    tokio::select! {
        r = playlist_converter::server::serve(app, listener) => r,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

//! Router and server startup.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;

use super::proxy::{self, normalize_target};
use super::reload::{self, ReloadHub, CLIENT_SCRIPT_PATH, SOCKET_PATH};

/// Shared server state.
pub struct AppState {
    pub config: Arc<Config>,
    pub reload: ReloadHub,
    /// Base URL of the proxied site
    pub target: String,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Arc<Config>, reload: ReloadHub, target: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            config,
            reload,
            target: normalize_target(target),
            http,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(&state.config.build_root);
    Router::new()
        .route(SOCKET_PATH, get(reload::livereload_ws))
        .route(CLIENT_SCRIPT_PATH, get(reload::client_script))
        .nest_service("/assets", assets)
        .fallback(proxy::proxy_handler)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the live-reload server in front of `target`.
pub async fn serve(config: Arc<Config>, reload: ReloadHub, target: &str) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(Arc::clone(&config), reload, target)?);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "Live-reload server on http://{} proxying {}",
        addr,
        state.target
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

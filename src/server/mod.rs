// HTTP surface: health, metadata and download endpoints

pub mod error;
pub mod handlers;
pub mod stream;

use std::sync::Arc;

use axum::{
    http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH},
    routing::{get, post},
    Router,
};
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Settings;
use crate::downloader::tools::ToolInfo;
use crate::downloader::MediaProvider;

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub provider: Arc<dyn MediaProvider>,
    pub started_at: OffsetDateTime,
    pub tools: Arc<Vec<ToolInfo>>,
}

impl AppState {
    /// Checks tool versions once; health reports them from here.
    pub async fn new(settings: Settings, provider: Arc<dyn MediaProvider>) -> Self {
        let tools = handlers::detect_tools(&settings).await;
        for tool in &tools {
            match &tool.version {
                Some(version) => info!("{} {} ({})", tool.name, version, tool.path.as_deref().unwrap_or("?")),
                None => warn!("{} is not available", tool.name),
            }
        }

        Self {
            settings: Arc::new(settings),
            provider,
            started_at: OffsetDateTime::now_utc(),
            tools: Arc::new(tools),
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([CONTENT_LENGTH, CONTENT_DISPOSITION])
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/api/info", post(handlers::video_info))
        .route("/api/download", post(handlers::download))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let addr = state.settings.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        "Listening on {} (provider: {}, cookies: {})",
        listener.local_addr()?,
        state.provider.name(),
        state.settings.cookies_available
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
}

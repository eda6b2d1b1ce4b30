//! HTTP API server for Friday
//!
//! Routes live under `/api/v1`; `/health` sits at the root and the static
//! client, when configured, is the fallback.

mod chat;
mod documents;
mod error;
pub mod health;
pub mod websocket;

pub use error::ApiError;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::assistant::Assistant;
use crate::media::AudioStore;
use crate::voice::{FrameSource, SessionConfig, WakeWordProfile};

/// Default interval between heartbeat messages
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<Assistant>,
    /// Wake phrase used by every listen session
    pub profile: Arc<WakeWordProfile>,
    /// Audio input for listen sessions
    pub frame_source: Arc<dyn FrameSource>,
    /// Generated speech
    pub audio: AudioStore,
    /// Where uploaded documents are kept
    pub uploads_dir: PathBuf,
    pub session_config: SessionConfig,
    pub heartbeat_interval: Duration,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    assistant: Arc<Assistant>,
    profile: Arc<WakeWordProfile>,
    frame_source: Arc<dyn FrameSource>,
    audio: AudioStore,
    uploads_dir: PathBuf,
    port: u16,
    static_dir: Option<PathBuf>,
    session_config: SessionConfig,
    heartbeat_interval: Duration,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(
        assistant: Arc<Assistant>,
        profile: Arc<WakeWordProfile>,
        frame_source: Arc<dyn FrameSource>,
        audio: AudioStore,
        uploads_dir: PathBuf,
        port: u16,
    ) -> Self {
        Self {
            assistant,
            profile,
            frame_source,
            audio,
            uploads_dir,
            port,
            static_dir: None,
            session_config: SessionConfig::default(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    /// Serve static files from a directory
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Set listen session timing
    #[must_use]
    pub const fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Set the heartbeat interval
    #[must_use]
    pub const fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            assistant: self.assistant,
            profile: self.profile,
            frame_source: self.frame_source,
            audio: self.audio,
            uploads_dir: self.uploads_dir,
            session_config: self.session_config,
            heartbeat_interval: self.heartbeat_interval,
        });

        ApiServer {
            state,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let api = Router::new()
            .merge(health::status_router(self.state.clone()))
            .merge(documents::router(self.state.clone()))
            .merge(chat::router(self.state.clone()))
            .nest("/ws", websocket::router(self.state.clone()));

        let mut router = Router::new()
            .nest("/api/v1", api)
            .merge(health::router());

        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir)
                .not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the API server until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

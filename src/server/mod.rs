use crate::config::Config;
use crate::registry::StreamRegistry;
use crate::supervisor::TranscodeSupervisor;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod routes;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub registry: Arc<StreamRegistry>,
    /// Absent when serving without transcoding (e.g. in tests)
    pub supervisor: Option<Arc<TranscodeSupervisor>>,
}

impl AppContext {
    pub fn new(config: Config, supervisor: Option<Arc<TranscodeSupervisor>>) -> Self {
        let registry = match &supervisor {
            Some(s) => s.registry().clone(),
            None => Arc::new(StreamRegistry::from_config(&config.streams)),
        };
        Self {
            config: Arc::new(config),
            registry,
            supervisor,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    // Playlists and segments map 1:1 onto the supervisor's output tree
    let hls = ServeDir::new(ctx.registry.output_root());
    let prefix = ctx.registry.url_prefix().to_string();

    let mut app = Router::new()
        .route("/health", get(routes::health_check))
        .route("/streams", get(routes::list_streams))
        .route("/api/status", get(routes::supervisor_status))
        .nest_service(&prefix, hls)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Serve the dashboard bundle with SPA fallback
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        }
    }

    app
}

/// Serve HTTP until a shutdown signal arrives, then stop the transcoders.
pub async fn start_server(config: Config, supervisor: Option<Arc<TranscodeSupervisor>>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::new(config, supervisor.clone());
    let app = create_router(ctx, static_dir);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(supervisor) = supervisor {
        supervisor.shutdown().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

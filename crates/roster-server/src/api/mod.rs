//! HTTP surface: metric updates, upload events and health

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::db::MemberStore;
use crate::middleware;
use crate::pipeline::{Ingestor, Pipeline, Updater};

pub mod events;
pub mod members;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub updater: Arc<Updater>,
    pub members: Arc<dyn MemberStore>,
}

impl AppState {
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self {
            ingestor: pipeline.ingestor.clone(),
            updater: pipeline.updater.clone(),
            members: pipeline.backends.members.clone(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/members", any(members::member_metrics))
        .route("/events/object-created", post(events::object_created))
        .with_state(state)
        .layer(middleware::tracing_layer())
}

async fn health_check(State(state): State<AppState>) -> Response {
    match state.members.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "disconnected"
                })),
            )
                .into_response()
        }
    }
}

/// Serve until Ctrl+C or SIGTERM, then cancel `shutdown` so background
/// loops stop too.
pub async fn serve(
    router: Router,
    config: &ServerConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let token = shutdown.clone();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            token.cancel();
            info!("Waiting up to {} seconds for connections to close", grace.as_secs());
        })
        .into_future();

    let deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => {
            warn!("Connections still open after {} seconds, forcing shutdown", grace.as_secs());
        }
    }

    shutdown.cancel();
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

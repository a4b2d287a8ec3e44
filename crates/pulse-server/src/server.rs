//! `PulseServer`: Axum HTTP server over the snapshot store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use pulse_core::ConnectionState;
use pulse_engine::SnapshotStore;
use pulse_settings::ServerSettings;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::status::StatusResponse;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The snapshot both producers write through.
    pub store: Arc<SnapshotStore>,
    /// Push-channel state as published by the gateway client.
    pub connection: watch::Receiver<ConnectionState>,
    /// When the server started.
    pub start_time: Instant,
}

/// The status server.
pub struct PulseServer {
    settings: ServerSettings,
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
}

impl PulseServer {
    /// Create a server reading from `store` and reporting `connection`.
    pub fn new(
        settings: ServerSettings,
        store: Arc<SnapshotStore>,
        connection: watch::Receiver<ConnectionState>,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            settings,
            state: AppState {
                store,
                connection,
                start_time: Instant::now(),
            },
            shutdown,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(status_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown is signalled.
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "status server failed");
            }
            info!("status server stopped");
        });

        info!(%local_addr, "status server listening");
        Ok((local_addr, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server settings.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }
}

/// GET /api/status
///
/// An error snapshot is still a structured body, served with `500`.
async fn status_handler(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    let snapshot = state.store.current();
    let code = if snapshot.is_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    let connection = *state.connection.borrow();
    (code, Json(StatusResponse { snapshot, connection }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connection = *state.connection.borrow();
    Json(health::health_check(
        state.start_time,
        connection,
        state.store.version(),
    ))
}

//! HTTP server for recording beacons and querying active users.
//!
//! Routes:
//! - `GET /health`
//! - `POST /beacon` with `{key, time?, user_id, user_name}`
//! - `GET /active?key=..&time=..`
//!
//! `time` is RFC 3339 and defaults to the server's current time.

use crate::config::Config;
use crate::core::{ActiveUser, ActivityMonitor, MonitorError};
use crate::store::TimeSeriesStore;
use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Monitor settings
    pub config: Config,
    /// Store shared by every request
    pub store: Arc<dyn TimeSeriesStore>,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, config: Config, store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            port,
            config,
            store,
        }
    }
}

type SharedMonitor = Arc<ActivityMonitor<Arc<dyn TimeSeriesStore>>>;

/// Beacon request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconRequest {
    pub key: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    pub user_id: i32,
    #[serde(default)]
    pub user_name: String,
}

/// Active users query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveQuery {
    pub key: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

/// Active users response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveResponse {
    pub key: String,
    pub time: DateTime<Utc>,
    pub users: Vec<ActiveUser>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: MonitorError) -> ApiError {
    let (status, code) = match &e {
        MonitorError::EmptyKey => (StatusCode::BAD_REQUEST, "EMPTY_KEY"),
        MonitorError::TimeOutOfRange(_) => (StatusCode::BAD_REQUEST, "TIME_OUT_OF_RANGE"),
        MonitorError::StoreUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
        }
        MonitorError::BatchFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BATCH_FAILED"),
        MonitorError::Serialization(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
        }
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /beacon
async fn beacon(
    State(monitor): State<SharedMonitor>,
    Json(request): Json<BeaconRequest>,
) -> Result<StatusCode, ApiError> {
    let time = request.time.unwrap_or_else(Utc::now);
    monitor
        .beacon(&request.key, time, request.user_id, &request.user_name)
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /active
async fn active(
    State(monitor): State<SharedMonitor>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<ActiveResponse>, ApiError> {
    let time = query.time.unwrap_or_else(Utc::now);
    let mut users: Vec<ActiveUser> = monitor
        .get_all(&query.key, time)
        .map_err(api_error)?
        .into_iter()
        .collect();
    users.sort_by(|a, b| (a.id(), a.name()).cmp(&(b.id(), b.name())));

    Ok(Json(ActiveResponse {
        key: query.key,
        time,
        users,
    }))
}

/// Build the router for `monitor`.
pub fn router(monitor: SharedMonitor) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/beacon", post(beacon))
        .route("/active", get(active))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(monitor)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let monitor = Arc::new(ActivityMonitor::from_config(config.store, &config.config)?);
    let app = router(monitor);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Activity monitor listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

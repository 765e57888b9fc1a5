use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::header,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{require_basic_auth, Credentials};
use crate::config::{Config, ServerConfig};
use crate::database::{Database, Show, ShowSummary, SyncEvent};
use crate::error::TrackerResult;
use crate::metadata::TvdbClient;
use crate::stats::Progress;
use crate::tracker::Tracker;

/// Start the REST API server
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let db = Arc::new(Database::open(&config.database.path)?);
    let tvdb = TvdbClient::new(
        &config.tvdb.base_url,
        config.tvdb.api_key.clone(),
        config.tvdb.pin.clone(),
    )?;

    let state = ApiState {
        tracker: Arc::new(Tracker::new(db, tvdb)),
        credentials: Arc::new(Credentials::from_config(&config.auth)),
    };
    let app = create_router(state);

    let listener = bind_listener(&config.server).await?;
    info!("REST API server starting on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Bind the listen socket; `host` may be an IP address or a host name
pub async fn bind_listener(server: &ServerConfig) -> anyhow::Result<TcpListener> {
    TcpListener::bind((server.host.as_str(), server.port))
        .await
        .with_context(|| format!("bind {}:{}", server.host, server.port))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}

/// Shared application state accessible to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub tracker: Arc<Tracker>,
    pub credentials: Arc<Credentials>,
}

/// Response for `POST /sync`
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub episodes_added: usize,
}

/// Request body for `PUT /shows/:id`
#[derive(Debug, Serialize, Deserialize)]
pub struct AttachRequest {
    pub tvdb_id: i64,
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/sync", post(sync))
        .route("/shows/:id", put(attach_metadata))
        .route_layer(middleware::from_fn_with_state(
            state.credentials.clone(),
            require_basic_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/progress", get(progress))
        .route("/chart", get(chart))
        .route("/csv", get(csv))
        .route("/shows", get(list_shows))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run a tracker call on the blocking pool so SQLite work stays off the
/// async workers
async fn blocking<T, F>(state: &ApiState, f: F) -> TrackerResult<T>
where
    F: FnOnce(&Tracker) -> TrackerResult<T> + Send + 'static,
    T: Send + 'static,
{
    let tracker = state.tracker.clone();
    tokio::task::spawn_blocking(move || f(&tracker))
        .await
        .context("tracker task panicked")?
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn progress(State(state): State<ApiState>) -> TrackerResult<Json<Progress>> {
    Ok(Json(blocking(&state, |t| t.progress()).await?))
}

async fn chart(State(state): State<ApiState>) -> TrackerResult<impl IntoResponse> {
    let png = blocking(&state, |t| t.chart_png()).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

async fn csv(State(state): State<ApiState>) -> TrackerResult<impl IntoResponse> {
    let body = blocking(&state, |t| t.export_csv()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"episodes.csv\"",
            ),
        ],
        body,
    ))
}

async fn list_shows(State(state): State<ApiState>) -> TrackerResult<Json<Vec<ShowSummary>>> {
    Ok(Json(blocking(&state, |t| t.shows()).await?))
}

async fn sync(
    State(state): State<ApiState>,
    Json(events): Json<Vec<SyncEvent>>,
) -> TrackerResult<Json<SyncResponse>> {
    let episodes_added = blocking(&state, move |t| t.sync(&events)).await?;
    Ok(Json(SyncResponse { episodes_added }))
}

async fn attach_metadata(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(request): Json<AttachRequest>,
) -> TrackerResult<Json<Show>> {
    let show = state.tracker.attach_metadata(id, request.tvdb_id).await?;
    Ok(Json(show))
}

pub mod controller;
pub mod error;
pub mod geo;
pub mod indicators;
pub mod models;
pub mod notifier;
pub mod roles;
pub mod routes;
pub mod sink;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};

use crate::error::RouteLoadError;
use crate::models::{ApiError, RouteFile, RouteSummary};
use crate::routes::RouteCatalog;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RouteCatalog>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/routes", get(general_handler))
        .route("/api/routes/dijkstra", get(dijkstra_handler))
        .route("/api/routes/kruskal", get(kruskal_handler))
        .route("/api/routes/catalog", get(catalog_handler))
        .route("/api/routes/file/:name", get(route_file_handler))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

async fn general_handler(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    state.catalog.general().map(Json).map_err(|err| {
        tracing::error!("failed to load general routes: {err}");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "could not load routes")
    })
}

async fn dijkstra_handler(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    state.catalog.dijkstra().map(Json).map_err(|err| {
        tracing::error!("failed to load Dijkstra data: {err}");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "could not load Dijkstra data")
    })
}

async fn kruskal_handler(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    state.catalog.kruskal().map(Json).map_err(|err| {
        tracing::error!("failed to load Kruskal data: {err}");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "could not load Kruskal data")
    })
}

async fn catalog_handler(State(state): State<AppState>) -> ApiResult<Vec<RouteSummary>> {
    state.catalog.list().map(Json).map_err(route_error)
}

async fn route_file_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<RouteFile> {
    tracing::debug!("route file requested: {name}");
    state.catalog.load(&name).map(Json).map_err(route_error)
}

async fn not_found() -> (StatusCode, Json<ApiError>) {
    api_error(StatusCode::NOT_FOUND, "the requested path does not exist")
}

fn route_error(err: RouteLoadError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        RouteLoadError::NotFound(_) => StatusCode::NOT_FOUND,
        RouteLoadError::InvalidName(_) | RouteLoadError::TooShort(_) => StatusCode::BAD_REQUEST,
        RouteLoadError::Io(_) | RouteLoadError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("route catalog error: {err}");
    }
    api_error(status, err.to_string())
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            message: message.into(),
        }),
    )
}

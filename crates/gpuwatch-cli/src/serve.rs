use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use gpuwatch_common::ServerAddress;
use gpuwatch_poller::StatusAggregator;
use serde::Serialize;
use serde_json::json;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: StatusAggregator,
    pub servers: Arc<Vec<ServerAddress>>,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

pub fn router(st: AppState) -> Router {
    let api_routes = Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/status/:address", get(status_one))
        .with_state(st);

    Router::new().nest("/api", api_routes)
}

pub async fn run(st: AppState, listen_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, servers = st.servers.len(), "serving worker status");
    axum::serve(listener, router(st)).await?;
    Ok(())
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Every request triggers a fresh poll cycle.
pub async fn status(State(st): State<AppState>) -> impl IntoResponse {
    let statuses = st.aggregator.poll(&st.servers).await;
    Json(statuses)
}

pub async fn status_one(State(st): State<AppState>, Path(address): Path<String>) -> Response {
    let address = match ServerAddress::parse(&address) {
        Ok(a) => a,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "invalid_address", &e.to_string()),
    };
    if !st.servers.contains(&address) {
        return error_response(
            StatusCode::NOT_FOUND,
            "unknown_server",
            &format!("{address} is not in the configured server list"),
        );
    }
    Json(st.aggregator.poll_one(&address).await).into_response()
}

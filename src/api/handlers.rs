use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::ApiState;
use crate::location::Location;
use crate::services::{ServiceError, ServiceInstance};
use crate::state::NodeState;

const DEFAULT_PING_TTL: u32 = 128;

type ApiResult<T> = Result<T, (StatusCode, String)>;

#[derive(Serialize)]
pub struct Healthcheck {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
}

pub async fn healthcheck(State(state): State<ApiState>) -> Json<Healthcheck> {
    Json(Healthcheck {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn stop(State(state): State<ApiState>) -> StatusCode {
    tracing::info!("Shutdown requested through the API");
    state.shutdown.trigger();
    StatusCode::ACCEPTED
}

pub async fn get_state(State(state): State<ApiState>) -> Json<NodeState> {
    Json(state.state_keeper.get_state())
}

pub async fn get_location(State(state): State<ApiState>) -> ApiResult<Json<Location>> {
    state
        .location
        .location()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

pub async fn get_metrics(State(state): State<ApiState>) -> Result<String, StatusCode> {
    state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
pub struct StartServiceRequest {
    pub service_type: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct PingRequest {
    pub peer: SocketAddr,
    pub ttl: Option<u32>,
}

fn service_error(e: ServiceError) -> (StatusCode, String) {
    let status = match &e {
        ServiceError::AlreadyRunning(_) => StatusCode::CONFLICT,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    (status, e.to_string())
}

pub async fn list_services(State(state): State<ApiState>) -> Json<Vec<ServiceInstance>> {
    Json(state.services.list())
}

pub async fn start_service(
    State(state): State<ApiState>,
    Json(request): Json<StartServiceRequest>,
) -> ApiResult<(StatusCode, Json<ServiceInstance>)> {
    let instance = state
        .services
        .start(&request.service_type, request.options)
        .await
        .map_err(service_error)?;
    Ok((StatusCode::CREATED, Json(instance)))
}

pub async fn stop_service(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.stop(&id).await.map_err(service_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ping_peer(
    State(state): State<ApiState>,
    Json(request): Json<PingRequest>,
) -> ApiResult<StatusCode> {
    state
        .nat
        .ping_peer(request.peer, request.ttl.unwrap_or(DEFAULT_PING_TTL))
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

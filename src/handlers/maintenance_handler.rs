// src/handlers/maintenance_handler.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    errors::SirenError,
    models::maintenance::{MaintenanceCompletion, MaintenanceRequest},
    services::maintenance_service::MaintenanceOperations,
    state::AppState,
};

pub async fn schedule_maintenance(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MaintenanceRequest>,
) -> Result<impl IntoResponse, SirenError> {
    let record = state.maintenance_service.schedule(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_maintenance(
    State(state): State<Arc<AppState>>,
    Path(maintenance_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let record = state
        .maintenance_service
        .get_maintenance(&maintenance_id)
        .await?
        .ok_or_else(|| SirenError::MaintenanceNotFound(maintenance_id))?;
    Ok(Json(record))
}

pub async fn start_maintenance(
    State(state): State<Arc<AppState>>,
    Path(maintenance_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let record = state.maintenance_service.start(&maintenance_id).await?;
    Ok(Json(record))
}

pub async fn complete_maintenance(
    State(state): State<Arc<AppState>>,
    Path(maintenance_id): Path<String>,
    Json(completion): Json<MaintenanceCompletion>,
) -> Result<impl IntoResponse, SirenError> {
    let record = state
        .maintenance_service
        .complete(&maintenance_id, completion)
        .await?;
    Ok(Json(record))
}

pub async fn cancel_maintenance(
    State(state): State<Arc<AppState>>,
    Path(maintenance_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let record = state.maintenance_service.cancel(&maintenance_id).await?;
    Ok(Json(record))
}

pub async fn delete_maintenance(
    State(state): State<Arc<AppState>>,
    Path(maintenance_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    state
        .maintenance_service
        .delete_maintenance(&maintenance_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

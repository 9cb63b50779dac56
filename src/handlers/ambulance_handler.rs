// src/handlers/ambulance_handler.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    errors::SirenError,
    models::ambulance::{AmbulanceRegistration, AmbulanceStatus},
    services::{
        ambulance_service::AmbulanceOperations, maintenance_service::MaintenanceOperations,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct AmbulanceListQuery {
    pub status: Option<AmbulanceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveUpdate {
    pub active: bool,
}

pub async fn register_ambulance(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<AmbulanceRegistration>,
) -> Result<impl IntoResponse, SirenError> {
    let ambulance = state
        .ambulance_service
        .register_ambulance(registration)
        .await?;
    Ok((StatusCode::CREATED, Json(ambulance)))
}

pub async fn get_ambulance(
    State(state): State<Arc<AppState>>,
    Path(ambulance_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let ambulance = state
        .ambulance_service
        .get_ambulance(&ambulance_id)
        .await?
        .ok_or_else(|| SirenError::ambulance_not_found(&ambulance_id))?;
    Ok(Json(ambulance))
}

pub async fn list_ambulances(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AmbulanceListQuery>,
) -> Result<impl IntoResponse, SirenError> {
    let ambulances = state.ambulance_service.list_ambulances(query.status).await?;
    Ok(Json(ambulances))
}

pub async fn set_ambulance_active(
    State(state): State<Arc<AppState>>,
    Path(ambulance_id): Path<String>,
    Json(update): Json<ActiveUpdate>,
) -> Result<impl IntoResponse, SirenError> {
    let ambulance = state
        .ambulance_service
        .set_active(&ambulance_id, update.active)
        .await?;
    Ok(Json(ambulance))
}

pub async fn list_ambulance_maintenance(
    State(state): State<Arc<AppState>>,
    Path(ambulance_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let records = state
        .maintenance_service
        .get_maintenance_by_ambulance(&ambulance_id)
        .await?;
    Ok(Json(records))
}

pub async fn delete_ambulance(
    State(state): State<Arc<AppState>>,
    Path(ambulance_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    state.ambulance_service.delete_ambulance(&ambulance_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

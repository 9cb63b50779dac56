// src/handlers/driver_handler.rs
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
    models::driver::{DriverRegistration, DriverStatus},
    services::driver_service::DriverOperations,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct DriverListQuery {
    pub status: Option<DriverStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ShiftUpdate {
    pub on_shift: bool,
}

pub async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<DriverRegistration>,
) -> Result<impl IntoResponse, SirenError> {
    let driver = state.driver_service.register_driver(registration).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

pub async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let driver = state
        .driver_service
        .get_driver(&driver_id)
        .await?
        .ok_or_else(|| SirenError::driver_not_found(&driver_id))?;
    Ok(Json(driver))
}

pub async fn list_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DriverListQuery>,
) -> Result<impl IntoResponse, SirenError> {
    let drivers = state.driver_service.list_drivers(query.status).await?;
    Ok(Json(drivers))
}

pub async fn set_driver_shift(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
    Json(update): Json<ShiftUpdate>,
) -> Result<impl IntoResponse, SirenError> {
    let driver = state
        .driver_service
        .set_on_shift(&driver_id, update.on_shift)
        .await?;
    Ok(Json(driver))
}

pub async fn delete_driver(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    state.driver_service.delete_driver(&driver_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

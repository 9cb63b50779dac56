// src/handlers/booking_handler.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    errors::SirenError,
    models::booking::{
        AssignmentRequest, BookingFilter, BookingRequest, BookingStatusUpdate, CancelRequest,
    },
    services::{allocator_service::AllocatorOperations, booking_service::BookingOperations},
    state::AppState,
};

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookingRequest>,
) -> Result<impl IntoResponse, SirenError> {
    let booking = state.booking_service.create_booking(request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let booking = state
        .booking_service
        .get_booking(&booking_id)
        .await?
        .ok_or_else(|| SirenError::booking_not_found(&booking_id))?;
    Ok(Json(booking))
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse, SirenError> {
    let bookings = state.booking_service.list_bookings(filter).await?;
    Ok(Json(bookings))
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(update): Json<BookingStatusUpdate>,
) -> Result<impl IntoResponse, SirenError> {
    let booking = state
        .booking_service
        .update_status(&booking_id, update)
        .await?;
    Ok(Json(booking))
}

pub async fn assign_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(request): Json<AssignmentRequest>,
) -> Result<impl IntoResponse, SirenError> {
    let booking = state.allocator_service.assign(&booking_id, request).await?;
    Ok(Json(booking))
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<impl IntoResponse, SirenError> {
    let booking = state
        .booking_service
        .cancel_booking(&booking_id, request.reason)
        .await?;
    Ok(Json(booking))
}

pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    state.booking_service.delete_booking(&booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// src/handlers/payment_handler.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing;

use crate::{
    errors::SirenError,
    models::{
        booking::{BookingStatus, BookingStatusUpdate},
        payment::{PaymentRequest, PaymentResult, PaymentStatus, PaymentType},
    },
    services::{booking_service::BookingOperations, payment_service::PaymentOperations},
    state::AppState,
};

pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PaymentRequest>,
) -> Result<impl IntoResponse, SirenError> {
    let payment = state.payment_service.create_payment(request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let payment = state
        .payment_service
        .get_payment(&payment_id)
        .await?
        .ok_or_else(|| SirenError::PaymentNotFound(payment_id))?;
    Ok(Json(payment))
}

pub async fn list_booking_payments(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, SirenError> {
    let payments = state
        .payment_service
        .get_payments_by_booking(&booking_id)
        .await?;
    Ok(Json(payments))
}

/// Gateway callback. Records the outcome, then runs the alternate
/// confirmation path: a settled downpayment confirms a still-pending
/// booking. Bookings further along are left where they are.
pub async fn record_payment_result(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<String>,
    Json(result): Json<PaymentResult>,
) -> Result<impl IntoResponse, SirenError> {
    let payment = state
        .payment_service
        .record_payment_result(&payment_id, result)
        .await?;

    if payment.payment_type == PaymentType::Downpayment && payment.status == PaymentStatus::Paid {
        let confirm = state
            .booking_service
            .update_status(
                &payment.booking_id,
                BookingStatusUpdate {
                    status: BookingStatus::Confirmed,
                    cancel_reason: None,
                },
            )
            .await;
        match confirm {
            Ok(_) | Err(SirenError::InvalidTransition { .. }) => {}
            Err(e) => tracing::warn!(
                "Post-payment confirmation of booking {} failed: {}",
                payment.booking_id,
                e
            ),
        }
    }

    Ok(Json(payment))
}

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use siren_dispatch::{
    handlers::{
        ambulance_handler, booking_handler, driver_handler, maintenance_handler, payment_handler,
    },
    state::{AppConfig, AppState},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig {
        bind_addr: std::env::var("SIREN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        push_gateway_url: std::env::var("PUSH_GATEWAY_URL")
            .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".to_string()),
        push_api_key: std::env::var("PUSH_API_KEY").ok(),
        payment_expiry_hours: std::env::var("PAYMENT_EXPIRY_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24),
    };

    let app_state = Arc::new(AppState::new(config.clone()));

    let app = Router::new()
        .route(
            "/bookings",
            get(booking_handler::list_bookings).post(booking_handler::create_booking),
        )
        .route(
            "/bookings/:id",
            get(booking_handler::get_booking).delete(booking_handler::delete_booking),
        )
        .route("/bookings/:id/status", patch(booking_handler::update_booking_status))
        .route("/bookings/:id/assign", post(booking_handler::assign_booking))
        .route("/bookings/:id/cancel", post(booking_handler::cancel_booking))
        .route("/bookings/:id/payments", get(payment_handler::list_booking_payments))
        .route(
            "/ambulances",
            get(ambulance_handler::list_ambulances).post(ambulance_handler::register_ambulance),
        )
        .route(
            "/ambulances/:id",
            get(ambulance_handler::get_ambulance).delete(ambulance_handler::delete_ambulance),
        )
        .route(
            "/ambulances/:id/active",
            patch(ambulance_handler::set_ambulance_active),
        )
        .route(
            "/ambulances/:id/maintenance",
            get(ambulance_handler::list_ambulance_maintenance),
        )
        .route(
            "/drivers",
            get(driver_handler::list_drivers).post(driver_handler::register_driver),
        )
        .route(
            "/drivers/:id",
            get(driver_handler::get_driver).delete(driver_handler::delete_driver),
        )
        .route("/drivers/:id/shift", patch(driver_handler::set_driver_shift))
        .route("/maintenance", post(maintenance_handler::schedule_maintenance))
        .route(
            "/maintenance/:id",
            get(maintenance_handler::get_maintenance)
                .delete(maintenance_handler::delete_maintenance),
        )
        .route("/maintenance/:id/start", post(maintenance_handler::start_maintenance))
        .route(
            "/maintenance/:id/complete",
            post(maintenance_handler::complete_maintenance),
        )
        .route("/maintenance/:id/cancel", post(maintenance_handler::cancel_maintenance))
        .route("/payments", post(payment_handler::create_payment))
        .route("/payments/:id", get(payment_handler::get_payment))
        .route("/payments/:id/result", post(payment_handler::record_payment_result))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("siren-dispatch listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

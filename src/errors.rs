use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::booking::BookingStatus;

/// Main error type for the siren-dispatch service
#[derive(Debug)]
pub enum SirenError {
    // HTTP and API errors
    BadRequest(String),
    Conflict(String),
    InternalServer(String),
    NotFound(String),

    // Booking state machine
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    // Allocation and integrity
    ResourceUnavailable(String),
    ConstraintViolation(String),

    // Entity lookups
    BookingNotFound(String),
    AmbulanceNotFound(String),
    DriverNotFound(String),
    MaintenanceNotFound(String),
    PaymentNotFound(String),

    // Validation errors
    ValidationFailed(Vec<ValidationError>),
    MissingRequiredField(String),
    InvalidFieldValue {
        field: String,
        value: String,
        reason: String,
    },

    // Notification collaborator
    NotificationDelivery(String),

    // Network and HTTP client errors
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),

    // Serialization and parsing errors
    JsonParsing(String),
    JsonSerialization(String),
    InvalidFormat(String),

    // Configuration and setup errors
    ConfigurationError(String),
    MissingEnvironmentVariable(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl fmt::Display for SirenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SirenError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            SirenError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            SirenError::InternalServer(msg) => write!(f, "Internal server error: {}", msg),
            SirenError::NotFound(msg) => write!(f, "Not found: {}", msg),

            SirenError::InvalidTransition { from, to } => {
                write!(f, "Invalid booking transition: {} -> {}", from, to)
            }

            SirenError::ResourceUnavailable(msg) => write!(f, "Resource unavailable: {}", msg),
            SirenError::ConstraintViolation(msg) => write!(f, "Constraint violation: {}", msg),

            SirenError::BookingNotFound(id) => write!(f, "Booking not found: {}", id),
            SirenError::AmbulanceNotFound(id) => write!(f, "Ambulance not found: {}", id),
            SirenError::DriverNotFound(id) => write!(f, "Driver not found: {}", id),
            SirenError::MaintenanceNotFound(id) => write!(f, "Maintenance record not found: {}", id),
            SirenError::PaymentNotFound(id) => write!(f, "Payment not found: {}", id),

            SirenError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            SirenError::MissingRequiredField(field) => {
                write!(f, "Missing required field: {}", field)
            }
            SirenError::InvalidFieldValue {
                field,
                value,
                reason,
            } => {
                write!(f, "Invalid value '{}' for field '{}': {}", value, field, reason)
            }

            SirenError::NotificationDelivery(msg) => {
                write!(f, "Notification delivery failed: {}", msg)
            }

            SirenError::NetworkTimeout => write!(f, "Network request timed out"),
            SirenError::NetworkConnection(msg) => write!(f, "Network connection error: {}", msg),
            SirenError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),

            SirenError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),
            SirenError::JsonSerialization(msg) => write!(f, "JSON serialization error: {}", msg),
            SirenError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),

            SirenError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            SirenError::MissingEnvironmentVariable(var) => {
                write!(f, "Missing environment variable: {}", var)
            }
        }
    }
}

impl std::error::Error for SirenError {}

impl IntoResponse for SirenError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            SirenError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            SirenError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            SirenError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),

            SirenError::InvalidTransition { from, to } => (
                StatusCode::CONFLICT,
                "invalid_transition",
                format!("Booking cannot move from {} to {}", from, to),
                None,
            ),
            SirenError::ResourceUnavailable(msg) => {
                (StatusCode::CONFLICT, "resource_unavailable", msg, None)
            }
            SirenError::ConstraintViolation(msg) => {
                (StatusCode::CONFLICT, "constraint_violation", msg, None)
            }

            SirenError::BookingNotFound(id) => (
                StatusCode::NOT_FOUND,
                "booking_not_found",
                format!("Booking not found: {}", id),
                None,
            ),
            SirenError::AmbulanceNotFound(id) => (
                StatusCode::NOT_FOUND,
                "ambulance_not_found",
                format!("Ambulance not found: {}", id),
                None,
            ),
            SirenError::DriverNotFound(id) => (
                StatusCode::NOT_FOUND,
                "driver_not_found",
                format!("Driver not found: {}", id),
                None,
            ),
            SirenError::MaintenanceNotFound(id) => (
                StatusCode::NOT_FOUND,
                "maintenance_not_found",
                format!("Maintenance record not found: {}", id),
                None,
            ),
            SirenError::PaymentNotFound(id) => (
                StatusCode::NOT_FOUND,
                "payment_not_found",
                format!("Payment not found: {}", id),
                None,
            ),

            SirenError::ValidationFailed(errors) => {
                let details = serde_json::to_value(&errors).ok();
                (
                    StatusCode::BAD_REQUEST,
                    "validation_failed",
                    "Validation errors occurred".to_string(),
                    details,
                )
            }
            SirenError::MissingRequiredField(field) => (
                StatusCode::BAD_REQUEST,
                "missing_field",
                format!("Missing required field: {}", field),
                None,
            ),
            SirenError::InvalidFieldValue { field, reason, .. } => (
                StatusCode::BAD_REQUEST,
                "invalid_field",
                format!("Invalid value for {}: {}", field, reason),
                None,
            ),

            // All other errors are treated as internal server errors
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type SirenResult<T> = Result<T, SirenError>;

// Conversion implementations for common error types
impl From<reqwest::Error> for SirenError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SirenError::NetworkTimeout
        } else if err.is_connect() {
            SirenError::NetworkConnection(err.to_string())
        } else {
            SirenError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SirenError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() {
            SirenError::JsonParsing(err.to_string())
        } else {
            SirenError::JsonSerialization(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for SirenError {
    fn from(err: chrono::ParseError) -> Self {
        SirenError::InvalidFormat(format!("Invalid date/time format: {}", err))
    }
}

// Helper functions for creating common errors
impl SirenError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        SirenError::BadRequest(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        SirenError::NotFound(resource.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        SirenError::InternalServer(msg.into())
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        SirenError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn invalid_transition(from: BookingStatus, to: BookingStatus) -> Self {
        SirenError::InvalidTransition { from, to }
    }

    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        SirenError::ResourceUnavailable(msg.into())
    }

    pub fn constraint_violation(msg: impl Into<String>) -> Self {
        SirenError::ConstraintViolation(msg.into())
    }

    pub fn booking_not_found(id: impl Into<String>) -> Self {
        SirenError::BookingNotFound(id.into())
    }

    pub fn ambulance_not_found(id: impl Into<String>) -> Self {
        SirenError::AmbulanceNotFound(id.into())
    }

    pub fn driver_not_found(id: impl Into<String>) -> Self {
        SirenError::DriverNotFound(id.into())
    }
}

// src/services/notification_service.rs
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing;

use crate::{
    errors::SirenError as AppError,
    models::{booking::Booking, payment::Payment},
};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Push send failed: {0}")]
    PushError(String),

    #[error("Gateway rejected the message: {0}")]
    Rejected(String),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        AppError::NotificationDelivery(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub gateway_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Booking,
    Assignment,
    Payment,
    Maintenance,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Booking => "booking",
            NotificationCategory::Assignment => "assignment",
            NotificationCategory::Payment => "payment",
            NotificationCategory::Maintenance => "maintenance",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub related_id: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl NotificationMessage {
    pub fn new(title: &str, body: &str, category: NotificationCategory) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            category,
            related_id: None,
            data: None,
        }
    }

    pub fn with_related(mut self, related_id: &str) -> Self {
        self.related_id = Some(related_id.to_string());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Delivery and retry semantics live behind this trait; the core fires after
/// commit and never fails a transition over an undeliverable message.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_to_user(&self, user_id: &str, message: NotificationMessage)
        -> Result<(), AppError>;

    async fn notify_booking_status(&self, user_id: &str, booking: &Booking) -> Result<(), AppError> {
        let body = match booking.status {
            crate::models::booking::BookingStatus::Confirmed => {
                format!("Booking {} is confirmed", booking.code)
            }
            crate::models::booking::BookingStatus::Dispatched => {
                format!("An ambulance is on the way for booking {}", booking.code)
            }
            crate::models::booking::BookingStatus::Arrived => {
                format!("Your ambulance has arrived for booking {}", booking.code)
            }
            crate::models::booking::BookingStatus::InProgress => {
                format!("Transport under way for booking {}", booking.code)
            }
            crate::models::booking::BookingStatus::Completed => {
                format!("Booking {} is complete", booking.code)
            }
            crate::models::booking::BookingStatus::Cancelled => format!(
                "Booking {} was cancelled: {}",
                booking.code,
                booking.cancel_reason.as_deref().unwrap_or("no reason given")
            ),
            crate::models::booking::BookingStatus::Pending => {
                format!("Booking {} received", booking.code)
            }
        };

        let message = NotificationMessage::new("Booking update", &body, NotificationCategory::Booking)
            .with_related(&booking.id)
            .with_data(json!({
                "booking_id": booking.id,
                "code": booking.code,
                "status": booking.status.to_string(),
            }));

        self.send_to_user(user_id, message).await
    }

    async fn notify_assignment(
        &self,
        driver_user_id: &str,
        booking: &Booking,
    ) -> Result<(), AppError> {
        let message = NotificationMessage::new(
            "New dispatch assignment",
            &format!(
                "Pickup at {}, destination {} ({})",
                booking.pickup_address, booking.destination_address, booking.code
            ),
            NotificationCategory::Assignment,
        )
        .with_related(&booking.id)
        .with_data(json!({
            "booking_id": booking.id,
            "code": booking.code,
            "priority": booking.priority,
            "pickup_address": booking.pickup_address,
            "destination_address": booking.destination_address,
        }));

        self.send_to_user(driver_user_id, message).await
    }

    async fn notify_payment_received(
        &self,
        user_id: &str,
        payment: &Payment,
    ) -> Result<(), AppError> {
        let message = NotificationMessage::new(
            "Payment received",
            &format!(
                "We received your {} of {:.0}",
                payment.payment_type, payment.amount
            ),
            NotificationCategory::Payment,
        )
        .with_related(&payment.id)
        .with_data(json!({
            "payment_id": payment.id,
            "booking_id": payment.booking_id,
            "payment_type": payment.payment_type,
            "amount": payment.amount,
        }));

        self.send_to_user(user_id, message).await
    }
}

/// Push-gateway implementation. One POST per message; the gateway owns
/// fan-out to the user's devices.
pub struct PushNotificationService {
    config: PushConfig,
    client: reqwest::Client,
}

impl PushNotificationService {
    pub fn new(config: PushConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationService for PushNotificationService {
    async fn send_to_user(
        &self,
        user_id: &str,
        message: NotificationMessage,
    ) -> Result<(), AppError> {
        if user_id.is_empty() {
            return Err(NotificationError::Rejected("empty user id".to_string()).into());
        }

        tracing::info!("Sending push notification to user: {}", user_id);

        let mut payload = json!({
            "to": user_id,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "category": message.category.as_str(),
            "related_id": message.related_id,
        });

        if let Some(data) = message.data {
            payload["data"] = data;
        }

        let response = self
            .client
            .post(&self.config.gateway_url)
            .header("Authorization", format!("key={}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::PushError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Push gateway request failed: {}", error_text);
            return Err(NotificationError::Rejected(error_text).into());
        }

        tracing::debug!("Push notification sent successfully");
        Ok(())
    }
}

// Mock service for development and testing
#[derive(Debug)]
pub struct MockNotificationService;

#[async_trait]
impl NotificationService for MockNotificationService {
    async fn send_to_user(
        &self,
        user_id: &str,
        message: NotificationMessage,
    ) -> Result<(), AppError> {
        tracing::info!(
            "[MOCK] Would send to user {}: {} - {} ({})",
            user_id,
            message.title,
            message.body,
            message.category.as_str()
        );
        Ok(())
    }
}

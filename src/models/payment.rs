// src/models/payment.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Downpayment, // 30% advance, gates confirmation of non-emergency bookings
    FullPayment, // Single settlement for emergency bookings, post-service
    FinalPayment, // Remainder for non-emergency bookings, post-service
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentType::Downpayment => "downpayment",
            PaymentType::FullPayment => "full_payment",
            PaymentType::FinalPayment => "final_payment",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub payment_type: PaymentType,
    pub amount: f64,
    pub method: String, // Gateway channel name, opaque to the core
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub merchant_ref: String, // Our order reference quoted to the gateway
    pub provider_ref: Option<String>, // Gateway transaction reference
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// There is no background sweep; deadlines are applied when a payment is
    /// read. A pending payment past its deadline reads as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> PaymentStatus {
        match (self.status, self.expires_at) {
            (PaymentStatus::Pending, Some(deadline)) if now > deadline => PaymentStatus::Expired,
            (status, _) => status,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending
            && self.effective_status(now) == PaymentStatus::Expired
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: String,
    pub payment_type: PaymentType,
    pub method: String,
}

/// Gateway callback payload. The wire protocol (signatures, provider field
/// soup) is terminated before this point; the core only consumes the outcome.
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResult {
    pub status: PaymentStatus,
    pub provider_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub booking_id: String,
    pub payment_type: PaymentType,
    pub amount: f64,
    pub method: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub merchant_ref: String,
    pub provider_ref: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            booking_id: p.booking_id,
            payment_type: p.payment_type,
            amount: p.amount,
            method: p.method,
            status: p.status,
            paid_at: p.paid_at,
            expires_at: p.expires_at,
            merchant_ref: p.merchant_ref,
            provider_ref: p.provider_ref,
        }
    }
}

// src/models/booking.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::id_generator::generate_booking_code;

/// Share of the total collected up front for non-emergency bookings.
pub const DOWNPAYMENT_RATE: f64 = 0.30;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,    // Request received, no resources attached yet
    Confirmed,  // Ambulance + driver attached, or downpayment settled
    Dispatched, // Unit is on the way to the pickup point
    Arrived,    // Unit arrived at the pickup point
    InProgress, // Patient on board, transport under way
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// A booking in an active status holds its ambulance and driver.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed
                | BookingStatus::Dispatched
                | BookingStatus::Arrived
                | BookingStatus::InProgress
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Dispatched => "dispatched",
            BookingStatus::Arrived => "arrived",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Standard,  // Non-urgent transport, booked ahead or same day
    Emergency, // Immediate response, billed in full after service
    Scheduled, // Fixed pickup time agreed in advance
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingType::Standard => "standard",
            BookingType::Emergency => "emergency",
            BookingType::Scheduled => "scheduled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingPriority {
    Critical,
    Urgent,
    Normal,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    pub id: String,
    pub code: String, // Short human-readable reference for dispatch calls
    pub patient_id: String,
    pub booking_type: BookingType,
    pub priority: BookingPriority,
    pub status: BookingStatus,

    pub pickup_address: String,
    pub destination_address: String,
    pub contact_name: String,
    pub contact_phone: String,

    // Resource links. Weak references resolved through the entity store;
    // both set or both empty once the booking leaves pending.
    pub ambulance_id: Option<String>,
    pub driver_id: Option<String>,

    pub base_price: f64,
    pub total_amount: f64,
    pub downpayment_amount: f64,

    pub requested_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(request: BookingRequest, base_price: f64, total_amount: f64) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(), // Set by with_generated_id
            code: generate_booking_code(),
            patient_id: request.patient_id,
            booking_type: request.booking_type,
            priority: request.priority,
            status: BookingStatus::Pending,
            pickup_address: request.pickup_address,
            destination_address: request.destination_address,
            contact_name: request.contact_name,
            contact_phone: request.contact_phone,
            ambulance_id: None,
            driver_id: None,
            base_price,
            total_amount,
            downpayment_amount: downpayment_for(request.booking_type, total_amount),
            requested_at: now,
            scheduled_at: request.scheduled_at,
            dispatched_at: None,
            arrived_at: None,
            completed_at: None,
            cancel_reason: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_crew(&self) -> bool {
        self.ambulance_id.is_some() && self.driver_id.is_some()
    }
}

/// Emergency bookings carry no downpayment; everything else is 30% up front.
pub fn downpayment_for(booking_type: BookingType, total_amount: f64) -> f64 {
    match booking_type {
        BookingType::Emergency => 0.0,
        BookingType::Standard | BookingType::Scheduled => {
            (total_amount * DOWNPAYMENT_RATE).round()
        }
    }
}

// Request/Response Models
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingRequest {
    pub patient_id: String,
    pub booking_type: BookingType,
    pub priority: BookingPriority,
    pub pickup_address: String,
    pub destination_address: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: String,
    pub code: String,
    pub patient_id: String,
    pub booking_type: BookingType,
    pub priority: BookingPriority,
    pub status: BookingStatus,
    pub pickup_address: String,
    pub destination_address: String,
    pub ambulance_id: Option<String>,
    pub driver_id: Option<String>,
    pub base_price: f64,
    pub total_amount: f64,
    pub downpayment_amount: f64,
    pub requested_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            code: b.code,
            patient_id: b.patient_id,
            booking_type: b.booking_type,
            priority: b.priority,
            status: b.status,
            pickup_address: b.pickup_address,
            destination_address: b.destination_address,
            ambulance_id: b.ambulance_id,
            driver_id: b.driver_id,
            base_price: b.base_price,
            total_amount: b.total_amount,
            downpayment_amount: b.downpayment_amount,
            requested_at: b.requested_at,
            scheduled_at: b.scheduled_at,
            dispatched_at: b.dispatched_at,
            arrived_at: b.arrived_at,
            completed_at: b.completed_at,
            cancel_reason: b.cancel_reason,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingStatusUpdate {
    pub status: BookingStatus,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub ambulance_id: String,
    pub driver_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub patient_id: Option<String>,
}

// src/models/driver.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Available,
    Assigned, // Holds a confirmed booking, not yet dispatched
    Busy,     // Out on a dispatched booking
    Off,      // Off shift / leave
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverStatus::Available => "available",
            DriverStatus::Assigned => "assigned",
            DriverStatus::Busy => "busy",
            DriverStatus::Off => "off",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Driver {
    pub id: String,
    pub user_id: String, // Account the driver logs in and gets notified with
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub license_number: String, // Unique
    pub status: DriverStatus,
    // Vehicle currently in the driver's hands. Kept consistent with
    // booking-level assignment by the allocator; at most one driver per
    // ambulance at a time.
    pub ambulance_id: Option<String>,
    pub hired_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverRegistration {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub license_number: String,
    pub hired_at: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub license_number: String,
    pub status: DriverStatus,
    pub ambulance_id: Option<String>,
}

impl From<Driver> for DriverResponse {
    fn from(d: Driver) -> Self {
        Self {
            id: d.id,
            first_name: d.first_name,
            last_name: d.last_name,
            phone_number: d.phone_number,
            license_number: d.license_number,
            status: d.status,
            ambulance_id: d.ambulance_id,
        }
    }
}

// src/models/maintenance.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MaintenanceStatus {
    /// Open records keep the ambulance out of the allocatable pool.
    pub fn is_open(&self) -> bool {
        matches!(self, MaintenanceStatus::Scheduled | MaintenanceStatus::InProgress)
    }
}

impl fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MaintenanceStatus::Scheduled => "scheduled",
            MaintenanceStatus::InProgress => "in_progress",
            MaintenanceStatus::Completed => "completed",
            MaintenanceStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceType {
    Routine,
    Repair,
    Inspection,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Maintenance {
    pub id: String,
    pub code: String, // Workshop order reference, unique
    pub ambulance_id: String,
    pub maintenance_type: MaintenanceType,
    pub status: MaintenanceStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub cost: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub ambulance_id: String,
    pub maintenance_type: MaintenanceType,
    pub start_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaintenanceCompletion {
    pub cost: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaintenanceResponse {
    pub id: String,
    pub code: String,
    pub ambulance_id: String,
    pub maintenance_type: MaintenanceType,
    pub status: MaintenanceStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub cost: f64,
    pub notes: Option<String>,
}

impl From<Maintenance> for MaintenanceResponse {
    fn from(m: Maintenance) -> Self {
        Self {
            id: m.id,
            code: m.code,
            ambulance_id: m.ambulance_id,
            maintenance_type: m.maintenance_type,
            status: m.status,
            start_date: m.start_date,
            end_date: m.end_date,
            cost: m.cost,
            notes: m.notes,
        }
    }
}

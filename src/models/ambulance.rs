// src/models/ambulance.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AmbulanceStatus {
    Available,
    OnDuty,      // Attached to an active booking
    Maintenance, // Referenced by an open maintenance record
    Inactive,    // Pulled from the fleet (decommissioned, accident, audit)
}

impl fmt::Display for AmbulanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AmbulanceStatus::Available => "available",
            AmbulanceStatus::OnDuty => "on_duty",
            AmbulanceStatus::Maintenance => "maintenance",
            AmbulanceStatus::Inactive => "inactive",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AmbulanceClass {
    BasicLifeSupport,
    AdvancedLifeSupport,
    PatientTransport,
    NeonatalUnit,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Ambulance {
    pub id: String,
    pub registration_number: String, // Plate number, unique across the fleet
    pub class: AmbulanceClass,
    pub station_id: Option<String>,
    pub status: AmbulanceStatus,
    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AmbulanceRegistration {
    pub registration_number: String,
    pub class: AmbulanceClass,
    pub station_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AmbulanceResponse {
    pub id: String,
    pub registration_number: String,
    pub class: AmbulanceClass,
    pub station_id: Option<String>,
    pub status: AmbulanceStatus,
    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,
}

impl From<Ambulance> for AmbulanceResponse {
    fn from(a: Ambulance) -> Self {
        Self {
            id: a.id,
            registration_number: a.registration_number,
            class: a.class,
            station_id: a.station_id,
            status: a.status,
            last_maintenance_date: a.last_maintenance_date,
            next_maintenance_date: a.next_maintenance_date,
        }
    }
}

// src/services/entity_store.rs
use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{
    errors::SirenError as AppError,
    models::{
        ambulance::Ambulance,
        booking::Booking,
        driver::Driver,
        maintenance::Maintenance,
        payment::Payment,
    },
};

/// All durable records, keyed by entity id. Cross-entity links
/// (booking.ambulance_id and friends) are plain id strings resolved through
/// the lookup helpers below; the store owns every entity.
#[derive(Debug, Default, Clone)]
pub struct StoreInner {
    pub bookings: HashMap<String, Booking>,
    pub ambulances: HashMap<String, Ambulance>,
    pub drivers: HashMap<String, Driver>,
    pub maintenance: HashMap<String, Maintenance>,
    pub payments: HashMap<String, Payment>,
}

impl StoreInner {
    pub fn booking(&self, id: &str) -> Result<&Booking, AppError> {
        self.bookings
            .get(id)
            .ok_or_else(|| AppError::BookingNotFound(id.to_string()))
    }

    pub fn booking_mut(&mut self, id: &str) -> Result<&mut Booking, AppError> {
        self.bookings
            .get_mut(id)
            .ok_or_else(|| AppError::BookingNotFound(id.to_string()))
    }

    pub fn ambulance(&self, id: &str) -> Result<&Ambulance, AppError> {
        self.ambulances
            .get(id)
            .ok_or_else(|| AppError::AmbulanceNotFound(id.to_string()))
    }

    pub fn ambulance_mut(&mut self, id: &str) -> Result<&mut Ambulance, AppError> {
        self.ambulances
            .get_mut(id)
            .ok_or_else(|| AppError::AmbulanceNotFound(id.to_string()))
    }

    pub fn driver(&self, id: &str) -> Result<&Driver, AppError> {
        self.drivers
            .get(id)
            .ok_or_else(|| AppError::DriverNotFound(id.to_string()))
    }

    pub fn driver_mut(&mut self, id: &str) -> Result<&mut Driver, AppError> {
        self.drivers
            .get_mut(id)
            .ok_or_else(|| AppError::DriverNotFound(id.to_string()))
    }

    pub fn maintenance_record(&self, id: &str) -> Result<&Maintenance, AppError> {
        self.maintenance
            .get(id)
            .ok_or_else(|| AppError::MaintenanceNotFound(id.to_string()))
    }

    pub fn maintenance_record_mut(&mut self, id: &str) -> Result<&mut Maintenance, AppError> {
        self.maintenance
            .get_mut(id)
            .ok_or_else(|| AppError::MaintenanceNotFound(id.to_string()))
    }

    pub fn payment(&self, id: &str) -> Result<&Payment, AppError> {
        self.payments
            .get(id)
            .ok_or_else(|| AppError::PaymentNotFound(id.to_string()))
    }

    pub fn payment_mut(&mut self, id: &str) -> Result<&mut Payment, AppError> {
        self.payments
            .get_mut(id)
            .ok_or_else(|| AppError::PaymentNotFound(id.to_string()))
    }

    /// The active booking currently holding an ambulance, if any.
    /// `exclude` skips one booking id, used when re-checking exclusivity
    /// from inside an operation on that very booking.
    pub fn active_booking_for_ambulance(
        &self,
        ambulance_id: &str,
        exclude: Option<&str>,
    ) -> Option<&Booking> {
        self.bookings.values().find(|b| {
            b.status.is_active()
                && b.ambulance_id.as_deref() == Some(ambulance_id)
                && Some(b.id.as_str()) != exclude
        })
    }

    pub fn active_booking_for_driver(
        &self,
        driver_id: &str,
        exclude: Option<&str>,
    ) -> Option<&Booking> {
        self.bookings.values().find(|b| {
            b.status.is_active()
                && b.driver_id.as_deref() == Some(driver_id)
                && Some(b.id.as_str()) != exclude
        })
    }

    /// Open (scheduled or in-progress) maintenance record for an ambulance.
    /// Checked independently of the ambulance status column so a stale
    /// `available` can never let a vehicle in the workshop be allocated.
    pub fn open_maintenance_for(&self, ambulance_id: &str) -> Option<&Maintenance> {
        self.maintenance
            .values()
            .find(|m| m.ambulance_id == ambulance_id && m.status.is_open())
    }

    pub fn payments_for_booking(&self, booking_id: &str) -> Vec<&Payment> {
        let mut payments: Vec<&Payment> = self
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .collect();
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        payments
    }

    /// The driver whose vehicle link points at this ambulance, if any.
    pub fn driver_holding_ambulance(&self, ambulance_id: &str) -> Option<&Driver> {
        self.drivers
            .values()
            .find(|d| d.ambulance_id.as_deref() == Some(ambulance_id))
    }
}

/// Entity store with serializable mutations.
///
/// Every operation that reads availability and then writes new state runs
/// through [`EntityStore::transact`]: the closure works on a draft copy under
/// the single write lock, and the draft replaces the live state only when the
/// closure succeeds. Two overlapping assignments therefore serialize (first
/// writer wins, the second sees the committed state), and a failing operation
/// leaves nothing behind.
pub struct EntityStore {
    inner: RwLock<StoreInner>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub async fn transact<T>(
        &self,
        f: impl FnOnce(&mut StoreInner) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut guard = self.inner.write().await;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    pub async fn read<T>(&self, f: impl FnOnce(&StoreInner) -> T) -> T {
        let guard = self.inner.read().await;
        f(&guard)
    }

    pub async fn get_booking(&self, id: &str) -> Option<Booking> {
        self.read(|inner| inner.bookings.get(id).cloned()).await
    }

    pub async fn get_ambulance(&self, id: &str) -> Option<Ambulance> {
        self.read(|inner| inner.ambulances.get(id).cloned()).await
    }

    pub async fn get_driver(&self, id: &str) -> Option<Driver> {
        self.read(|inner| inner.drivers.get(id).cloned()).await
    }

    pub async fn get_maintenance(&self, id: &str) -> Option<Maintenance> {
        self.read(|inner| inner.maintenance.get(id).cloned()).await
    }

    pub async fn get_payment(&self, id: &str) -> Option<Payment> {
        self.read(|inner| inner.payments.get(id).cloned()).await
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

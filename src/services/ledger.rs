// src/services/ledger.rs
//
// Resource Status Ledger: the one place that writes Ambulance.status and
// Driver.status. The state machine, allocator and maintenance service call
// in from inside a store transaction; nothing else touches these columns.
use chrono::Utc;
use tracing;

use crate::{
    errors::SirenError as AppError,
    models::{ambulance::AmbulanceStatus, driver::DriverStatus},
    services::entity_store::StoreInner,
};

pub struct ResourceLedger;

impl ResourceLedger {
    /// Crew attached to a confirmed booking: vehicle goes on duty, driver is
    /// assigned (not yet rolling).
    pub fn mark_assigned(
        inner: &mut StoreInner,
        ambulance_id: &str,
        driver_id: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let ambulance = inner.ambulance_mut(ambulance_id)?;
        ambulance.status = AmbulanceStatus::OnDuty;
        ambulance.updated_at = now;

        let driver = inner.driver_mut(driver_id)?;
        driver.status = DriverStatus::Assigned;
        driver.updated_at = now;

        tracing::debug!("Ledger: {} on_duty, {} assigned", ambulance_id, driver_id);
        Ok(())
    }

    /// Booking dispatched: the driver is now busy.
    pub fn mark_dispatched(
        inner: &mut StoreInner,
        ambulance_id: &str,
        driver_id: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let ambulance = inner.ambulance_mut(ambulance_id)?;
        ambulance.status = AmbulanceStatus::OnDuty;
        ambulance.updated_at = now;

        let driver = inner.driver_mut(driver_id)?;
        driver.status = DriverStatus::Busy;
        driver.updated_at = now;

        tracing::debug!("Ledger: {} on_duty, {} busy", ambulance_id, driver_id);
        Ok(())
    }

    /// Booking-driven release on completion, cancellation or reassignment.
    ///
    /// Maintenance takes precedence: an ambulance sitting in the workshop
    /// keeps its `maintenance` status, and an `inactive` vehicle stays
    /// inactive. Likewise a driver who has gone off shift is not pulled back
    /// to `available`.
    pub fn release(inner: &mut StoreInner, ambulance_id: Option<&str>, driver_id: Option<&str>) {
        let now = Utc::now();

        if let Some(id) = ambulance_id {
            if let Some(ambulance) = inner.ambulances.get_mut(id) {
                if ambulance.status == AmbulanceStatus::OnDuty {
                    ambulance.status = AmbulanceStatus::Available;
                    ambulance.updated_at = now;
                    tracing::debug!("Ledger: {} released to available", id);
                } else {
                    tracing::debug!(
                        "Ledger: {} left as {} on release",
                        id,
                        ambulance.status
                    );
                }
            }
        }

        if let Some(id) = driver_id {
            if let Some(driver) = inner.drivers.get_mut(id) {
                if matches!(driver.status, DriverStatus::Assigned | DriverStatus::Busy) {
                    driver.status = DriverStatus::Available;
                    driver.updated_at = now;
                    tracing::debug!("Ledger: {} released to available", id);
                }
            }
        }
    }

    /// An open maintenance record now references the ambulance.
    pub fn begin_maintenance(inner: &mut StoreInner, ambulance_id: &str) -> Result<(), AppError> {
        let ambulance = inner.ambulance_mut(ambulance_id)?;
        ambulance.status = AmbulanceStatus::Maintenance;
        ambulance.updated_at = Utc::now();
        tracing::debug!("Ledger: {} into maintenance", ambulance_id);
        Ok(())
    }

    /// Maintenance closed out; the vehicle rejoins the pool unless something
    /// else claims it.
    pub fn end_maintenance(inner: &mut StoreInner, ambulance_id: &str) -> Result<(), AppError> {
        let held = inner
            .active_booking_for_ambulance(ambulance_id, None)
            .is_some();
        let ambulance = inner.ambulance_mut(ambulance_id)?;
        ambulance.status = if held {
            AmbulanceStatus::OnDuty
        } else {
            AmbulanceStatus::Available
        };
        ambulance.updated_at = Utc::now();
        tracing::debug!("Ledger: {} out of maintenance", ambulance_id);
        Ok(())
    }

    /// Admin pulls a vehicle from the fleet.
    pub fn deactivate_ambulance(inner: &mut StoreInner, ambulance_id: &str) -> Result<(), AppError> {
        let ambulance = inner.ambulance_mut(ambulance_id)?;
        ambulance.status = AmbulanceStatus::Inactive;
        ambulance.updated_at = Utc::now();
        Ok(())
    }

    pub fn reactivate_ambulance(inner: &mut StoreInner, ambulance_id: &str) -> Result<(), AppError> {
        let ambulance = inner.ambulance_mut(ambulance_id)?;
        ambulance.status = AmbulanceStatus::Available;
        ambulance.updated_at = Utc::now();
        Ok(())
    }

    pub fn driver_off_shift(inner: &mut StoreInner, driver_id: &str) -> Result<(), AppError> {
        let driver = inner.driver_mut(driver_id)?;
        driver.status = DriverStatus::Off;
        driver.updated_at = Utc::now();
        Ok(())
    }

    pub fn driver_on_shift(inner: &mut StoreInner, driver_id: &str) -> Result<(), AppError> {
        let driver = inner.driver_mut(driver_id)?;
        driver.status = DriverStatus::Available;
        driver.updated_at = Utc::now();
        Ok(())
    }
}

// src/services/ambulance_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::SirenError as AppError,
    models::ambulance::{Ambulance, AmbulanceRegistration, AmbulanceResponse, AmbulanceStatus},
    services::{entity_store::EntityStore, ledger::ResourceLedger},
    utils::id_generator::{IdGenerator, IdType, WithGeneratedId},
};

#[async_trait]
pub trait AmbulanceOperations: Send + Sync {
    async fn register_ambulance(
        &self,
        registration: AmbulanceRegistration,
    ) -> Result<AmbulanceResponse, AppError>;
    async fn get_ambulance(&self, ambulance_id: &str)
        -> Result<Option<AmbulanceResponse>, AppError>;
    async fn list_ambulances(
        &self,
        status: Option<AmbulanceStatus>,
    ) -> Result<Vec<AmbulanceResponse>, AppError>;
    async fn set_active(
        &self,
        ambulance_id: &str,
        active: bool,
    ) -> Result<AmbulanceResponse, AppError>;
    async fn delete_ambulance(&self, ambulance_id: &str) -> Result<(), AppError>;
}

pub struct AmbulanceService {
    store: Arc<EntityStore>,
}

impl AmbulanceService {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AmbulanceOperations for AmbulanceService {
    async fn register_ambulance(
        &self,
        registration: AmbulanceRegistration,
    ) -> Result<AmbulanceResponse, AppError> {
        tracing::info!("Registering ambulance: {}", registration.registration_number);

        if registration.registration_number.trim().is_empty() {
            return Err(AppError::validation_error(
                "registration_number",
                "Registration number is required",
            ));
        }

        let ambulance = self
            .store
            .transact(|inner| {
                let duplicate = inner
                    .ambulances
                    .values()
                    .any(|a| a.registration_number == registration.registration_number);
                if duplicate {
                    return Err(AppError::constraint_violation(format!(
                        "registration number {} is already in the fleet",
                        registration.registration_number
                    )));
                }

                let now = Utc::now();
                let ambulance = Ambulance {
                    id: String::new(),
                    registration_number: registration.registration_number.clone(),
                    class: registration.class,
                    station_id: registration.station_id.clone(),
                    status: AmbulanceStatus::Available,
                    last_maintenance_date: None,
                    next_maintenance_date: None,
                    created_at: now,
                    updated_at: now,
                }
                .with_generated_id(IdType::Ambulance);

                inner.ambulances.insert(ambulance.id.clone(), ambulance.clone());
                Ok(ambulance)
            })
            .await?;

        tracing::info!("Ambulance registered successfully: {}", ambulance.id);
        Ok(ambulance.into())
    }

    async fn get_ambulance(
        &self,
        ambulance_id: &str,
    ) -> Result<Option<AmbulanceResponse>, AppError> {
        if !IdGenerator::validate_id(ambulance_id, Some(IdType::Ambulance)) {
            tracing::warn!("Invalid ambulance ID format: {}", ambulance_id);
            return Ok(None);
        }
        Ok(self.store.get_ambulance(ambulance_id).await.map(Into::into))
    }

    async fn list_ambulances(
        &self,
        status: Option<AmbulanceStatus>,
    ) -> Result<Vec<AmbulanceResponse>, AppError> {
        let mut ambulances = self
            .store
            .read(|inner| {
                inner
                    .ambulances
                    .values()
                    .filter(|a| status.map_or(true, |s| a.status == s))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        ambulances.sort_by(|a, b| a.registration_number.cmp(&b.registration_number));
        Ok(ambulances.into_iter().map(Into::into).collect())
    }

    async fn set_active(
        &self,
        ambulance_id: &str,
        active: bool,
    ) -> Result<AmbulanceResponse, AppError> {
        tracing::info!("Setting ambulance {} active={}", ambulance_id, active);

        let ambulance = self
            .store
            .transact(|inner| {
                let ambulance = inner.ambulance(ambulance_id)?.clone();

                if active {
                    if ambulance.status != AmbulanceStatus::Inactive {
                        return Ok(ambulance); // Already in service
                    }
                    ResourceLedger::reactivate_ambulance(inner, ambulance_id)?;
                } else {
                    if let Some(booking) = inner.active_booking_for_ambulance(ambulance_id, None) {
                        return Err(AppError::constraint_violation(format!(
                            "ambulance {} is held by active booking {}",
                            ambulance_id, booking.id
                        )));
                    }
                    if let Some(order) = inner.open_maintenance_for(ambulance_id) {
                        return Err(AppError::constraint_violation(format!(
                            "ambulance {} has open maintenance order {}",
                            ambulance_id, order.code
                        )));
                    }
                    ResourceLedger::deactivate_ambulance(inner, ambulance_id)?;
                }
                Ok(inner.ambulance(ambulance_id)?.clone())
            })
            .await?;

        Ok(ambulance.into())
    }

    async fn delete_ambulance(&self, ambulance_id: &str) -> Result<(), AppError> {
        if !IdGenerator::validate_id(ambulance_id, Some(IdType::Ambulance)) {
            return Err(AppError::validation_error(
                "ambulance_id",
                "Invalid ambulance ID format",
            ));
        }

        self.store
            .transact(|inner| {
                inner.ambulance(ambulance_id)?;
                if let Some(booking) = inner.active_booking_for_ambulance(ambulance_id, None) {
                    return Err(AppError::constraint_violation(format!(
                        "ambulance {} is held by active booking {}",
                        ambulance_id, booking.id
                    )));
                }
                if let Some(order) = inner.open_maintenance_for(ambulance_id) {
                    return Err(AppError::constraint_violation(format!(
                        "ambulance {} has open maintenance order {}",
                        ambulance_id, order.code
                    )));
                }
                if let Some(driver) = inner.driver_holding_ambulance(ambulance_id) {
                    return Err(AppError::constraint_violation(format!(
                        "ambulance {} is linked to driver {}",
                        ambulance_id, driver.id
                    )));
                }
                inner.ambulances.remove(ambulance_id);
                Ok(())
            })
            .await?;

        tracing::info!("Ambulance deleted: {}", ambulance_id);
        Ok(())
    }
}

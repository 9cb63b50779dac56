// src/services/driver_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::SirenError as AppError,
    models::driver::{Driver, DriverRegistration, DriverResponse, DriverStatus},
    services::{entity_store::EntityStore, ledger::ResourceLedger},
    utils::id_generator::{IdGenerator, IdType, WithGeneratedId},
};

#[async_trait]
pub trait DriverOperations: Send + Sync {
    async fn register_driver(
        &self,
        registration: DriverRegistration,
    ) -> Result<DriverResponse, AppError>;
    async fn get_driver(&self, driver_id: &str) -> Result<Option<DriverResponse>, AppError>;
    async fn list_drivers(
        &self,
        status: Option<DriverStatus>,
    ) -> Result<Vec<DriverResponse>, AppError>;
    async fn set_on_shift(&self, driver_id: &str, on_shift: bool)
        -> Result<DriverResponse, AppError>;
    async fn delete_driver(&self, driver_id: &str) -> Result<(), AppError>;
}

pub struct DriverService {
    store: Arc<EntityStore>,
}

impl DriverService {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DriverOperations for DriverService {
    async fn register_driver(
        &self,
        registration: DriverRegistration,
    ) -> Result<DriverResponse, AppError> {
        tracing::info!("Registering driver: {} {}", registration.first_name, registration.last_name);

        if registration.license_number.trim().is_empty() {
            return Err(AppError::validation_error(
                "license_number",
                "License number is required",
            ));
        }

        let driver = self
            .store
            .transact(|inner| {
                let duplicate = inner
                    .drivers
                    .values()
                    .any(|d| d.license_number == registration.license_number);
                if duplicate {
                    return Err(AppError::constraint_violation(format!(
                        "license number {} is already registered",
                        registration.license_number
                    )));
                }

                let now = Utc::now();
                let driver = Driver {
                    id: String::new(),
                    user_id: registration.user_id.clone(),
                    first_name: registration.first_name.clone(),
                    last_name: registration.last_name.clone(),
                    phone_number: registration.phone_number.clone(),
                    license_number: registration.license_number.clone(),
                    status: DriverStatus::Off, // New hires come on shift explicitly
                    ambulance_id: None,
                    hired_at: registration.hired_at,
                    created_at: now,
                    updated_at: now,
                }
                .with_generated_id(IdType::Driver);

                inner.drivers.insert(driver.id.clone(), driver.clone());
                Ok(driver)
            })
            .await?;

        tracing::info!("Driver registered successfully: {}", driver.id);
        Ok(driver.into())
    }

    async fn get_driver(&self, driver_id: &str) -> Result<Option<DriverResponse>, AppError> {
        if !IdGenerator::validate_id(driver_id, Some(IdType::Driver)) {
            tracing::warn!("Invalid driver ID format: {}", driver_id);
            return Ok(None);
        }
        Ok(self.store.get_driver(driver_id).await.map(Into::into))
    }

    async fn list_drivers(
        &self,
        status: Option<DriverStatus>,
    ) -> Result<Vec<DriverResponse>, AppError> {
        let mut drivers = self
            .store
            .read(|inner| {
                inner
                    .drivers
                    .values()
                    .filter(|d| status.map_or(true, |s| d.status == s))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        drivers.sort_by(|a, b| a.last_name.cmp(&b.last_name));
        Ok(drivers.into_iter().map(Into::into).collect())
    }

    async fn set_on_shift(
        &self,
        driver_id: &str,
        on_shift: bool,
    ) -> Result<DriverResponse, AppError> {
        tracing::info!("Setting driver {} on_shift={}", driver_id, on_shift);

        let driver = self
            .store
            .transact(|inner| {
                let driver = inner.driver(driver_id)?.clone();

                if on_shift {
                    if driver.status != DriverStatus::Off {
                        return Ok(driver); // Already on shift in some form
                    }
                    ResourceLedger::driver_on_shift(inner, driver_id)?;
                } else {
                    if let Some(booking) = inner.active_booking_for_driver(driver_id, None) {
                        return Err(AppError::constraint_violation(format!(
                            "driver {} is held by active booking {}",
                            driver_id, booking.id
                        )));
                    }
                    ResourceLedger::driver_off_shift(inner, driver_id)?;
                }
                Ok(inner.driver(driver_id)?.clone())
            })
            .await?;

        Ok(driver.into())
    }

    async fn delete_driver(&self, driver_id: &str) -> Result<(), AppError> {
        if !IdGenerator::validate_id(driver_id, Some(IdType::Driver)) {
            return Err(AppError::validation_error(
                "driver_id",
                "Invalid driver ID format",
            ));
        }

        self.store
            .transact(|inner| {
                inner.driver(driver_id)?;
                if let Some(booking) = inner.active_booking_for_driver(driver_id, None) {
                    return Err(AppError::constraint_violation(format!(
                        "driver {} is held by active booking {}",
                        driver_id, booking.id
                    )));
                }
                inner.drivers.remove(driver_id);
                Ok(())
            })
            .await?;

        tracing::info!("Driver deleted: {}", driver_id);
        Ok(())
    }
}

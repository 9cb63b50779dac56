// src/services/maintenance_service.rs
use async_trait::async_trait;
use chrono::{Months, Utc};
use std::sync::Arc;
use tracing;

use crate::{
    errors::SirenError as AppError,
    models::{
        ambulance::AmbulanceStatus,
        maintenance::{
            Maintenance, MaintenanceCompletion, MaintenanceRequest, MaintenanceResponse,
            MaintenanceStatus,
        },
    },
    services::{entity_store::EntityStore, ledger::ResourceLedger},
    utils::id_generator::{generate_work_order_code, IdGenerator, IdType, WithGeneratedId},
};

/// Fixed service interval: a completed workshop visit books the next one
/// three months out.
const SERVICE_INTERVAL_MONTHS: u32 = 3;

#[async_trait]
pub trait MaintenanceOperations: Send + Sync {
    async fn schedule(&self, request: MaintenanceRequest) -> Result<MaintenanceResponse, AppError>;
    async fn start(&self, maintenance_id: &str) -> Result<MaintenanceResponse, AppError>;
    async fn complete(
        &self,
        maintenance_id: &str,
        completion: MaintenanceCompletion,
    ) -> Result<MaintenanceResponse, AppError>;
    async fn cancel(&self, maintenance_id: &str) -> Result<MaintenanceResponse, AppError>;
    async fn get_maintenance(
        &self,
        maintenance_id: &str,
    ) -> Result<Option<MaintenanceResponse>, AppError>;
    async fn get_maintenance_by_ambulance(
        &self,
        ambulance_id: &str,
    ) -> Result<Vec<MaintenanceResponse>, AppError>;
    async fn delete_maintenance(&self, maintenance_id: &str) -> Result<(), AppError>;
}

pub struct MaintenanceService {
    store: Arc<EntityStore>,
}

impl MaintenanceService {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MaintenanceOperations for MaintenanceService {
    async fn schedule(&self, request: MaintenanceRequest) -> Result<MaintenanceResponse, AppError> {
        if !IdGenerator::validate_id(&request.ambulance_id, Some(IdType::Ambulance)) {
            return Err(AppError::validation_error(
                "ambulance_id",
                "Invalid ambulance ID format",
            ));
        }

        tracing::info!(
            "Scheduling {:?} maintenance for ambulance {}",
            request.maintenance_type,
            request.ambulance_id
        );

        let record = self
            .store
            .transact(|inner| {
                let ambulance = inner.ambulance(&request.ambulance_id)?;

                // One open workshop order per vehicle.
                if let Some(existing) = inner.open_maintenance_for(&request.ambulance_id) {
                    return Err(AppError::constraint_violation(format!(
                        "ambulance {} already has open maintenance order {}",
                        request.ambulance_id, existing.code
                    )));
                }
                // A vehicle on a live booking cannot be pulled into the shop.
                if let Some(booking) =
                    inner.active_booking_for_ambulance(&request.ambulance_id, None)
                {
                    return Err(AppError::constraint_violation(format!(
                        "ambulance {} is held by active booking {}",
                        request.ambulance_id, booking.id
                    )));
                }
                if ambulance.status == AmbulanceStatus::Inactive {
                    return Err(AppError::constraint_violation(format!(
                        "ambulance {} is inactive",
                        request.ambulance_id
                    )));
                }

                let now = Utc::now();
                let record = Maintenance {
                    id: String::new(),
                    code: generate_work_order_code(),
                    ambulance_id: request.ambulance_id.clone(),
                    maintenance_type: request.maintenance_type,
                    status: MaintenanceStatus::Scheduled,
                    start_date: request.start_date,
                    end_date: None,
                    cost: 0.0,
                    notes: request.notes.clone(),
                    created_at: now,
                    updated_at: now,
                }
                .with_generated_id(IdType::Maintenance);

                ResourceLedger::begin_maintenance(inner, &request.ambulance_id)?;
                inner.maintenance.insert(record.id.clone(), record.clone());
                Ok(record)
            })
            .await?;

        tracing::info!("Maintenance scheduled: {} ({})", record.id, record.code);
        Ok(record.into())
    }

    async fn start(&self, maintenance_id: &str) -> Result<MaintenanceResponse, AppError> {
        tracing::info!("Starting maintenance: {}", maintenance_id);

        let record = self
            .store
            .transact(|inner| {
                let record = inner.maintenance_record_mut(maintenance_id)?;
                if record.status != MaintenanceStatus::Scheduled {
                    return Err(AppError::Conflict(format!(
                        "maintenance {} is {}, expected scheduled",
                        maintenance_id, record.status
                    )));
                }
                record.status = MaintenanceStatus::InProgress;
                record.updated_at = Utc::now();
                Ok(record.clone())
            })
            .await?;

        Ok(record.into())
    }

    async fn complete(
        &self,
        maintenance_id: &str,
        completion: MaintenanceCompletion,
    ) -> Result<MaintenanceResponse, AppError> {
        tracing::info!("Completing maintenance: {}", maintenance_id);

        let record = self
            .store
            .transact(|inner| {
                let current = inner.maintenance_record(maintenance_id)?.clone();
                if current.status != MaintenanceStatus::InProgress {
                    return Err(AppError::Conflict(format!(
                        "maintenance {} is {}, expected in_progress",
                        maintenance_id, current.status
                    )));
                }

                let now = Utc::now();
                let today = now.date_naive();

                let record = inner.maintenance_record_mut(maintenance_id)?;
                record.status = MaintenanceStatus::Completed;
                record.end_date = Some(today);
                record.cost = completion.cost;
                if completion.notes.is_some() {
                    record.notes = completion.notes.clone();
                }
                record.updated_at = now;
                let record = record.clone();

                let ambulance = inner.ambulance_mut(&record.ambulance_id)?;
                ambulance.last_maintenance_date = Some(today);
                ambulance.next_maintenance_date =
                    today.checked_add_months(Months::new(SERVICE_INTERVAL_MONTHS));

                ResourceLedger::end_maintenance(inner, &record.ambulance_id)?;
                Ok(record)
            })
            .await?;

        tracing::info!(
            "Maintenance completed: {} - {:.0} cost, ambulance {} back in pool",
            record.id,
            record.cost,
            record.ambulance_id
        );
        Ok(record.into())
    }

    async fn cancel(&self, maintenance_id: &str) -> Result<MaintenanceResponse, AppError> {
        tracing::info!("Cancelling maintenance: {}", maintenance_id);

        let record = self
            .store
            .transact(|inner| {
                let current = inner.maintenance_record(maintenance_id)?.clone();
                if !current.status.is_open() {
                    return Err(AppError::Conflict(format!(
                        "maintenance {} is already {}",
                        maintenance_id, current.status
                    )));
                }

                let record = inner.maintenance_record_mut(maintenance_id)?;
                record.status = MaintenanceStatus::Cancelled;
                record.updated_at = Utc::now();
                let record = record.clone();

                ResourceLedger::end_maintenance(inner, &record.ambulance_id)?;
                Ok(record)
            })
            .await?;

        Ok(record.into())
    }

    async fn get_maintenance(
        &self,
        maintenance_id: &str,
    ) -> Result<Option<MaintenanceResponse>, AppError> {
        if !IdGenerator::validate_id(maintenance_id, Some(IdType::Maintenance)) {
            tracing::warn!("Invalid maintenance ID format: {}", maintenance_id);
            return Ok(None);
        }
        Ok(self.store.get_maintenance(maintenance_id).await.map(Into::into))
    }

    async fn get_maintenance_by_ambulance(
        &self,
        ambulance_id: &str,
    ) -> Result<Vec<MaintenanceResponse>, AppError> {
        let mut records = self
            .store
            .read(|inner| {
                inner
                    .maintenance
                    .values()
                    .filter(|m| m.ambulance_id == ambulance_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn delete_maintenance(&self, maintenance_id: &str) -> Result<(), AppError> {
        self.store
            .transact(|inner| {
                let record = inner.maintenance_record(maintenance_id)?.clone();
                if record.status == MaintenanceStatus::InProgress {
                    return Err(AppError::constraint_violation(format!(
                        "maintenance {} is in progress on ambulance {}",
                        maintenance_id, record.ambulance_id
                    )));
                }
                inner.maintenance.remove(maintenance_id);
                // Removing a still-scheduled order frees the vehicle.
                if record.status == MaintenanceStatus::Scheduled {
                    ResourceLedger::end_maintenance(inner, &record.ambulance_id)?;
                }
                Ok(())
            })
            .await?;

        tracing::info!("Maintenance deleted: {}", maintenance_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ambulance::{Ambulance, AmbulanceClass};
    use crate::models::maintenance::MaintenanceType;

    fn test_service() -> MaintenanceService {
        MaintenanceService::new(Arc::new(EntityStore::new()))
    }

    async fn seed_ambulance(service: &MaintenanceService, status: AmbulanceStatus) -> String {
        let now = Utc::now();
        let ambulance = Ambulance {
            id: IdGenerator::generate(IdType::Ambulance),
            registration_number: "B 4521 AMB".to_string(),
            class: AmbulanceClass::AdvancedLifeSupport,
            station_id: None,
            status,
            last_maintenance_date: None,
            next_maintenance_date: None,
            created_at: now,
            updated_at: now,
        };
        let id = ambulance.id.clone();
        service
            .store
            .transact(move |inner| {
                inner.ambulances.insert(ambulance.id.clone(), ambulance.clone());
                Ok(())
            })
            .await
            .unwrap();
        id
    }

    fn request_for(ambulance_id: &str) -> MaintenanceRequest {
        MaintenanceRequest {
            ambulance_id: ambulance_id.to_string(),
            maintenance_type: MaintenanceType::Routine,
            start_date: Utc::now().date_naive(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_schedule_marks_ambulance_maintenance() {
        let service = test_service();
        let ambulance_id = seed_ambulance(&service, AmbulanceStatus::Available).await;

        let record = service.schedule(request_for(&ambulance_id)).await.unwrap();
        assert_eq!(record.status, MaintenanceStatus::Scheduled);
        assert!(record.code.starts_with("WO-"));

        let ambulance = service.store.get_ambulance(&ambulance_id).await.unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Maintenance);
    }

    #[tokio::test]
    async fn test_second_open_order_rejected() {
        let service = test_service();
        let ambulance_id = seed_ambulance(&service, AmbulanceStatus::Available).await;

        service.schedule(request_for(&ambulance_id)).await.unwrap();
        let result = service.schedule(request_for(&ambulance_id)).await;
        assert!(matches!(result, Err(AppError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_completion_returns_vehicle_and_books_next_visit() {
        let service = test_service();
        let ambulance_id = seed_ambulance(&service, AmbulanceStatus::Available).await;

        let record = service.schedule(request_for(&ambulance_id)).await.unwrap();
        service.start(&record.id).await.unwrap();
        let completed = service
            .complete(
                &record.id,
                MaintenanceCompletion {
                    cost: 1_250_000.0,
                    notes: Some("brake pads replaced".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(completed.status, MaintenanceStatus::Completed);
        assert_eq!(completed.cost, 1_250_000.0);
        let today = Utc::now().date_naive();
        assert_eq!(completed.end_date, Some(today));

        let ambulance = service.store.get_ambulance(&ambulance_id).await.unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Available);
        assert_eq!(ambulance.last_maintenance_date, Some(today));
        assert_eq!(
            ambulance.next_maintenance_date,
            today.checked_add_months(Months::new(3))
        );
    }

    #[tokio::test]
    async fn test_complete_requires_in_progress() {
        let service = test_service();
        let ambulance_id = seed_ambulance(&service, AmbulanceStatus::Available).await;
        let record = service.schedule(request_for(&ambulance_id)).await.unwrap();

        let result = service
            .complete(
                &record.id,
                MaintenanceCompletion {
                    cost: 0.0,
                    notes: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_in_progress_blocked() {
        let service = test_service();
        let ambulance_id = seed_ambulance(&service, AmbulanceStatus::Available).await;
        let record = service.schedule(request_for(&ambulance_id)).await.unwrap();
        service.start(&record.id).await.unwrap();

        let result = service.delete_maintenance(&record.id).await;
        assert!(matches!(result, Err(AppError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_cancel_frees_the_vehicle() {
        let service = test_service();
        let ambulance_id = seed_ambulance(&service, AmbulanceStatus::Available).await;
        let record = service.schedule(request_for(&ambulance_id)).await.unwrap();

        service.cancel(&record.id).await.unwrap();
        let ambulance = service.store.get_ambulance(&ambulance_id).await.unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Available);
    }
}

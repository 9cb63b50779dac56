// src/services/allocator_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::SirenError as AppError,
    models::{
        ambulance::AmbulanceStatus,
        booking::{AssignmentRequest, BookingResponse, BookingStatus},
        driver::DriverStatus,
    },
    services::{
        entity_store::EntityStore,
        ledger::ResourceLedger,
        notification_service::NotificationService,
    },
    utils::id_generator::{IdGenerator, IdType},
};

#[async_trait]
pub trait AllocatorOperations: Send + Sync {
    async fn assign(
        &self,
        booking_id: &str,
        request: AssignmentRequest,
    ) -> Result<BookingResponse, AppError>;
}

/// Matches a booking to exactly one ambulance and one driver.
///
/// The whole read-check-write runs as one store transaction, so two
/// overlapping assignments of the same vehicle serialize: the first commits,
/// the second finds it no longer available and gets `ResourceUnavailable`.
pub struct AllocatorService {
    store: Arc<EntityStore>,
    notification_service: Arc<dyn NotificationService>,
}

impl AllocatorService {
    pub fn new(store: Arc<EntityStore>, notification_service: Arc<dyn NotificationService>) -> Self {
        Self {
            store,
            notification_service,
        }
    }
}

#[async_trait]
impl AllocatorOperations for AllocatorService {
    async fn assign(
        &self,
        booking_id: &str,
        request: AssignmentRequest,
    ) -> Result<BookingResponse, AppError> {
        if !IdGenerator::validate_id(booking_id, Some(IdType::Booking)) {
            return Err(AppError::validation_error(
                "booking_id",
                "Invalid booking ID format",
            ));
        }
        if !IdGenerator::validate_id(&request.ambulance_id, Some(IdType::Ambulance)) {
            return Err(AppError::validation_error(
                "ambulance_id",
                "Invalid ambulance ID format",
            ));
        }
        if !IdGenerator::validate_id(&request.driver_id, Some(IdType::Driver)) {
            return Err(AppError::validation_error(
                "driver_id",
                "Invalid driver ID format",
            ));
        }

        tracing::info!(
            "Assigning ambulance {} and driver {} to booking {}",
            request.ambulance_id,
            request.driver_id,
            booking_id
        );

        let ambulance_id = request.ambulance_id.as_str();
        let driver_id = request.driver_id.as_str();

        let (booking, driver_user_id, changed) = self
            .store
            .transact(|inner| {
                let booking = inner.booking(booking_id)?.clone();
                if booking.status.is_terminal() {
                    return Err(AppError::constraint_violation(format!(
                        "booking {} is {} and cannot be assigned",
                        booking_id, booking.status
                    )));
                }

                // Re-sending the current pair is a no-op success.
                if booking.ambulance_id.as_deref() == Some(ambulance_id)
                    && booking.driver_id.as_deref() == Some(driver_id)
                {
                    let driver_user_id = inner.driver(driver_id)?.user_id.clone();
                    return Ok((booking, driver_user_id, false));
                }

                let ambulance = inner.ambulance(ambulance_id)?;
                if ambulance.status != AmbulanceStatus::Available {
                    return Err(AppError::resource_unavailable(format!(
                        "ambulance {} is {}",
                        ambulance_id, ambulance.status
                    )));
                }
                // The workshop check is independent of the status column: a
                // stale `available` never lets a vehicle under maintenance
                // back into dispatch.
                if let Some(order) = inner.open_maintenance_for(ambulance_id) {
                    return Err(AppError::resource_unavailable(format!(
                        "ambulance {} has an open maintenance order {}",
                        ambulance_id, order.code
                    )));
                }
                if let Some(holder) = inner.driver_holding_ambulance(ambulance_id) {
                    if holder.id != driver_id {
                        return Err(AppError::resource_unavailable(format!(
                            "ambulance {} is already linked to driver {}",
                            ambulance_id, holder.id
                        )));
                    }
                }

                let driver = inner.driver(driver_id)?.clone();
                if driver.status != DriverStatus::Available {
                    return Err(AppError::resource_unavailable(format!(
                        "driver {} is {}",
                        driver_id, driver.status
                    )));
                }

                // Compensation: resources held from a previous assignment go
                // back to the pool, unless some other active booking still
                // references them (defensive re-check).
                let previous_ambulance = booking
                    .ambulance_id
                    .clone()
                    .filter(|prev| prev != ambulance_id)
                    .filter(|prev| {
                        inner
                            .active_booking_for_ambulance(prev, Some(booking_id))
                            .is_none()
                    });
                let previous_driver = booking
                    .driver_id
                    .clone()
                    .filter(|prev| prev != driver_id)
                    .filter(|prev| {
                        inner
                            .active_booking_for_driver(prev, Some(booking_id))
                            .is_none()
                    });
                ResourceLedger::release(
                    inner,
                    previous_ambulance.as_deref(),
                    previous_driver.as_deref(),
                );
                if let Some(prev) = booking.driver_id.as_deref().filter(|p| *p != driver_id) {
                    if let Some(old_driver) = inner.drivers.get_mut(prev) {
                        old_driver.ambulance_id = None;
                        old_driver.updated_at = Utc::now();
                    }
                }

                let now = Utc::now();
                let stored = inner.booking_mut(booking_id)?;
                stored.ambulance_id = Some(ambulance_id.to_string());
                stored.driver_id = Some(driver_id.to_string());
                if stored.status == BookingStatus::Pending {
                    stored.status = BookingStatus::Confirmed;
                }
                stored.updated_at = now;
                let updated = stored.clone();

                inner.driver_mut(driver_id)?.ambulance_id = Some(ambulance_id.to_string());

                // A reassignment onto an already-rolling booking puts the new
                // crew straight into the dispatched posture.
                if matches!(
                    updated.status,
                    BookingStatus::Dispatched | BookingStatus::Arrived | BookingStatus::InProgress
                ) {
                    ResourceLedger::mark_dispatched(inner, ambulance_id, driver_id)?;
                } else {
                    ResourceLedger::mark_assigned(inner, ambulance_id, driver_id)?;
                }

                Ok((updated, driver.user_id, true))
            })
            .await?;

        if changed {
            tracing::info!(
                "Booking {} assigned: ambulance {}, driver {}",
                booking.id,
                ambulance_id,
                driver_id
            );

            // Post-commit, fire-and-forget for both parties.
            let notifications = self.notification_service.clone();
            let notify_booking = booking.clone();
            tokio::spawn(async move {
                let (patient, driver) = futures::join!(
                    notifications
                        .notify_booking_status(&notify_booking.patient_id, &notify_booking),
                    notifications.notify_assignment(&driver_user_id, &notify_booking),
                );
                if let Err(e) = patient {
                    tracing::warn!("Patient notification failed: {}", e);
                }
                if let Err(e) = driver {
                    tracing::warn!("Driver notification failed: {}", e);
                }
            });
        }

        Ok(booking.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ambulance::{Ambulance, AmbulanceClass};
    use crate::models::booking::{Booking, BookingPriority, BookingRequest, BookingType};
    use crate::models::driver::Driver;
    use crate::models::maintenance::{Maintenance, MaintenanceStatus, MaintenanceType};
    use crate::services::notification_service::MockNotificationService;
    use crate::utils::id_generator::WithGeneratedId;

    fn test_service() -> Arc<AllocatorService> {
        Arc::new(AllocatorService::new(
            Arc::new(EntityStore::new()),
            Arc::new(MockNotificationService),
        ))
    }

    fn make_ambulance(status: AmbulanceStatus) -> Ambulance {
        let now = Utc::now();
        Ambulance {
            id: IdGenerator::generate(IdType::Ambulance),
            registration_number: format!("B {} AMB", rand::random::<u16>()),
            class: AmbulanceClass::BasicLifeSupport,
            station_id: None,
            status,
            last_maintenance_date: None,
            next_maintenance_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_driver(status: DriverStatus) -> Driver {
        let now = Utc::now();
        Driver {
            id: IdGenerator::generate(IdType::Driver),
            user_id: IdGenerator::generate(IdType::User),
            first_name: "Agus".to_string(),
            last_name: "Pratama".to_string(),
            phone_number: "+62822222222".to_string(),
            license_number: format!("SIM-A-{}", rand::random::<u16>()),
            status,
            ambulance_id: None,
            hired_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_booking() -> Booking {
        let request = BookingRequest {
            patient_id: "usr-251103-aaa11".to_string(),
            booking_type: BookingType::Scheduled,
            priority: BookingPriority::Normal,
            pickup_address: "Jl. Anggrek 2".to_string(),
            destination_address: "RS Sehat".to_string(),
            contact_name: "Rina".to_string(),
            contact_phone: "+62855555555".to_string(),
            scheduled_at: Some(Utc::now() + chrono::Duration::hours(4)),
            notes: None,
        };
        Booking::new(request, 300_000.0, 1_000_000.0).with_generated_id(IdType::Booking)
    }

    async fn seed(
        service: &AllocatorService,
        bookings: Vec<Booking>,
        ambulances: Vec<Ambulance>,
        drivers: Vec<Driver>,
    ) {
        service
            .store
            .transact(move |inner| {
                for b in &bookings {
                    inner.bookings.insert(b.id.clone(), b.clone());
                }
                for a in &ambulances {
                    inner.ambulances.insert(a.id.clone(), a.clone());
                }
                for d in &drivers {
                    inner.drivers.insert(d.id.clone(), d.clone());
                }
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_assign_confirms_pending_booking() {
        let service = test_service();
        let booking = make_booking();
        let ambulance = make_ambulance(AmbulanceStatus::Available);
        let driver = make_driver(DriverStatus::Available);
        seed(
            &service,
            vec![booking.clone()],
            vec![ambulance.clone()],
            vec![driver.clone()],
        )
        .await;

        // The assignment path confirms on its own; no downpayment involved.
        let assigned = service
            .assign(
                &booking.id,
                AssignmentRequest {
                    ambulance_id: ambulance.id.clone(),
                    driver_id: driver.id.clone(),
                },
            )
            .await
            .unwrap();

        assert_eq!(assigned.status, BookingStatus::Confirmed);
        assert_eq!(assigned.ambulance_id.as_deref(), Some(ambulance.id.as_str()));
        assert_eq!(assigned.driver_id.as_deref(), Some(driver.id.as_str()));

        let a = service.store.get_ambulance(&ambulance.id).await.unwrap();
        assert_eq!(a.status, AmbulanceStatus::OnDuty);
        let d = service.store.get_driver(&driver.id).await.unwrap();
        assert_eq!(d.status, DriverStatus::Assigned);
        assert_eq!(d.ambulance_id.as_deref(), Some(ambulance.id.as_str()));
    }

    #[tokio::test]
    async fn test_assign_rejects_unavailable_resources() {
        let service = test_service();
        let booking = make_booking();
        let busy_ambulance = make_ambulance(AmbulanceStatus::OnDuty);
        let inactive_ambulance = make_ambulance(AmbulanceStatus::Inactive);
        let free_ambulance = make_ambulance(AmbulanceStatus::Available);
        let off_driver = make_driver(DriverStatus::Off);
        let free_driver = make_driver(DriverStatus::Available);
        seed(
            &service,
            vec![booking.clone()],
            vec![
                busy_ambulance.clone(),
                inactive_ambulance.clone(),
                free_ambulance.clone(),
            ],
            vec![off_driver.clone(), free_driver.clone()],
        )
        .await;

        for ambulance_id in [&busy_ambulance.id, &inactive_ambulance.id] {
            let result = service
                .assign(
                    &booking.id,
                    AssignmentRequest {
                        ambulance_id: ambulance_id.clone(),
                        driver_id: free_driver.id.clone(),
                    },
                )
                .await;
            assert!(matches!(result, Err(AppError::ResourceUnavailable(_))));
        }

        let result = service
            .assign(
                &booking.id,
                AssignmentRequest {
                    ambulance_id: free_ambulance.id.clone(),
                    driver_id: off_driver.id.clone(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ResourceUnavailable(_))));

        // No partial side effects from the rejected attempts.
        let b = service.store.get_booking(&booking.id).await.unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
        assert!(b.ambulance_id.is_none());
    }

    #[tokio::test]
    async fn test_open_maintenance_beats_stale_available_status() {
        let service = test_service();
        let booking = make_booking();
        // Status column says available, but an open workshop order exists.
        let ambulance = make_ambulance(AmbulanceStatus::Available);
        let driver = make_driver(DriverStatus::Available);
        let now = Utc::now();
        let order = Maintenance {
            id: IdGenerator::generate(IdType::Maintenance),
            code: "WO-TEST0001".to_string(),
            ambulance_id: ambulance.id.clone(),
            maintenance_type: MaintenanceType::Repair,
            status: MaintenanceStatus::InProgress,
            start_date: now.date_naive(),
            end_date: None,
            cost: 0.0,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        seed(
            &service,
            vec![booking.clone()],
            vec![ambulance.clone()],
            vec![driver.clone()],
        )
        .await;
        service
            .store
            .transact(move |inner| {
                inner.maintenance.insert(order.id.clone(), order.clone());
                Ok(())
            })
            .await
            .unwrap();

        let result = service
            .assign(
                &booking.id,
                AssignmentRequest {
                    ambulance_id: ambulance.id.clone(),
                    driver_id: driver.id.clone(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ResourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_ambulance_linked_to_other_driver_rejected() {
        let service = test_service();
        let booking = make_booking();
        let ambulance = make_ambulance(AmbulanceStatus::Available);
        let mut holder = make_driver(DriverStatus::Available);
        holder.ambulance_id = Some(ambulance.id.clone());
        let driver = make_driver(DriverStatus::Available);
        seed(
            &service,
            vec![booking.clone()],
            vec![ambulance.clone()],
            vec![holder, driver.clone()],
        )
        .await;

        let result = service
            .assign(
                &booking.id,
                AssignmentRequest {
                    ambulance_id: ambulance.id.clone(),
                    driver_id: driver.id.clone(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ResourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_reassignment_releases_previous_crew() {
        let service = test_service();
        let booking = make_booking();
        let first_ambulance = make_ambulance(AmbulanceStatus::Available);
        let second_ambulance = make_ambulance(AmbulanceStatus::Available);
        let first_driver = make_driver(DriverStatus::Available);
        let second_driver = make_driver(DriverStatus::Available);
        seed(
            &service,
            vec![booking.clone()],
            vec![first_ambulance.clone(), second_ambulance.clone()],
            vec![first_driver.clone(), second_driver.clone()],
        )
        .await;

        service
            .assign(
                &booking.id,
                AssignmentRequest {
                    ambulance_id: first_ambulance.id.clone(),
                    driver_id: first_driver.id.clone(),
                },
            )
            .await
            .unwrap();

        let reassigned = service
            .assign(
                &booking.id,
                AssignmentRequest {
                    ambulance_id: second_ambulance.id.clone(),
                    driver_id: second_driver.id.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            reassigned.ambulance_id.as_deref(),
            Some(second_ambulance.id.as_str())
        );

        // First crew went back to the pool, vehicle link cleared.
        let a1 = service.store.get_ambulance(&first_ambulance.id).await.unwrap();
        assert_eq!(a1.status, AmbulanceStatus::Available);
        let d1 = service.store.get_driver(&first_driver.id).await.unwrap();
        assert_eq!(d1.status, DriverStatus::Available);
        assert!(d1.ambulance_id.is_none());

        let a2 = service.store.get_ambulance(&second_ambulance.id).await.unwrap();
        assert_eq!(a2.status, AmbulanceStatus::OnDuty);
    }

    #[tokio::test]
    async fn test_concurrent_assignment_single_winner() {
        let service = test_service();
        let first_booking = make_booking();
        let second_booking = make_booking();
        let ambulance = make_ambulance(AmbulanceStatus::Available);
        let first_driver = make_driver(DriverStatus::Available);
        let second_driver = make_driver(DriverStatus::Available);
        seed(
            &service,
            vec![first_booking.clone(), second_booking.clone()],
            vec![ambulance.clone()],
            vec![first_driver.clone(), second_driver.clone()],
        )
        .await;

        let s1 = service.clone();
        let b1 = first_booking.id.clone();
        let r1 = AssignmentRequest {
            ambulance_id: ambulance.id.clone(),
            driver_id: first_driver.id.clone(),
        };
        let s2 = service.clone();
        let b2 = second_booking.id.clone();
        let r2 = AssignmentRequest {
            ambulance_id: ambulance.id.clone(),
            driver_id: second_driver.id.clone(),
        };

        let (first, second) = tokio::join!(
            tokio::spawn(async move { s1.assign(&b1, r1).await }),
            tokio::spawn(async move { s2.assign(&b2, r2).await }),
        );
        let outcomes = [first.unwrap(), second.unwrap()];

        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::ResourceUnavailable(_))))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 1);

        // Exclusivity: exactly one active booking references the ambulance.
        let holders = service
            .store
            .read(|inner| {
                inner
                    .bookings
                    .values()
                    .filter(|b| {
                        b.status.is_active()
                            && b.ambulance_id.as_deref() == Some(ambulance.id.as_str())
                    })
                    .count()
            })
            .await;
        assert_eq!(holders, 1);
    }

    #[tokio::test]
    async fn test_assign_to_terminal_booking_rejected() {
        let service = test_service();
        let mut booking = make_booking();
        booking.status = BookingStatus::Cancelled;
        booking.cancel_reason = Some("no longer needed".to_string());
        let ambulance = make_ambulance(AmbulanceStatus::Available);
        let driver = make_driver(DriverStatus::Available);
        seed(
            &service,
            vec![booking.clone()],
            vec![ambulance.clone()],
            vec![driver.clone()],
        )
        .await;

        let result = service
            .assign(
                &booking.id,
                AssignmentRequest {
                    ambulance_id: ambulance.id,
                    driver_id: driver.id,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ConstraintViolation(_))));
    }
}

// src/services/booking_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::SirenError as AppError,
    models::booking::{
        Booking, BookingFilter, BookingPriority, BookingRequest, BookingResponse, BookingStatus,
        BookingStatusUpdate, BookingType,
    },
    services::{
        entity_store::EntityStore,
        ledger::ResourceLedger,
        notification_service::NotificationService,
        payment_service::PaymentService,
    },
    utils::id_generator::{IdGenerator, IdType, WithGeneratedId},
};

/// The legal forward edges of the booking lifecycle. Cancellation is handled
/// separately: it is reachable from every non-terminal state.
pub fn transition_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    if to == Cancelled {
        return !from.is_terminal();
    }
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, Dispatched)
            | (Dispatched, Arrived)
            | (Arrived, InProgress)
            | (InProgress, Completed)
    )
}

#[async_trait]
pub trait BookingOperations: Send + Sync {
    async fn create_booking(&self, request: BookingRequest) -> Result<BookingResponse, AppError>;
    async fn get_booking(&self, booking_id: &str) -> Result<Option<BookingResponse>, AppError>;
    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<BookingResponse>, AppError>;
    async fn update_status(
        &self,
        booking_id: &str,
        update: BookingStatusUpdate,
    ) -> Result<BookingResponse, AppError>;
    async fn cancel_booking(
        &self,
        booking_id: &str,
        reason: String,
    ) -> Result<BookingResponse, AppError>;
    async fn delete_booking(&self, booking_id: &str) -> Result<(), AppError>;
}

pub struct BookingService {
    store: Arc<EntityStore>,
    payment_service: Arc<PaymentService>,
    notification_service: Arc<dyn NotificationService>,
}

impl BookingService {
    pub fn new(
        store: Arc<EntityStore>,
        payment_service: Arc<PaymentService>,
        notification_service: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            store,
            payment_service,
            notification_service,
        }
    }

    /// Call-out fee by booking type plus a priority surcharge. Amounts in
    /// rupiah; invoicing splits the total into phases later.
    fn calculate_pricing(
        &self,
        booking_type: BookingType,
        priority: BookingPriority,
    ) -> (f64, f64) {
        let base_price = match booking_type {
            BookingType::Standard => 350_000.0,
            BookingType::Scheduled => 300_000.0,
            BookingType::Emergency => 500_000.0,
        };
        let priority_surcharge = match priority {
            BookingPriority::Critical => 250_000.0,
            BookingPriority::Urgent => 100_000.0,
            BookingPriority::Normal => 0.0,
        };
        (base_price, base_price + priority_surcharge)
    }

    fn validate_request(&self, request: &BookingRequest) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if request.patient_id.trim().is_empty() {
            errors.push(crate::errors::ValidationError {
                field: "patient_id".to_string(),
                message: "Patient is required".to_string(),
            });
        }
        if request.pickup_address.trim().is_empty() {
            errors.push(crate::errors::ValidationError {
                field: "pickup_address".to_string(),
                message: "Pickup address is required".to_string(),
            });
        }
        if request.destination_address.trim().is_empty() {
            errors.push(crate::errors::ValidationError {
                field: "destination_address".to_string(),
                message: "Destination address is required".to_string(),
            });
        }
        if request.contact_phone.trim().is_empty() {
            errors.push(crate::errors::ValidationError {
                field: "contact_phone".to_string(),
                message: "Contact phone is required".to_string(),
            });
        }
        if request.booking_type == BookingType::Scheduled && request.scheduled_at.is_none() {
            errors.push(crate::errors::ValidationError {
                field: "scheduled_at".to_string(),
                message: "Scheduled bookings need a pickup time".to_string(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(errors))
        }
    }

    fn notify_patient(&self, booking: &Booking) {
        let notifications = self.notification_service.clone();
        let booking = booking.clone();
        // Fire-and-forget: a failed notification never unwinds the committed
        // transition that triggered it.
        tokio::spawn(async move {
            if let Err(e) = notifications
                .notify_booking_status(&booking.patient_id, &booking)
                .await
            {
                tracing::warn!("Booking notification failed: {}", e);
            }
        });
    }
}

#[async_trait]
impl BookingOperations for BookingService {
    async fn create_booking(&self, request: BookingRequest) -> Result<BookingResponse, AppError> {
        tracing::info!("Creating booking for patient: {}", request.patient_id);

        self.validate_request(&request)?;

        let (base_price, total_amount) =
            self.calculate_pricing(request.booking_type, request.priority);

        let booking =
            Booking::new(request, base_price, total_amount).with_generated_id(IdType::Booking);

        let stored = self
            .store
            .transact(|inner| {
                inner.bookings.insert(booking.id.clone(), booking.clone());
                Ok(booking.clone())
            })
            .await?;

        tracing::info!(
            "Booking created: {} ({}) - {:.0} total",
            stored.id,
            stored.code,
            stored.total_amount
        );

        Ok(stored.into())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<BookingResponse>, AppError> {
        if !IdGenerator::validate_id(booking_id, Some(IdType::Booking)) {
            tracing::warn!("Invalid booking ID format: {}", booking_id);
            return Ok(None);
        }

        tracing::debug!("Getting booking: {}", booking_id);
        Ok(self.store.get_booking(booking_id).await.map(Into::into))
    }

    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<BookingResponse>, AppError> {
        let mut bookings = self
            .store
            .read(|inner| {
                inner
                    .bookings
                    .values()
                    .filter(|b| {
                        filter.status.map_or(true, |s| b.status == s)
                            && filter
                                .patient_id
                                .as_deref()
                                .map_or(true, |p| b.patient_id == p)
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;

        // Sort by creation date (newest first)
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(bookings.into_iter().map(Into::into).collect())
    }

    async fn update_status(
        &self,
        booking_id: &str,
        update: BookingStatusUpdate,
    ) -> Result<BookingResponse, AppError> {
        if !IdGenerator::validate_id(booking_id, Some(IdType::Booking)) {
            return Err(AppError::validation_error(
                "booking_id",
                "Invalid booking ID format",
            ));
        }

        tracing::info!("Updating booking status: {} to {}", booking_id, update.status);

        let (booking, changed) = self
            .store
            .transact(|inner| {
                let current = inner.booking(booking_id)?.clone();
                let target = update.status;

                // Idempotent PATCH semantics: re-sending the current status
                // succeeds without re-running side effects. Covers
                // cancelled -> cancelled as well.
                if current.status == target {
                    return Ok((current, false));
                }

                if !transition_allowed(current.status, target) {
                    return Err(AppError::invalid_transition(current.status, target));
                }

                let cancel_reason = if target == BookingStatus::Cancelled {
                    let reason = update
                        .cancel_reason
                        .as_deref()
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .ok_or_else(|| {
                            AppError::validation_error(
                                "cancel_reason",
                                "Cancel reason is required",
                            )
                        })?;
                    Some(reason.to_string())
                } else {
                    None
                };

                if target == BookingStatus::Confirmed
                    && !PaymentService::can_advance(inner, &current, target)
                {
                    return Err(AppError::constraint_violation(format!(
                        "booking {} needs an assigned crew or a settled downpayment to confirm",
                        current.id
                    )));
                }

                let now = Utc::now();
                let ambulance_id = current.ambulance_id.clone();
                let driver_id = current.driver_id.clone();

                match target {
                    BookingStatus::Dispatched => {
                        let (Some(amb), Some(drv)) = (ambulance_id.as_deref(), driver_id.as_deref())
                        else {
                            return Err(AppError::constraint_violation(format!(
                                "booking {} cannot dispatch without an assigned crew",
                                current.id
                            )));
                        };
                        ResourceLedger::mark_dispatched(inner, amb, drv)?;
                    }
                    BookingStatus::Completed | BookingStatus::Cancelled => {
                        ResourceLedger::release(
                            inner,
                            ambulance_id.as_deref(),
                            driver_id.as_deref(),
                        );
                    }
                    _ => {}
                }

                let booking = inner.booking_mut(booking_id)?;
                booking.status = target;
                booking.updated_at = now;
                match target {
                    BookingStatus::Dispatched => booking.dispatched_at = Some(now),
                    BookingStatus::Arrived => booking.arrived_at = Some(now),
                    BookingStatus::Completed => booking.completed_at = Some(now),
                    BookingStatus::Cancelled => booking.cancel_reason = cancel_reason,
                    _ => {}
                }
                let updated = booking.clone();

                if target == BookingStatus::Completed {
                    self.payment_service.settle_after_completion(inner, &updated);
                }

                Ok((updated, true))
            })
            .await?;

        if changed {
            tracing::info!("Booking {} moved to {}", booking.id, booking.status);
            self.notify_patient(&booking);
        }

        Ok(booking.into())
    }

    async fn cancel_booking(
        &self,
        booking_id: &str,
        reason: String,
    ) -> Result<BookingResponse, AppError> {
        tracing::info!("Cancelling booking: {}", booking_id);
        self.update_status(
            booking_id,
            BookingStatusUpdate {
                status: BookingStatus::Cancelled,
                cancel_reason: Some(reason),
            },
        )
        .await
    }

    async fn delete_booking(&self, booking_id: &str) -> Result<(), AppError> {
        if !IdGenerator::validate_id(booking_id, Some(IdType::Booking)) {
            return Err(AppError::validation_error(
                "booking_id",
                "Invalid booking ID format",
            ));
        }

        self.store
            .transact(|inner| {
                let booking = inner.booking(booking_id)?;
                if booking.status.is_active() {
                    return Err(AppError::constraint_violation(format!(
                        "booking {} is {} and cannot be deleted",
                        booking_id, booking.status
                    )));
                }
                if let Some(payment) = inner.payments_for_booking(booking_id).first() {
                    return Err(AppError::constraint_violation(format!(
                        "booking {} is referenced by payment {}",
                        booking_id, payment.id
                    )));
                }
                inner.bookings.remove(booking_id);
                Ok(())
            })
            .await?;

        tracing::info!("Booking deleted: {}", booking_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ambulance::{Ambulance, AmbulanceClass, AmbulanceStatus};
    use crate::models::driver::{Driver, DriverStatus};
    use crate::models::payment::{PaymentStatus, PaymentType};
    use crate::services::notification_service::MockNotificationService;

    fn test_service() -> BookingService {
        let store = Arc::new(EntityStore::new());
        let notifications: Arc<dyn NotificationService> = Arc::new(MockNotificationService);
        let payment_service = Arc::new(PaymentService::new(
            store.clone(),
            notifications.clone(),
            24,
        ));
        BookingService::new(store, payment_service, notifications)
    }

    fn request(booking_type: BookingType) -> BookingRequest {
        BookingRequest {
            patient_id: "usr-251103-aaa11".to_string(),
            booking_type,
            priority: BookingPriority::Urgent,
            pickup_address: "Jl. Kenanga 8".to_string(),
            destination_address: "RS Mitra".to_string(),
            contact_name: "Dewi".to_string(),
            contact_phone: "+62844444444".to_string(),
            scheduled_at: if booking_type == BookingType::Scheduled {
                Some(Utc::now() + chrono::Duration::hours(6))
            } else {
                None
            },
            notes: None,
        }
    }

    /// Seed an ambulance + driver and attach them to the booking, the way
    /// the allocator leaves things after a successful assignment.
    async fn attach_crew(service: &BookingService, booking_id: &str) -> (String, String) {
        let now = Utc::now();
        let ambulance = Ambulance {
            id: IdGenerator::generate(IdType::Ambulance),
            registration_number: "B 8812 AMB".to_string(),
            class: AmbulanceClass::BasicLifeSupport,
            station_id: None,
            status: AmbulanceStatus::OnDuty,
            last_maintenance_date: None,
            next_maintenance_date: None,
            created_at: now,
            updated_at: now,
        };
        let driver = Driver {
            id: IdGenerator::generate(IdType::Driver),
            user_id: "usr-251103-drv99".to_string(),
            first_name: "Agus".to_string(),
            last_name: "Pratama".to_string(),
            phone_number: "+62822222222".to_string(),
            license_number: "SIM-A-112".to_string(),
            status: DriverStatus::Assigned,
            ambulance_id: Some(ambulance.id.clone()),
            hired_at: None,
            created_at: now,
            updated_at: now,
        };
        let (amb_id, drv_id) = (ambulance.id.clone(), driver.id.clone());
        let booking_id = booking_id.to_string();
        service
            .store
            .transact(move |inner| {
                inner.ambulances.insert(ambulance.id.clone(), ambulance.clone());
                inner.drivers.insert(driver.id.clone(), driver.clone());
                let booking = inner.booking_mut(&booking_id)?;
                booking.ambulance_id = Some(ambulance.id.clone());
                booking.driver_id = Some(driver.id.clone());
                booking.status = BookingStatus::Confirmed;
                Ok(())
            })
            .await
            .unwrap();
        (amb_id, drv_id)
    }

    async fn set_status(service: &BookingService, booking_id: &str, status: BookingStatus) {
        let response = service
            .update_status(
                booking_id,
                BookingStatusUpdate {
                    status,
                    cancel_reason: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(response.status, status);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let service = test_service();
        let created = service.create_booking(request(BookingType::Standard)).await.unwrap();
        assert_eq!(created.status, BookingStatus::Pending);
        assert_eq!(created.total_amount, 450_000.0);
        assert_eq!(created.downpayment_amount, 135_000.0);

        let (amb_id, drv_id) = attach_crew(&service, &created.id).await;

        set_status(&service, &created.id, BookingStatus::Dispatched).await;
        let b = service.store.get_booking(&created.id).await.unwrap();
        assert!(b.dispatched_at.is_some());
        assert_eq!(
            service.store.get_ambulance(&amb_id).await.unwrap().status,
            AmbulanceStatus::OnDuty
        );
        assert_eq!(
            service.store.get_driver(&drv_id).await.unwrap().status,
            DriverStatus::Busy
        );

        set_status(&service, &created.id, BookingStatus::Arrived).await;
        set_status(&service, &created.id, BookingStatus::InProgress).await;
        set_status(&service, &created.id, BookingStatus::Completed).await;

        let b = service.store.get_booking(&created.id).await.unwrap();
        assert!(b.completed_at.is_some());

        // Crew is back in the pool.
        assert_eq!(
            service.store.get_ambulance(&amb_id).await.unwrap().status,
            AmbulanceStatus::Available
        );
        assert_eq!(
            service.store.get_driver(&drv_id).await.unwrap().status,
            DriverStatus::Available
        );

        // Completion raised the remainder invoice.
        let raised = service
            .store
            .read(|inner| {
                inner
                    .payments_for_booking(&created.id)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].payment_type, PaymentType::FinalPayment);
        assert_eq!(raised[0].status, PaymentStatus::Pending);
        assert_eq!(raised[0].amount, 450_000.0 - 135_000.0);
    }

    #[tokio::test]
    async fn test_emergency_completion_raises_full_payment() {
        let service = test_service();
        let created = service
            .create_booking(request(BookingType::Emergency))
            .await
            .unwrap();
        attach_crew(&service, &created.id).await;
        set_status(&service, &created.id, BookingStatus::Dispatched).await;
        set_status(&service, &created.id, BookingStatus::Arrived).await;
        set_status(&service, &created.id, BookingStatus::InProgress).await;
        set_status(&service, &created.id, BookingStatus::Completed).await;

        let raised = service
            .store
            .read(|inner| {
                inner
                    .payments_for_booking(&created.id)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].payment_type, PaymentType::FullPayment);
        assert_eq!(raised[0].amount, 600_000.0);
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected_atomically() {
        let service = test_service();
        let created = service.create_booking(request(BookingType::Standard)).await.unwrap();

        let result = service
            .update_status(
                &created.id,
                BookingStatusUpdate {
                    status: BookingStatus::Arrived,
                    cancel_reason: None,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(AppError::InvalidTransition {
                from: BookingStatus::Pending,
                to: BookingStatus::Arrived,
            })
        ));

        // Nothing moved: status, timestamps and links are untouched.
        let b = service.store.get_booking(&created.id).await.unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
        assert!(b.arrived_at.is_none());
        assert!(b.ambulance_id.is_none());
        assert!(b.driver_id.is_none());
    }

    #[tokio::test]
    async fn test_repeated_transition_is_idempotent() {
        let service = test_service();
        let created = service.create_booking(request(BookingType::Standard)).await.unwrap();
        attach_crew(&service, &created.id).await;

        set_status(&service, &created.id, BookingStatus::Dispatched).await;
        let first = service.store.get_booking(&created.id).await.unwrap();

        // Same transition again: success, no new timestamp.
        set_status(&service, &created.id, BookingStatus::Dispatched).await;
        let second = service.store.get_booking(&created.id).await.unwrap();
        assert_eq!(first.dispatched_at, second.dispatched_at);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_cancellation_releases_crew() {
        let service = test_service();
        let created = service.create_booking(request(BookingType::Standard)).await.unwrap();
        let (amb_id, drv_id) = attach_crew(&service, &created.id).await;
        set_status(&service, &created.id, BookingStatus::Dispatched).await;

        let cancelled = service
            .cancel_booking(&created.id, "patient declined".to_string())
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("patient declined"));

        assert_eq!(
            service.store.get_ambulance(&amb_id).await.unwrap().status,
            AmbulanceStatus::Available
        );
        assert_eq!(
            service.store.get_driver(&drv_id).await.unwrap().status,
            DriverStatus::Available
        );

        // Terminal: cancelling again is a quiet no-op, further moves fail.
        let again = service
            .cancel_booking(&created.id, "duplicate click".to_string())
            .await
            .unwrap();
        assert_eq!(again.cancel_reason.as_deref(), Some("patient declined"));

        let result = service
            .update_status(
                &created.id,
                BookingStatusUpdate {
                    status: BookingStatus::Dispatched,
                    cancel_reason: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_cancel_requires_reason() {
        let service = test_service();
        let created = service.create_booking(request(BookingType::Standard)).await.unwrap();

        let result = service
            .update_status(
                &created.id,
                BookingStatusUpdate {
                    status: BookingStatus::Cancelled,
                    cancel_reason: Some("   ".to_string()),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));

        let b = service.store.get_booking(&created.id).await.unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_confirm_requires_crew_or_downpayment() {
        let service = test_service();
        let created = service.create_booking(request(BookingType::Scheduled)).await.unwrap();

        let result = service
            .update_status(
                &created.id,
                BookingStatusUpdate {
                    status: BookingStatus::Confirmed,
                    cancel_reason: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_paid_downpayment_confirms_without_crew() {
        let service = test_service();
        let created = service.create_booking(request(BookingType::Scheduled)).await.unwrap();

        // Settled downpayment recorded by the gateway callback path.
        let booking_id = created.id.clone();
        let downpayment_amount = created.downpayment_amount;
        service
            .store
            .transact(move |inner| {
                let now = Utc::now();
                let payment = crate::models::payment::Payment {
                    id: IdGenerator::generate(IdType::Payment),
                    booking_id: booking_id.clone(),
                    payment_type: PaymentType::Downpayment,
                    amount: downpayment_amount,
                    method: "bank_transfer".to_string(),
                    status: PaymentStatus::Paid,
                    paid_at: Some(now),
                    expires_at: None,
                    merchant_ref: "inv-test".to_string(),
                    provider_ref: Some("prov-42".to_string()),
                    created_at: now,
                    updated_at: now,
                };
                inner.payments.insert(payment.id.clone(), payment);
                Ok(())
            })
            .await
            .unwrap();

        set_status(&service, &created.id, BookingStatus::Confirmed).await;

        // No crew yet, so dispatch is still impossible.
        let result = service
            .update_status(
                &created.id,
                BookingStatusUpdate {
                    status: BookingStatus::Dispatched,
                    cancel_reason: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_delete_active_booking_blocked() {
        let service = test_service();
        let created = service.create_booking(request(BookingType::Standard)).await.unwrap();
        attach_crew(&service, &created.id).await;

        let result = service.delete_booking(&created.id).await;
        assert!(matches!(result, Err(AppError::ConstraintViolation(_))));

        // A pending booking with no payment history can go.
        let other = service.create_booking(request(BookingType::Standard)).await.unwrap();
        service.delete_booking(&other.id).await.unwrap();
        assert!(service.store.get_booking(&other.id).await.is_none());
    }

    #[test]
    fn test_transition_table() {
        use BookingStatus::*;
        assert!(transition_allowed(Pending, Confirmed));
        assert!(transition_allowed(Confirmed, Dispatched));
        assert!(transition_allowed(Dispatched, Arrived));
        assert!(transition_allowed(Arrived, InProgress));
        assert!(transition_allowed(InProgress, Completed));
        assert!(transition_allowed(Pending, Cancelled));
        assert!(transition_allowed(InProgress, Cancelled));

        assert!(!transition_allowed(Pending, Arrived));
        assert!(!transition_allowed(Pending, Dispatched));
        assert!(!transition_allowed(Confirmed, Arrived));
        assert!(!transition_allowed(Dispatched, Completed));
        assert!(!transition_allowed(Completed, Cancelled));
        assert!(!transition_allowed(Cancelled, Cancelled));
        assert!(!transition_allowed(Completed, Pending));
        assert!(!transition_allowed(Cancelled, Confirmed));
    }
}

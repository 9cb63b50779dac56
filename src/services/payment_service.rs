// src/services/payment_service.rs
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing;
use uuid::Uuid;

use crate::{
    errors::SirenError as AppError,
    models::{
        booking::{Booking, BookingStatus, BookingType},
        payment::{Payment, PaymentRequest, PaymentResponse, PaymentResult, PaymentStatus, PaymentType},
    },
    services::{
        entity_store::{EntityStore, StoreInner},
        notification_service::NotificationService,
    },
    utils::id_generator::{IdGenerator, IdType},
};

#[async_trait]
pub trait PaymentOperations: Send + Sync {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentResponse, AppError>;
    async fn get_payment(&self, payment_id: &str) -> Result<Option<PaymentResponse>, AppError>;
    async fn get_payments_by_booking(
        &self,
        booking_id: &str,
    ) -> Result<Vec<PaymentResponse>, AppError>;
    async fn record_payment_result(
        &self,
        payment_id: &str,
        result: PaymentResult,
    ) -> Result<PaymentResponse, AppError>;
    async fn is_phase_satisfied(
        &self,
        booking_id: &str,
        phase: PaymentType,
    ) -> Result<bool, AppError>;
    async fn required_phases_for(&self, booking_id: &str) -> Result<Vec<PaymentType>, AppError>;
}

pub struct PaymentService {
    store: Arc<EntityStore>,
    notification_service: Arc<dyn NotificationService>,
    expiry_hours: i64,
}

impl PaymentService {
    pub fn new(
        store: Arc<EntityStore>,
        notification_service: Arc<dyn NotificationService>,
        expiry_hours: i64,
    ) -> Self {
        Self {
            store,
            notification_service,
            expiry_hours,
        }
    }

    /// Which payment phases a booking of this type must clear.
    pub fn required_phases(booking_type: BookingType) -> &'static [PaymentType] {
        match booking_type {
            BookingType::Standard | BookingType::Scheduled => {
                &[PaymentType::Downpayment, PaymentType::FinalPayment]
            }
            BookingType::Emergency => &[PaymentType::FullPayment],
        }
    }

    /// A phase is satisfied once a paid payment of that type exists.
    pub fn phase_satisfied(inner: &StoreInner, booking_id: &str, phase: PaymentType) -> bool {
        inner
            .payments_for_booking(booking_id)
            .iter()
            .any(|p| p.payment_type == phase && p.status == PaymentStatus::Paid)
    }

    /// Payment gate consulted by the state machine. Only `pending ->
    /// confirmed` is payment-gated: an attached crew confirms on its own,
    /// otherwise a non-emergency booking needs its settled downpayment.
    /// Later transitions are never blocked by payment state.
    pub fn can_advance(inner: &StoreInner, booking: &Booking, target: BookingStatus) -> bool {
        if booking.status != BookingStatus::Pending || target != BookingStatus::Confirmed {
            return true;
        }
        if booking.has_crew() {
            return true;
        }
        booking.booking_type != BookingType::Emergency
            && Self::phase_satisfied(inner, &booking.id, PaymentType::Downpayment)
    }

    fn amount_for_phase(booking: &Booking, phase: PaymentType) -> f64 {
        match phase {
            PaymentType::Downpayment => booking.downpayment_amount,
            PaymentType::FinalPayment => booking.total_amount - booking.downpayment_amount,
            PaymentType::FullPayment => booking.total_amount,
        }
    }

    fn build_payment(&self, booking: &Booking, phase: PaymentType, method: &str) -> Payment {
        let now = Utc::now();
        let mut payment = Payment {
            id: String::new(),
            booking_id: booking.id.clone(),
            payment_type: phase,
            amount: Self::amount_for_phase(booking, phase),
            method: method.to_string(),
            status: PaymentStatus::Pending,
            paid_at: None,
            expires_at: Some(now + Duration::hours(self.expiry_hours)),
            merchant_ref: format!("inv-{}", Uuid::new_v4()),
            provider_ref: None,
            created_at: now,
            updated_at: now,
        };
        payment.id = IdGenerator::generate(IdType::Payment);
        payment
    }

    /// Called by the state machine inside the completion transaction: raises
    /// the post-service payment (full for emergency, remainder otherwise)
    /// unless one is already open or settled.
    pub fn settle_after_completion(&self, inner: &mut StoreInner, booking: &Booking) {
        let phase = match booking.booking_type {
            BookingType::Emergency => PaymentType::FullPayment,
            BookingType::Standard | BookingType::Scheduled => PaymentType::FinalPayment,
        };

        let already_raised = inner.payments_for_booking(&booking.id).iter().any(|p| {
            p.payment_type == phase
                && matches!(p.status, PaymentStatus::Pending | PaymentStatus::Paid)
        });
        if already_raised {
            return;
        }

        let payment = self.build_payment(booking, phase, "unselected");
        tracing::info!(
            "Raised {} payment {} for completed booking {}",
            phase,
            payment.id,
            booking.id
        );
        inner.payments.insert(payment.id.clone(), payment);
    }

    /// Flip overdue pending payments to expired. Deadlines are evaluated on
    /// read; this is the shared check the read paths run. A deployment that
    /// wants autonomous expiry can call [`PaymentOperations`] consumers on a
    /// timer against this same primitive.
    pub fn expire_overdue_in(inner: &mut StoreInner) -> usize {
        let now = Utc::now();
        let mut flipped = 0;
        for payment in inner.payments.values_mut() {
            if payment.is_overdue(now) {
                payment.status = PaymentStatus::Expired;
                payment.updated_at = now;
                flipped += 1;
                tracing::info!("Payment {} expired (deadline passed)", payment.id);
            }
        }
        flipped
    }

    pub async fn expire_overdue(&self) -> Result<usize, AppError> {
        self.store
            .transact(|inner| Ok(Self::expire_overdue_in(inner)))
            .await
    }
}

#[async_trait]
impl PaymentOperations for PaymentService {
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentResponse, AppError> {
        if !IdGenerator::validate_id(&request.booking_id, Some(IdType::Booking)) {
            return Err(AppError::validation_error(
                "booking_id",
                "Invalid booking ID format",
            ));
        }
        if request.method.trim().is_empty() {
            return Err(AppError::validation_error("method", "Payment method is required"));
        }

        tracing::info!(
            "Creating {} payment for booking {}",
            request.payment_type,
            request.booking_id
        );

        let payment = self
            .store
            .transact(|inner| {
                let booking = inner.booking(&request.booking_id)?.clone();

                let phases = Self::required_phases(booking.booking_type);
                if !phases.contains(&request.payment_type) {
                    return Err(AppError::validation_error(
                        "payment_type",
                        format!(
                            "{} bookings do not take a {} payment",
                            booking.booking_type, request.payment_type
                        ),
                    ));
                }

                // Post-service phases only exist once the service happened.
                if matches!(
                    request.payment_type,
                    PaymentType::FullPayment | PaymentType::FinalPayment
                ) && booking.status != BookingStatus::Completed
                {
                    return Err(AppError::constraint_violation(format!(
                        "{} payment for booking {} requires a completed booking (currently {})",
                        request.payment_type, booking.id, booking.status
                    )));
                }

                if booking.status == BookingStatus::Cancelled {
                    return Err(AppError::constraint_violation(format!(
                        "booking {} is cancelled and takes no further payments",
                        booking.id
                    )));
                }

                let duplicate = inner.payments_for_booking(&booking.id).iter().any(|p| {
                    p.payment_type == request.payment_type
                        && matches!(p.status, PaymentStatus::Pending | PaymentStatus::Paid)
                        && !p.is_overdue(Utc::now())
                });
                if duplicate {
                    return Err(AppError::constraint_violation(format!(
                        "booking {} already has an open {} payment",
                        booking.id, request.payment_type
                    )));
                }

                let payment = self.build_payment(&booking, request.payment_type, &request.method);
                inner.payments.insert(payment.id.clone(), payment.clone());
                Ok(payment)
            })
            .await?;

        tracing::info!(
            "Payment created: {} - {:.0} due by {:?}",
            payment.id,
            payment.amount,
            payment.expires_at
        );

        Ok(payment.into())
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Option<PaymentResponse>, AppError> {
        if !IdGenerator::validate_id(payment_id, Some(IdType::Payment)) {
            tracing::warn!("Invalid payment ID format: {}", payment_id);
            return Ok(None);
        }

        // Read path applies the lazy deadline check and persists the flip.
        let payment = self
            .store
            .transact(|inner| {
                let now = Utc::now();
                if let Some(payment) = inner.payments.get_mut(payment_id) {
                    if payment.is_overdue(now) {
                        payment.status = PaymentStatus::Expired;
                        payment.updated_at = now;
                        tracing::info!("Payment {} expired (deadline passed)", payment_id);
                    }
                    Ok(Some(payment.clone()))
                } else {
                    Ok(None)
                }
            })
            .await?;

        Ok(payment.map(Into::into))
    }

    async fn get_payments_by_booking(
        &self,
        booking_id: &str,
    ) -> Result<Vec<PaymentResponse>, AppError> {
        tracing::debug!("Getting payments for booking: {}", booking_id);

        let payments = self
            .store
            .transact(|inner| {
                inner.booking(booking_id)?;
                let now = Utc::now();
                for payment in inner.payments.values_mut() {
                    if payment.booking_id == booking_id && payment.is_overdue(now) {
                        payment.status = PaymentStatus::Expired;
                        payment.updated_at = now;
                    }
                }
                Ok(inner
                    .payments_for_booking(booking_id)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>())
            })
            .await?;

        Ok(payments.into_iter().map(Into::into).collect())
    }

    async fn record_payment_result(
        &self,
        payment_id: &str,
        result: PaymentResult,
    ) -> Result<PaymentResponse, AppError> {
        if !matches!(result.status, PaymentStatus::Paid | PaymentStatus::Failed) {
            return Err(AppError::validation_error(
                "status",
                "Gateway result must be paid or failed",
            ));
        }

        tracing::info!("Recording payment result: {} -> {}", payment_id, result.status);

        let (payment, patient_id) = self
            .store
            .transact(|inner| {
                let payment = inner.payment(payment_id)?.clone();

                // Repeated webhook delivery for the same outcome is a no-op.
                if payment.status == result.status {
                    return Ok((payment, None));
                }
                if payment.status == PaymentStatus::Paid {
                    return Err(AppError::Conflict(format!(
                        "payment {} is already settled",
                        payment_id
                    )));
                }

                let patient_id = inner.booking(&payment.booking_id)?.patient_id.clone();

                let now = Utc::now();
                let stored = inner.payment_mut(payment_id)?;
                stored.status = result.status;
                stored.updated_at = now;
                if let Some(provider_ref) = result.provider_ref {
                    stored.provider_ref = Some(provider_ref);
                }
                if result.status == PaymentStatus::Paid {
                    stored.paid_at = Some(now);
                }

                let notify = (result.status == PaymentStatus::Paid).then_some(patient_id);
                Ok((stored.clone(), notify))
            })
            .await?;

        // Post-commit, fire-and-forget: a lost notification never unwinds a
        // recorded payment.
        if let Some(patient_id) = patient_id {
            let notifications = self.notification_service.clone();
            let paid = payment.clone();
            tokio::spawn(async move {
                if let Err(e) = notifications.notify_payment_received(&patient_id, &paid).await {
                    tracing::warn!("Payment notification failed: {}", e);
                }
            });
        }

        Ok(payment.into())
    }

    async fn is_phase_satisfied(
        &self,
        booking_id: &str,
        phase: PaymentType,
    ) -> Result<bool, AppError> {
        self.store
            .transact(|inner| {
                inner.booking(booking_id)?;
                Self::expire_overdue_in(inner);
                Ok(Self::phase_satisfied(inner, booking_id, phase))
            })
            .await
    }

    async fn required_phases_for(&self, booking_id: &str) -> Result<Vec<PaymentType>, AppError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await
            .ok_or_else(|| AppError::booking_not_found(booking_id))?;
        Ok(Self::required_phases(booking.booking_type).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{BookingPriority, BookingRequest};
    use crate::services::notification_service::MockNotificationService;
    use crate::utils::id_generator::WithGeneratedId;

    fn service() -> PaymentService {
        PaymentService::new(
            Arc::new(EntityStore::new()),
            Arc::new(MockNotificationService),
            24,
        )
    }

    fn booking_of(booking_type: BookingType, total: f64) -> Booking {
        let request = BookingRequest {
            patient_id: "usr-251103-aaa11".to_string(),
            booking_type,
            priority: BookingPriority::Normal,
            pickup_address: "Jl. Melati 4".to_string(),
            destination_address: "RSUD Kota".to_string(),
            contact_name: "Sari".to_string(),
            contact_phone: "+62833333333".to_string(),
            scheduled_at: None,
            notes: None,
        };
        Booking::new(request, 350_000.0, total).with_generated_id(IdType::Booking)
    }

    async fn seed_booking(service: &PaymentService, booking: &Booking) {
        let b = booking.clone();
        service
            .store
            .transact(move |inner| {
                inner.bookings.insert(b.id.clone(), b.clone());
                Ok(())
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_required_phases_by_type() {
        assert_eq!(
            PaymentService::required_phases(BookingType::Scheduled),
            &[PaymentType::Downpayment, PaymentType::FinalPayment]
        );
        assert_eq!(
            PaymentService::required_phases(BookingType::Standard),
            &[PaymentType::Downpayment, PaymentType::FinalPayment]
        );
        assert_eq!(
            PaymentService::required_phases(BookingType::Emergency),
            &[PaymentType::FullPayment]
        );
    }

    #[test]
    fn test_downpayment_is_thirty_percent() {
        let booking = booking_of(BookingType::Scheduled, 1_000_000.0);
        assert_eq!(booking.downpayment_amount, 300_000.0);
        assert_eq!(
            PaymentService::amount_for_phase(&booking, PaymentType::Downpayment),
            300_000.0
        );
        assert_eq!(
            PaymentService::amount_for_phase(&booking, PaymentType::FinalPayment),
            700_000.0
        );
    }

    #[tokio::test]
    async fn test_paid_downpayment_satisfies_phase() {
        let service = service();
        let booking = booking_of(BookingType::Scheduled, 1_000_000.0);
        seed_booking(&service, &booking).await;

        let created = service
            .create_payment(PaymentRequest {
                booking_id: booking.id.clone(),
                payment_type: PaymentType::Downpayment,
                method: "bank_transfer".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.amount, 300_000.0);

        assert!(!service
            .is_phase_satisfied(&booking.id, PaymentType::Downpayment)
            .await
            .unwrap());

        service
            .record_payment_result(
                &created.id,
                PaymentResult {
                    status: PaymentStatus::Paid,
                    provider_ref: Some("prov-777".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(service
            .is_phase_satisfied(&booking.id, PaymentType::Downpayment)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_emergency_rejects_downpayment() {
        let service = service();
        let booking = booking_of(BookingType::Emergency, 500_000.0);
        seed_booking(&service, &booking).await;

        let result = service
            .create_payment(PaymentRequest {
                booking_id: booking.id.clone(),
                payment_type: PaymentType::Downpayment,
                method: "cash".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_full_payment_requires_completed_booking() {
        let service = service();
        let booking = booking_of(BookingType::Emergency, 500_000.0);
        seed_booking(&service, &booking).await;

        let result = service
            .create_payment(PaymentRequest {
                booking_id: booking.id.clone(),
                payment_type: PaymentType::FullPayment,
                method: "cash".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_overdue_pending_payment_reads_as_expired() {
        let service = service();
        let booking = booking_of(BookingType::Standard, 800_000.0);
        seed_booking(&service, &booking).await;

        let created = service
            .create_payment(PaymentRequest {
                booking_id: booking.id.clone(),
                payment_type: PaymentType::Downpayment,
                method: "ewallet".to_string(),
            })
            .await
            .unwrap();

        // Push the deadline into the past behind the service's back.
        let id = created.id.clone();
        service
            .store
            .transact(move |inner| {
                inner.payment_mut(&id)?.expires_at = Some(Utc::now() - Duration::hours(1));
                Ok(())
            })
            .await
            .unwrap();

        let read = service.get_payment(&created.id).await.unwrap().unwrap();
        assert_eq!(read.status, PaymentStatus::Expired);

        // The flip is persisted, not just a view.
        let stored = service.store.get_payment(&created.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Expired);

        assert!(!service
            .is_phase_satisfied(&booking.id, PaymentType::Downpayment)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_result_delivery_is_idempotent() {
        let service = service();
        let booking = booking_of(BookingType::Standard, 800_000.0);
        seed_booking(&service, &booking).await;

        let created = service
            .create_payment(PaymentRequest {
                booking_id: booking.id.clone(),
                payment_type: PaymentType::Downpayment,
                method: "card".to_string(),
            })
            .await
            .unwrap();

        let first = service
            .record_payment_result(
                &created.id,
                PaymentResult {
                    status: PaymentStatus::Paid,
                    provider_ref: Some("prov-1".to_string()),
                },
            )
            .await
            .unwrap();
        let second = service
            .record_payment_result(
                &created.id,
                PaymentResult {
                    status: PaymentStatus::Paid,
                    provider_ref: Some("prov-1".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(first.paid_at, second.paid_at);
        assert_eq!(second.status, PaymentStatus::Paid);
    }
}

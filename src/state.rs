// src/state.rs
use std::sync::Arc;

use crate::services::{
    allocator_service::AllocatorService,
    ambulance_service::AmbulanceService,
    booking_service::BookingService,
    driver_service::DriverService,
    entity_store::EntityStore,
    maintenance_service::MaintenanceService,
    notification_service::{
        MockNotificationService, NotificationService, PushConfig, PushNotificationService,
    },
    payment_service::PaymentService,
};

pub struct AppState {
    pub store: Arc<EntityStore>,
    pub booking_service: Arc<BookingService>,
    pub allocator_service: Arc<AllocatorService>,
    pub payment_service: Arc<PaymentService>,
    pub maintenance_service: Arc<MaintenanceService>,
    pub ambulance_service: Arc<AmbulanceService>,
    pub driver_service: Arc<DriverService>,
    pub notification_service: Arc<dyn NotificationService>,
    pub config: AppConfig,
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub push_gateway_url: String,
    pub push_api_key: Option<String>,
    pub payment_expiry_hours: i64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(EntityStore::new());

        let notification_service: Arc<dyn NotificationService> = match &config.push_api_key {
            Some(api_key) => Arc::new(PushNotificationService::new(PushConfig {
                gateway_url: config.push_gateway_url.clone(),
                api_key: api_key.clone(),
            })),
            None => {
                tracing::warn!("PUSH_API_KEY not set, using mock notification service");
                Arc::new(MockNotificationService)
            }
        };

        let payment_service = Arc::new(PaymentService::new(
            store.clone(),
            notification_service.clone(),
            config.payment_expiry_hours,
        ));
        let booking_service = Arc::new(BookingService::new(
            store.clone(),
            payment_service.clone(),
            notification_service.clone(),
        ));
        let allocator_service = Arc::new(AllocatorService::new(
            store.clone(),
            notification_service.clone(),
        ));
        let maintenance_service = Arc::new(MaintenanceService::new(store.clone()));
        let ambulance_service = Arc::new(AmbulanceService::new(store.clone()));
        let driver_service = Arc::new(DriverService::new(store.clone()));

        Self {
            store,
            booking_service,
            allocator_service,
            payment_service,
            maintenance_service,
            ambulance_service,
            driver_service,
            notification_service,
            config,
        }
    }
}

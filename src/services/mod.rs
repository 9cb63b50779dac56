// src/services/mod.rs
pub mod allocator_service;
pub mod ambulance_service;
pub mod booking_service;
pub mod driver_service;
pub mod entity_store;
pub mod ledger;
pub mod maintenance_service;
pub mod notification_service;
pub mod payment_service;

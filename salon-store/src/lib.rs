pub mod app_config;
pub mod appointment_repo;
pub mod availability_repo;
pub mod catalog_repo;
pub mod conflict;
pub mod customer_repo;
pub mod database;
pub mod events;
pub mod hold_repo;
pub mod redis_repo;
pub mod tenant_repo;

pub use appointment_repo::StoreAppointmentRepository;
pub use availability_repo::StoreAvailabilityResolver;
pub use catalog_repo::StoreServiceCatalog;
pub use customer_repo::StoreCustomerRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use hold_repo::StoreHoldRepository;
pub use redis_repo::RedisClient;
pub use tenant_repo::StoreTenantRepository;

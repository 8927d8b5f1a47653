use std::sync::Arc;

use salon_core::booking::BookingConfirmer;
use salon_core::hold::HoldManager;
use salon_core::repository::{
    AppointmentRepository, AvailabilityResolver, CustomerRepository, HoldRepository, ServiceCatalog,
    TenantRepository,
};
use salon_core::time::Clock;
use salon_shared::models::events::SlotEvent;
use salon_store::app_config::{BusinessRules, RateLimitConfig};
use salon_store::{EventProducer, RedisClient};
use tokio::sync::broadcast;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone, Debug)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_hours: i64,
}

/// Store handles, one per concern.
#[derive(Clone)]
pub struct Stores {
    pub tenants: Arc<dyn TenantRepository>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub holds: Arc<dyn HoldRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub availability: Arc<dyn AvailabilityResolver>,
}

impl Stores {
    /// All concerns served by one backend, e.g. the in-memory store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: TenantRepository
            + ServiceCatalog
            + HoldRepository
            + AppointmentRepository
            + CustomerRepository
            + AvailabilityResolver
            + 'static,
    {
        Self {
            tenants: store.clone(),
            catalog: store.clone(),
            holds: store.clone(),
            appointments: store.clone(),
            customers: store.clone(),
            availability: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<dyn TenantRepository>,
    pub availability: Arc<dyn AvailabilityResolver>,
    pub holds: Arc<HoldManager>,
    pub bookings: Arc<BookingConfirmer>,
    pub redis: Option<Arc<RedisClient>>,
    pub kafka: Option<Arc<EventProducer>>,
    pub sse_tx: broadcast::Sender<SlotEvent>,
    pub auth: AuthConfig,
    pub cookies: CookieSettings,
    pub rate_limit: RateLimitConfig,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        stores: Stores,
        clock: Arc<dyn Clock>,
        rules: &BusinessRules,
        auth: AuthConfig,
        secure_cookies: bool,
    ) -> Result<Self, prometheus::Error> {
        let holds = HoldManager::new(
            stores.holds.clone(),
            stores.appointments.clone(),
            stores.catalog.clone(),
            stores.availability.clone(),
            clock.clone(),
            rules.hold_policy(),
        );
        let bookings = BookingConfirmer::new(
            stores.holds,
            stores.appointments,
            stores.customers,
            stores.catalog,
            clock,
        );
        let (sse_tx, _) = broadcast::channel(100);

        Ok(Self {
            tenants: stores.tenants,
            availability: stores.availability,
            holds: Arc::new(holds),
            bookings: Arc::new(bookings),
            redis: None,
            kafka: None,
            sse_tx,
            auth,
            cookies: CookieSettings {
                secure: secure_cookies,
                max_age_hours: rules.session_ttl_hours,
            },
            rate_limit: RateLimitConfig::default(),
            metrics: Metrics::new()?,
        })
    }

    pub fn with_redis(mut self, redis: RedisClient, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(Arc::new(redis));
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_kafka(mut self, kafka: EventProducer) -> Self {
        self.kafka = Some(Arc::new(kafka));
        self
    }

    /// Fans an event out to SSE subscribers and, when configured, Kafka.
    /// Never fails the request that produced it.
    pub fn publish(&self, event: SlotEvent) {
        // no subscribers is fine
        let _ = self.sse_tx.send(event.clone());

        if let Some(kafka) = self.kafka.clone() {
            tokio::spawn(async move {
                let _ = kafka.publish_slot_event(&event).await;
            });
        }
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use salon_api::{app, AppState, AuthConfig, Stores};
use salon_core::time::SystemClock;
use salon_store::app_config::Config;
use salon_store::{
    DbClient, EventProducer, RedisClient, StoreAppointmentRepository, StoreAvailabilityResolver,
    StoreCustomerRepository, StoreHoldRepository, StoreServiceCatalog, StoreTenantRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salon_api=debug,salon_core=debug,salon_store=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Salon API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    if config.database.run_migrations {
        db.migrate().await.context("Failed to run migrations")?;
    }

    let rules = match db.fetch_business_rules(config.business_rules.clone()).await {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!("Falling back to file business rules: {}", e);
            config.business_rules.clone().sanitized()
        }
    };
    tracing::info!(
        "Hold TTL {}s, durations {}-{} min",
        rules.hold_ttl_seconds,
        rules.min_duration_minutes,
        rules.max_duration_minutes
    );

    let pool = db.pool.clone();
    let stores = Stores {
        tenants: Arc::new(StoreTenantRepository::new(pool.clone())),
        catalog: Arc::new(StoreServiceCatalog::new(pool.clone())),
        holds: Arc::new(StoreHoldRepository::new(pool.clone())),
        appointments: Arc::new(StoreAppointmentRepository::new(pool.clone())),
        customers: Arc::new(StoreCustomerRepository::new(pool.clone())),
        availability: Arc::new(StoreAvailabilityResolver::new(pool)),
    };

    let mut state = AppState::new(
        stores,
        Arc::new(SystemClock),
        &rules,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        config.server.secure_cookies,
    )?;

    if let Some(url) = &config.redis.url {
        let redis = RedisClient::new(url).context("Failed to create Redis client")?;
        state = state.with_redis(redis, config.rate_limit.clone());
    } else {
        tracing::warn!("No Redis configured; rate limiting disabled");
    }

    if let Some(brokers) = &config.kafka.brokers {
        let kafka = EventProducer::new(brokers).context("Failed to create Kafka producer")?;
        state = state.with_kafka(kafka);
    }

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

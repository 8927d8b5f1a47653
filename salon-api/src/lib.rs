use axum::{
    http::{HeaderName, Method},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod availability;
pub mod bookings;
pub mod error;
pub mod holds;
pub mod metrics;
pub mod middleware;
pub mod session;
pub mod state;
pub mod tenant;

pub use state::{AppState, AuthConfig, Stores};

/// Booking routes. Mounted twice: under `/api/site` (tenant from the
/// `x-tenant-id` header) and under `/{tenant_slug}/api/public`.
fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(bookings::book_direct))
        .route(
            "/appointments/hold",
            post(holds::create_hold).get(holds::get_hold).delete(holds::release_hold),
        )
        .route("/appointments/confirm", post(bookings::confirm_booking))
        .route("/availability", get(availability::get_availability))
        .route("/slots/stream", get(holds::slot_stream))
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
            HeaderName::from_static(tenant::TENANT_HEADER),
            HeaderName::from_static(session::SESSION_HEADER),
        ]);

    let booking = Router::new()
        .nest("/api/site", booking_routes())
        .nest("/{tenant_slug}/api/public", booking_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(booking)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

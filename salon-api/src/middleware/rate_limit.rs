use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use salon_store::redis_repo::rate_limit_key;
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

/// Per-IP fixed window on the booking routes. Fails open when Redis is
/// unreachable or not configured.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };

    let key = bucket_key(&req);

    match redis
        .check_rate_limit(&key, state.rate_limit.requests, state.rate_limit.window_seconds)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            state.metrics.record("rate_limit", "rate_limited");
            AppError::RateLimited {
                retry_after: state.rate_limit.window_seconds.max(0) as u64,
            }
            .into_response()
        }
        Err(e) => {
            warn!("rate limiter unavailable, failing open: {}", e);
            next.run(req).await
        }
    }
}

/// Peer address only. Tenant slugs and headers are client-chosen and must
/// not select the bucket.
fn bucket_key(req: &Request) -> String {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    rate_limit_key(&ip)
}

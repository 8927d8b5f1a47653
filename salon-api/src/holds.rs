use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use salon_core::hold::{Hold, HoldRequest};
use salon_core::session::SessionToken;
use salon_core::CoreError;
use salon_shared::models::events::{HoldPlacedEvent, HoldReleasedEvent, SlotEvent};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::OptionalCustomer;
use crate::session::{session_cookie, BookingSession};
use crate::state::AppState;
use crate::tenant::CurrentTenant;

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    /// Single-service widgets send `service_id`, multi-service ones `service_ids`.
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub service_ids: Vec<Uuid>,
    pub staff_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
}

impl CreateHoldRequest {
    fn services(&self) -> Vec<Uuid> {
        if !self.service_ids.is_empty() {
            return self.service_ids.clone();
        }
        self.service_id.into_iter().collect()
    }
}

#[derive(Debug, Serialize)]
pub struct HoldResponse {
    pub hold_id: Uuid,
    pub staff_id: Uuid,
    pub service_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub expires_at: DateTime<Utc>,
    pub session_token: String,
}

impl HoldResponse {
    fn new(hold: &Hold, session: &SessionToken) -> Self {
        Self {
            hold_id: hold.id,
            staff_id: hold.staff_id,
            service_ids: hold.service_ids.clone(),
            start_time: hold.start_time,
            end_time: hold.end_time(),
            duration_minutes: hold.duration_minutes,
            expires_at: hold.expires_at,
            session_token: session.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
    pub hold_id: Option<Uuid>,
}

/// POST .../appointments/hold
pub async fn create_hold(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    session: BookingSession,
    customer: OptionalCustomer,
    jar: CookieJar,
    payload: Result<Json<CreateHoldRequest>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<HoldResponse>), AppError> {
    let Json(body) = payload?;
    let session = session.or_mint();

    let request = HoldRequest {
        service_ids: body.services(),
        staff_id: body.staff_id,
        start_time: body.start_time,
        duration_minutes: body.duration_minutes,
        session: Some(session.clone()),
        customer_id: customer.customer_id(),
    };

    let hold = match state.holds.create_hold(&tenant, request).await {
        Ok(hold) => hold,
        Err(e) => {
            let err = AppError::from(e);
            state.metrics.record("create_hold", err.outcome());
            return Err(err);
        }
    };
    state.metrics.record("create_hold", "ok");

    state.publish(SlotEvent::HoldPlaced(HoldPlacedEvent {
        tenant_id: tenant.id,
        hold_id: hold.id,
        staff_id: hold.staff_id,
        start_time: hold.start_time,
        end_time: hold.end_time(),
        expires_at: hold.expires_at,
    }));

    let jar = jar.add(session_cookie(&session, &state.cookies));
    Ok((StatusCode::CREATED, jar, Json(HoldResponse::new(&hold, &session))))
}

/// GET .../appointments/hold
pub async fn get_hold(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    BookingSession(session): BookingSession,
) -> Result<Json<HoldResponse>, AppError> {
    let Some(session) = session else {
        return Err(CoreError::HoldNotFound.into());
    };
    let hold = state.holds.current_hold(&tenant, Some(&session)).await?;
    Ok(Json(HoldResponse::new(&hold, &session)))
}

/// DELETE .../appointments/hold
pub async fn release_hold(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    BookingSession(session): BookingSession,
) -> Result<Json<ReleaseResponse>, AppError> {
    let released = match state.holds.release_hold(&tenant, session.as_ref()).await {
        Ok(released) => released,
        Err(e) => {
            let err = AppError::from(e);
            state.metrics.record("release_hold", err.outcome());
            return Err(err);
        }
    };
    state.metrics.record("release_hold", "ok");

    if let Some(hold) = &released {
        state.publish(SlotEvent::HoldReleased(HoldReleasedEvent {
            tenant_id: tenant.id,
            staff_id: Some(hold.staff_id),
            released_at: state.holds.now(),
        }));
    }

    Ok(Json(ReleaseResponse {
        released: released.is_some(),
        hold_id: released.map(|h| h.id),
    }))
}

/// GET .../slots/stream
pub async fn slot_stream(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("SSE subscriber attached for tenant {}", tenant.slug);
    let rx = state.sse_tx.subscribe();
    let tenant_id = tenant.id;

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        // lagged receivers just skip ahead
        let event = result.ok()?;
        if event.tenant_id() != tenant_id {
            return None;
        }
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok(Event::default().event(event.name()).data(data)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

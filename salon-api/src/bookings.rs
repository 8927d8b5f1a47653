use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use salon_core::booking::{AppointmentStatus, ConfirmRequest, ConfirmedBooking, DirectBookingRequest};
use salon_core::customer::CustomerDetails;
use salon_core::CoreResult;
use salon_shared::models::events::{AppointmentConfirmedEvent, SlotEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::tenant::CurrentTenant;

#[derive(Debug, Deserialize)]
pub struct CustomerPayload {
    #[serde(flatten)]
    pub details: CustomerDetails,
    #[serde(default)]
    pub terms_accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBookingRequest {
    pub hold_id: Uuid,
    pub customer: CustomerPayload,
    /// Older widgets send the flag next to `customer`.
    #[serde(default)]
    pub terms_accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct DirectBookingPayload {
    pub service_id: Uuid,
    pub staff_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub customer: CustomerPayload,
    #[serde(default)]
    pub terms_accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub message: String,
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<ConfirmedBooking> for BookingResponse {
    fn from(booking: ConfirmedBooking) -> Self {
        let message = match booking.status {
            AppointmentStatus::Requested => "Appointment requested; the salon will confirm it shortly",
            _ => "Appointment confirmed",
        };
        Self {
            appointment_id: booking.appointment_id,
            status: booking.status,
            message: message.to_string(),
            customer_id: booking.customer_id,
            staff_id: booking.staff_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
        }
    }
}

/// POST .../appointments/confirm
pub async fn confirm_booking(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    payload: Result<Json<ConfirmBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let Json(body) = payload?;
    let request = ConfirmRequest {
        hold_id: body.hold_id,
        terms_accepted: body.customer.terms_accepted || body.terms_accepted,
        customer: body.customer.details,
    };

    let booking = finish(&state, "confirm", tenant.id, state.bookings.confirm(&tenant, request).await)?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// POST .../appointments
pub async fn book_direct(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    payload: Result<Json<DirectBookingPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let Json(body) = payload?;
    let request = DirectBookingRequest {
        service_id: body.service_id,
        staff_id: body.staff_id,
        start_time: body.start_time,
        terms_accepted: body.customer.terms_accepted || body.terms_accepted,
        customer: body.customer.details,
    };

    let booking = finish(&state, "book_direct", tenant.id, state.bookings.book_direct(&tenant, request).await)?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

fn finish(
    state: &AppState,
    operation: &str,
    tenant_id: Uuid,
    result: CoreResult<ConfirmedBooking>,
) -> Result<ConfirmedBooking, AppError> {
    match result {
        Ok(booking) => {
            state.metrics.record(operation, "ok");
            state.publish(SlotEvent::AppointmentConfirmed(AppointmentConfirmedEvent {
                tenant_id,
                appointment_id: booking.appointment_id,
                staff_id: booking.staff_id,
                start_time: booking.start_time,
                end_time: booking.end_time,
                status: booking.status.to_string(),
            }));
            Ok(booking)
        }
        Err(e) => {
            let err = AppError::from(e);
            state.metrics.record(operation, err.outcome());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terms_flag_inside_customer() {
        let body: ConfirmBookingRequest = serde_json::from_value(json!({
            "hold_id": Uuid::new_v4(),
            "customer": {
                "name": "Jane Doe",
                "email": "jane@example.com",
                "phone": "+44 7700 900000",
                "terms_accepted": true
            }
        }))
        .unwrap();

        assert!(body.customer.terms_accepted);
        assert!(!body.terms_accepted);
        assert_eq!(body.customer.details.email.inner(), "jane@example.com");
        assert!(!body.customer.details.marketing_consent);
    }

    #[test]
    fn test_missing_terms_defaults_to_false() {
        let body: ConfirmBookingRequest = serde_json::from_value(json!({
            "hold_id": Uuid::new_v4(),
            "customer": { "name": "Jane", "email": "jane@example.com", "phone": "1" }
        }))
        .unwrap();

        assert!(!(body.customer.terms_accepted || body.terms_accepted));
    }
}

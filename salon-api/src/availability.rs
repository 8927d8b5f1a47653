use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::NaiveDate;
use salon_core::availability::{Slot, SlotQuery};
use salon_core::CoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::tenant::CurrentTenant;

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub service_id: Option<Uuid>,
    /// Comma-separated list.
    pub service_ids: Option<String>,
    pub date: NaiveDate,
    pub staff_id: Option<Uuid>,
}

impl AvailabilityParams {
    fn services(&self) -> Result<Vec<Uuid>, AppError> {
        let mut ids = Vec::new();
        if let Some(list) = &self.service_ids {
            for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let id = Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid service id {raw}")))?;
                ids.push(id);
            }
        }
        if ids.is_empty() {
            ids.extend(self.service_id);
        }
        if ids.is_empty() {
            return Err(CoreError::ValidationError("at least one service is required".into()).into());
        }
        Ok(ids)
    }
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// GET .../availability
pub async fn get_availability(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    params: Result<Query<AvailabilityParams>, QueryRejection>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let Query(params) = params?;
    tenant.ensure_bookable()?;

    let query = SlotQuery {
        tenant_id: tenant.id,
        service_ids: params.services()?,
        date: params.date,
        staff_id: params.staff_id,
    };
    let slots = state.availability.available_slots(&query).await?;

    Ok(Json(AvailabilityResponse { date: params.date, slots }))
}

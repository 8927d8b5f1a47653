use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::customer::CustomerDetails;
use crate::repository::{AppointmentRepository, CustomerRepository, HoldRepository, ServiceCatalog, StoreError};
use crate::tenant::Tenant;
use crate::time::Clock;
use crate::{ConflictSource, CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Requested,
    Pending,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Statuses that occupy the staff member's calendar.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Confirmed | AppointmentStatus::Requested)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Requested => "requested",
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        };
        f.write_str(s)
    }
}

impl FromStr for AppointmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "requested" => Ok(AppointmentStatus::Requested),
            "pending" => Ok(AppointmentStatus::Pending),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(CoreError::InternalError(format!("unknown appointment status {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentSource {
    Online,
    Manual,
}

impl fmt::Display for AppointmentSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppointmentSource::Online => f.write_str("online"),
            AppointmentSource::Manual => f.write_str("manual"),
        }
    }
}

impl FromStr for AppointmentSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(AppointmentSource::Online),
            "manual" => Ok(AppointmentSource::Manual),
            other => Err(CoreError::InternalError(format!("unknown appointment source {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub service_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub source: AppointmentSource,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub service_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub source: AppointmentSource,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub hold_id: Uuid,
    pub customer: CustomerDetails,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectBookingRequest {
    pub service_id: Uuid,
    pub staff_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub customer: CustomerDetails,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedBooking {
    pub appointment_id: Uuid,
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub status: AppointmentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<&Appointment> for ConfirmedBooking {
    fn from(a: &Appointment) -> Self {
        Self {
            appointment_id: a.id,
            customer_id: a.customer_id,
            staff_id: a.staff_id,
            status: a.status,
            start_time: a.start_time,
            end_time: a.end_time,
        }
    }
}

/// Turns holds into appointments.
pub struct BookingConfirmer {
    holds: Arc<dyn HoldRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    customers: Arc<dyn CustomerRepository>,
    catalog: Arc<dyn ServiceCatalog>,
    clock: Arc<dyn Clock>,
}

impl BookingConfirmer {
    pub fn new(
        holds: Arc<dyn HoldRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        customers: Arc<dyn CustomerRepository>,
        catalog: Arc<dyn ServiceCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            holds,
            appointments,
            customers,
            catalog,
            clock,
        }
    }

    pub async fn confirm(&self, tenant: &Tenant, req: ConfirmRequest) -> CoreResult<ConfirmedBooking> {
        // Local gate: nothing below runs unless the customer accepted the terms.
        check_submission(req.terms_accepted, &req.customer)?;
        tenant.ensure_bookable()?;

        // 1. Hold must exist and be live
        let hold = self
            .holds
            .find_hold(tenant.id, req.hold_id)
            .await?
            .ok_or(CoreError::HoldNotFound)?;

        if hold.is_expired(self.clock.now()) {
            if let Err(e) = self.holds.delete_hold(tenant.id, hold.id).await {
                warn!("Failed to delete expired hold {}: {}", hold.id, e);
            }
            info!("Hold {} expired at {}", hold.id, hold.expires_at);
            return Err(CoreError::HoldExpired);
        }

        // 2. Customer
        let customer_id = self
            .customers
            .upsert_customer(&req.customer.to_new_customer(tenant.id))
            .await?;

        // 3. Appointment
        let new = NewAppointment {
            tenant_id: tenant.id,
            customer_id,
            staff_id: hold.staff_id,
            service_ids: hold.service_ids.clone(),
            start_time: hold.start_time,
            end_time: hold.end_time(),
            status: AppointmentStatus::Confirmed,
            source: AppointmentSource::Online,
            notes: req.customer.notes.clone(),
        };
        let inserted = if hold.is_multi_service() {
            self.appointments.insert_multi_service_appointment(&new).await
        } else {
            self.appointments.insert_appointment(&new).await
        };
        let appointment = inserted.map_err(|e| conflict_or_internal(e, hold.staff_id))?;

        // 4. The hold has served its purpose; if this fails it expires anyway
        if let Err(e) = self.holds.delete_hold(tenant.id, hold.id).await {
            warn!("Appointment {} created but hold {} not deleted: {}", appointment.id, hold.id, e);
        }

        info!(
            "Appointment {} confirmed for customer {} ({}) with staff {} [{}, {})",
            appointment.id,
            customer_id,
            req.customer.email,
            appointment.staff_id,
            appointment.start_time,
            appointment.end_time
        );
        Ok(ConfirmedBooking::from(&appointment))
    }

    /// Single-service booking without a hold step.
    pub async fn book_direct(
        &self,
        tenant: &Tenant,
        req: DirectBookingRequest,
    ) -> CoreResult<ConfirmedBooking> {
        check_submission(req.terms_accepted, &req.customer)?;
        tenant.ensure_bookable()?;

        if req.start_time <= self.clock.now() {
            return Err(CoreError::ValidationError("start_time must be in the future".into()));
        }

        let service = self
            .catalog
            .find_services(tenant.id, &[req.service_id])
            .await?
            .into_iter()
            .find(|s| s.id == req.service_id && s.is_active)
            .ok_or_else(|| CoreError::ValidationError(format!("unknown service {}", req.service_id)))?;

        let customer_id = self
            .customers
            .upsert_customer(&req.customer.to_new_customer(tenant.id))
            .await?;

        let status = if tenant.auto_confirm {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Requested
        };
        let new = NewAppointment {
            tenant_id: tenant.id,
            customer_id,
            staff_id: req.staff_id,
            service_ids: vec![service.id],
            start_time: req.start_time,
            end_time: req.start_time + Duration::minutes(service.duration_minutes),
            status,
            source: AppointmentSource::Online,
            notes: req.customer.notes.clone(),
        };
        let appointment = self
            .appointments
            .insert_appointment(&new)
            .await
            .map_err(|e| conflict_or_internal(e, req.staff_id))?;

        info!("Direct booking {} ({}) for tenant {}", appointment.id, appointment.status, tenant.slug);
        Ok(ConfirmedBooking::from(&appointment))
    }
}

fn check_submission(terms_accepted: bool, customer: &CustomerDetails) -> CoreResult<()> {
    if !terms_accepted {
        return Err(CoreError::TermsNotAccepted);
    }
    customer.validate()
}

/// An overlap rejection here is the expected outcome of two customers racing
/// for the same slot, not a failure of this service.
fn conflict_or_internal(err: StoreError, staff_id: Uuid) -> CoreError {
    match err {
        StoreError::Conflict(detail) => {
            info!("Slot taken for staff {} at insert time: {}", staff_id, detail);
            CoreError::conflict(ConflictSource::ConfirmedAppointment)
        }
        other => other.into(),
    }
}

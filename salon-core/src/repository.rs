//! The store contract. Everything behind these traits is owned by the
//! relational store (tables, range-overlap constraints, stored procedures);
//! this crate only orchestrates calls against it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::availability::{Slot, SlotQuery};
use crate::booking::{Appointment, NewAppointment};
use crate::customer::NewCustomer;
use crate::hold::Hold;
use crate::session::SessionToken;
use crate::tenant::{SalonService, Tenant};
use crate::time::TimeRange;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The appointments overlap constraint rejected a write.
    #[error("overlapping appointment: {0}")]
    Conflict(String),
    #[error("store failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Services of `tenant_id` among `ids`. Missing ids are simply absent.
    async fn find_services(&self, tenant_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<SalonService>>;
}

#[async_trait]
pub trait HoldRepository: Send + Sync {
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()>;

    /// Atomically swaps whatever the hold's session already holds for `hold`.
    /// Returns true when an earlier hold was replaced.
    async fn replace_session_hold(&self, hold: &Hold) -> StoreResult<bool>;

    /// Fetches regardless of expiry; the caller decides what expired means.
    async fn find_hold(&self, tenant_id: Uuid, hold_id: Uuid) -> StoreResult<Option<Hold>>;

    async fn find_session_hold(
        &self,
        tenant_id: Uuid,
        session: &SessionToken,
    ) -> StoreResult<Option<Hold>>;

    /// Holds on `staff_id` overlapping `range` with `expires_at > now`.
    async fn find_live_overlapping(
        &self,
        tenant_id: Uuid,
        staff_id: Uuid,
        range: &TimeRange,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Hold>>;

    async fn delete_hold(&self, tenant_id: Uuid, hold_id: Uuid) -> StoreResult<bool>;

    /// Returns the number of rows removed (0 or 1).
    async fn delete_session_holds(&self, tenant_id: Uuid, session: &SessionToken) -> StoreResult<u64>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// `confirmed`/`requested` appointments on `staff_id` overlapping `range`.
    async fn find_active_overlapping(
        &self,
        tenant_id: Uuid,
        staff_id: Uuid,
        range: &TimeRange,
    ) -> StoreResult<Vec<Appointment>>;

    /// Single-service insert with an explicit `[start, end)` range.
    async fn insert_appointment(&self, appointment: &NewAppointment) -> StoreResult<Appointment>;

    /// Atomic multi-service insert. The end time is derived by the store from
    /// the summed service durations; `appointment.end_time` is ignored.
    async fn insert_multi_service_appointment(
        &self,
        appointment: &NewAppointment,
    ) -> StoreResult<Appointment>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Insert-on-conflict-update keyed by `(tenant_id, email)`.
    async fn upsert_customer(&self, customer: &NewCustomer) -> StoreResult<Uuid>;
}

#[async_trait]
pub trait AvailabilityResolver: Send + Sync {
    async fn available_slots(&self, query: &SlotQuery) -> StoreResult<Vec<Slot>>;
}

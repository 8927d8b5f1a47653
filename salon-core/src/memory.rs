//! In-process implementation of the store contract.
//!
//! Mirrors the relational store closely enough to exercise the hold/confirm
//! state machine: the appointments overlap constraint is enforced atomically
//! under the write lock, and every repository call is recorded so tests can
//! assert that a code path never reached storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::availability::{Slot, SlotQuery};
use crate::booking::{Appointment, NewAppointment};
use crate::customer::{Customer, NewCustomer};
use crate::hold::Hold;
use crate::repository::{
    AppointmentRepository, AvailabilityResolver, CustomerRepository, HoldRepository, ServiceCatalog,
    StoreError, StoreResult, TenantRepository,
};
use crate::session::SessionToken;
use crate::tenant::{SalonService, Tenant};
use crate::time::TimeRange;

#[derive(Default)]
struct State {
    tenants: HashMap<Uuid, Tenant>,
    services: HashMap<Uuid, SalonService>,
    holds: HashMap<Uuid, Hold>,
    appointments: HashMap<Uuid, Appointment>,
    customers: HashMap<Uuid, Customer>,
    slots: Vec<Slot>,
    fail_hold_deletes: bool,
}

impl State {
    fn check_overlap(&self, new: &NewAppointment, end: DateTime<Utc>) -> StoreResult<()> {
        let range = TimeRange { start: new.start_time, end };
        let clash = self.appointments.values().find(|a| {
            a.tenant_id == new.tenant_id
                && a.staff_id == new.staff_id
                && a.status.is_active()
                && range.overlaps(&TimeRange { start: a.start_time, end: a.end_time })
        });
        match clash {
            Some(a) => Err(StoreError::Conflict(format!(
                "conflicting key value violates exclusion constraint \"appointments_no_overlap\" (appointment {})",
                a.id
            ))),
            None => Ok(()),
        }
    }

    fn insert(&mut self, new: &NewAppointment, end: DateTime<Utc>) -> StoreResult<Appointment> {
        if end <= new.start_time {
            return Err(StoreError::Backend("appointment end must be after start".into()));
        }
        self.check_overlap(new, end)?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            customer_id: new.customer_id,
            staff_id: new.staff_id,
            service_ids: new.service_ids.clone(),
            start_time: new.start_time,
            end_time: end,
            status: new.status,
            source: new.source,
            notes: new.notes.clone(),
        };
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    calls: RwLock<Vec<&'static str>>,
}

/// A ready-made tenant with one stylist and two services.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub tenant: Tenant,
    pub staff_id: Uuid,
    /// 30 minutes.
    pub haircut: SalonService,
    /// 90 minutes.
    pub coloring: SalonService,
    /// Morning of the fixture day; every `at(..)` from 08:00 on is in the future.
    pub now: DateTime<Utc>,
}

impl Fixture {
    pub fn at(&self, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, hour, minute, 0)
            .single()
            .unwrap_or(self.now)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_fixture() -> (Arc<Self>, Fixture) {
        let store = Arc::new(Self::new());
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: "studio-noir".to_string(),
            name: "Studio Noir".to_string(),
            booking_enabled: true,
            auto_confirm: true,
        };
        let haircut = SalonService {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            name: "Haircut".to_string(),
            duration_minutes: 30,
            price_cents: 3500,
            is_active: true,
        };
        let coloring = SalonService {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            name: "Full colour".to_string(),
            duration_minutes: 90,
            price_cents: 9000,
            is_active: true,
        };

        store.add_tenant(tenant.clone()).await;
        store.add_service(haircut.clone()).await;
        store.add_service(coloring.clone()).await;

        let fixture = Fixture {
            tenant,
            staff_id: Uuid::new_v4(),
            haircut,
            coloring,
            now: Utc.with_ymd_and_hms(2030, 6, 1, 7, 0, 0).single().unwrap_or_else(Utc::now),
        };
        (store, fixture)
    }

    pub async fn add_tenant(&self, tenant: Tenant) {
        self.state.write().await.tenants.insert(tenant.id, tenant);
    }

    pub async fn add_service(&self, service: SalonService) {
        self.state.write().await.services.insert(service.id, service);
    }

    pub async fn set_slots(&self, slots: Vec<Slot>) {
        self.state.write().await.slots = slots;
    }

    /// Inserts a hold directly, skipping every advisory check.
    pub async fn seed_hold(
        &self,
        fx: &Fixture,
        start: DateTime<Utc>,
        minutes: i64,
        expires_at: DateTime<Utc>,
    ) -> Hold {
        let hold = Hold {
            id: Uuid::new_v4(),
            tenant_id: fx.tenant.id,
            staff_id: fx.staff_id,
            service_ids: vec![fx.haircut.id],
            start_time: start,
            duration_minutes: minutes,
            session: None,
            customer_id: None,
            created_at: expires_at - Duration::minutes(10),
            expires_at,
        };
        self.state.write().await.holds.insert(hold.id, hold.clone());
        hold
    }

    pub async fn fail_hold_deletes(&self, fail: bool) {
        self.state.write().await.fail_hold_deletes = fail;
    }

    pub async fn hold(&self, id: Uuid) -> Option<Hold> {
        self.state.read().await.holds.get(&id).cloned()
    }

    pub async fn appointment(&self, id: Uuid) -> Option<Appointment> {
        self.state.read().await.appointments.get(&id).cloned()
    }

    pub async fn customer(&self, id: Uuid) -> Option<Customer> {
        self.state.read().await.customers.get(&id).cloned()
    }

    pub async fn appointment_count(&self) -> usize {
        self.state.read().await.appointments.len()
    }

    pub async fn customer_count(&self) -> usize {
        self.state.read().await.customers.len()
    }

    pub async fn session_hold_count(&self, tenant_id: Uuid, session: &SessionToken) -> usize {
        self.state
            .read()
            .await
            .holds
            .values()
            .filter(|h| h.tenant_id == tenant_id && h.session.as_ref() == Some(session))
            .count()
    }

    /// Names of the repository methods called so far, in order.
    pub async fn calls(&self) -> Vec<&'static str> {
        self.calls.read().await.clone()
    }

    pub async fn reset_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, call: &'static str) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl TenantRepository for InMemoryStore {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        self.record("find_by_slug").await;
        let state = self.state.read().await;
        Ok(state.tenants.values().find(|t| t.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        self.record("find_by_id").await;
        Ok(self.state.read().await.tenants.get(&id).cloned())
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryStore {
    async fn find_services(&self, tenant_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<SalonService>> {
        self.record("find_services").await;
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.services.get(id))
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HoldRepository for InMemoryStore {
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()> {
        self.record("insert_hold").await;
        self.state.write().await.holds.insert(hold.id, hold.clone());
        Ok(())
    }

    async fn replace_session_hold(&self, hold: &Hold) -> StoreResult<bool> {
        self.record("replace_session_hold").await;
        let mut state = self.state.write().await;
        let before = state.holds.len();
        if let Some(session) = &hold.session {
            state
                .holds
                .retain(|_, h| !(h.tenant_id == hold.tenant_id && h.session.as_ref() == Some(session)));
        }
        let replaced = state.holds.len() < before;
        state.holds.insert(hold.id, hold.clone());
        Ok(replaced)
    }

    async fn find_hold(&self, tenant_id: Uuid, hold_id: Uuid) -> StoreResult<Option<Hold>> {
        self.record("find_hold").await;
        let state = self.state.read().await;
        Ok(state.holds.get(&hold_id).filter(|h| h.tenant_id == tenant_id).cloned())
    }

    async fn find_session_hold(
        &self,
        tenant_id: Uuid,
        session: &SessionToken,
    ) -> StoreResult<Option<Hold>> {
        self.record("find_session_hold").await;
        let state = self.state.read().await;
        Ok(state
            .holds
            .values()
            .filter(|h| h.tenant_id == tenant_id && h.session.as_ref() == Some(session))
            .max_by_key(|h| h.created_at)
            .cloned())
    }

    async fn find_live_overlapping(
        &self,
        tenant_id: Uuid,
        staff_id: Uuid,
        range: &TimeRange,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Hold>> {
        self.record("find_live_overlapping").await;
        let state = self.state.read().await;
        Ok(state
            .holds
            .values()
            .filter(|h| {
                h.tenant_id == tenant_id
                    && h.staff_id == staff_id
                    && !h.is_expired(now)
                    && h.range().overlaps(range)
            })
            .cloned()
            .collect())
    }

    async fn delete_hold(&self, tenant_id: Uuid, hold_id: Uuid) -> StoreResult<bool> {
        self.record("delete_hold").await;
        let mut state = self.state.write().await;
        if state.fail_hold_deletes {
            return Err(StoreError::Backend("connection reset by peer".into()));
        }
        let owned = state.holds.get(&hold_id).is_some_and(|h| h.tenant_id == tenant_id);
        Ok(owned && state.holds.remove(&hold_id).is_some())
    }

    async fn delete_session_holds(&self, tenant_id: Uuid, session: &SessionToken) -> StoreResult<u64> {
        self.record("delete_session_holds").await;
        let mut state = self.state.write().await;
        let before = state.holds.len();
        state
            .holds
            .retain(|_, h| !(h.tenant_id == tenant_id && h.session.as_ref() == Some(session)));
        Ok((before - state.holds.len()) as u64)
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryStore {
    async fn find_active_overlapping(
        &self,
        tenant_id: Uuid,
        staff_id: Uuid,
        range: &TimeRange,
    ) -> StoreResult<Vec<Appointment>> {
        self.record("find_active_overlapping").await;
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && a.staff_id == staff_id
                    && a.status.is_active()
                    && range.overlaps(&TimeRange { start: a.start_time, end: a.end_time })
            })
            .cloned()
            .collect())
    }

    async fn insert_appointment(&self, appointment: &NewAppointment) -> StoreResult<Appointment> {
        self.record("insert_appointment").await;
        self.state.write().await.insert(appointment, appointment.end_time)
    }

    async fn insert_multi_service_appointment(
        &self,
        appointment: &NewAppointment,
    ) -> StoreResult<Appointment> {
        self.record("insert_multi_service_appointment").await;
        let mut state = self.state.write().await;

        let mut minutes = 0;
        for id in &appointment.service_ids {
            let service = state
                .services
                .get(id)
                .filter(|s| s.tenant_id == appointment.tenant_id)
                .ok_or_else(|| StoreError::Backend(format!("service {id} not found")))?;
            minutes += service.duration_minutes;
        }
        let end = appointment.start_time + Duration::minutes(minutes);
        state.insert(appointment, end)
    }
}

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn upsert_customer(&self, customer: &NewCustomer) -> StoreResult<Uuid> {
        self.record("upsert_customer").await;
        let mut state = self.state.write().await;

        let existing = state
            .customers
            .values_mut()
            .find(|c| c.tenant_id == customer.tenant_id && c.email == customer.email);
        if let Some(c) = existing {
            c.first_name = customer.first_name.clone();
            c.last_name = customer.last_name.clone();
            c.phone = customer.phone.clone();
            c.marketing_consent = customer.marketing_consent;
            return Ok(c.id);
        }

        let id = Uuid::new_v4();
        state.customers.insert(
            id,
            Customer {
                id,
                tenant_id: customer.tenant_id,
                first_name: customer.first_name.clone(),
                last_name: customer.last_name.clone(),
                email: customer.email.clone(),
                phone: customer.phone.clone(),
                marketing_consent: customer.marketing_consent,
                status: "active".to_string(),
                source: "online".to_string(),
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl AvailabilityResolver for InMemoryStore {
    async fn available_slots(&self, query: &SlotQuery) -> StoreResult<Vec<Slot>> {
        self.record("available_slots").await;
        let state = self.state.read().await;
        Ok(state
            .slots
            .iter()
            .filter(|s| s.start_time.date_naive() == query.date)
            .map(|s| {
                let mut slot = s.clone();
                if let Some(staff) = query.staff_id {
                    slot.staff_ids.retain(|id| *id == staff);
                }
                slot
            })
            .filter(|s| !s.staff_ids.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{AppointmentSource, AppointmentStatus};

    fn new_appointment(fx: &Fixture, start: DateTime<Utc>, end: DateTime<Utc>) -> NewAppointment {
        NewAppointment {
            tenant_id: fx.tenant.id,
            customer_id: Uuid::new_v4(),
            staff_id: fx.staff_id,
            service_ids: vec![fx.haircut.id],
            start_time: start,
            end_time: end,
            status: AppointmentStatus::Confirmed,
            source: AppointmentSource::Manual,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_overlap_constraint() {
        let (store, fx) = InMemoryStore::with_fixture().await;

        store.insert_appointment(&new_appointment(&fx, fx.at(9, 0), fx.at(10, 0))).await.unwrap();
        let clash = store.insert_appointment(&new_appointment(&fx, fx.at(9, 30), fx.at(10, 30))).await;
        assert!(matches!(clash, Err(StoreError::Conflict(_))));

        // adjacent is fine, and so is another stylist
        store.insert_appointment(&new_appointment(&fx, fx.at(10, 0), fx.at(10, 30))).await.unwrap();
        let mut other_staff = new_appointment(&fx, fx.at(9, 30), fx.at(10, 30));
        other_staff.staff_id = Uuid::new_v4();
        store.insert_appointment(&other_staff).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_appointments_free_the_slot() {
        let (store, fx) = InMemoryStore::with_fixture().await;

        let mut cancelled = new_appointment(&fx, fx.at(9, 0), fx.at(10, 0));
        cancelled.status = AppointmentStatus::Cancelled;
        store.insert_appointment(&cancelled).await.unwrap();

        let range = TimeRange::new(fx.at(9, 0), fx.at(10, 0)).unwrap();
        let active = store.find_active_overlapping(fx.tenant.id, fx.staff_id, &range).await.unwrap();
        assert!(active.is_empty());
        store.insert_appointment(&new_appointment(&fx, fx.at(9, 0), fx.at(10, 0))).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_tenant_and_email() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let customer = NewCustomer {
            tenant_id: fx.tenant.id,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "0612".into(),
            marketing_consent: false,
        };

        let a = store.upsert_customer(&customer).await.unwrap();
        let b = store.upsert_customer(&customer).await.unwrap();
        assert_eq!(a, b);

        let elsewhere = NewCustomer { tenant_id: Uuid::new_v4(), ..customer };
        let c = store.upsert_customer(&elsewhere).await.unwrap();
        assert_ne!(a, c);
        assert_eq!(store.customer_count().await, 2);
        assert_eq!(store.calls().await, vec!["upsert_customer"; 3]);
    }
}

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::{pick_staff, SlotQuery};
use crate::repository::{AppointmentRepository, AvailabilityResolver, HoldRepository, ServiceCatalog};
use crate::session::SessionToken;
use crate::tenant::{total_duration_minutes, Tenant};
use crate::time::{Clock, TimeRange};
use crate::{ConflictSource, CoreError, CoreResult};

/// A provisional claim on a staff member's calendar. Never extended or
/// updated; it is consumed by confirmation, released, or ignored once
/// `expires_at` has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub staff_id: Uuid,
    /// Ordered; position `i` becomes `appointment_services.position = i`.
    pub service_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub session: Option<SessionToken>,
    pub customer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes)
    }

    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_multi_service(&self) -> bool {
        self.service_ids.len() > 1
    }

    fn owned_by(&self, session: Option<&SessionToken>) -> bool {
        matches!((self.session.as_ref(), session), (Some(mine), Some(theirs)) if mine == theirs)
    }
}

/// Tunables for hold creation. One TTL for every entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldPolicy {
    pub ttl: Duration,
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
}

impl HoldPolicy {
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.num_seconds().max(0) as u64
    }
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            min_duration_minutes: 15,
            max_duration_minutes: 480,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub service_ids: Vec<Uuid>,
    /// `None` lets the availability resolver pick the first free staff member.
    pub staff_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    /// `None` derives the duration from the services.
    pub duration_minutes: Option<i64>,
    pub session: Option<SessionToken>,
    pub customer_id: Option<Uuid>,
}

/// Creates, reads and releases holds.
///
/// The overlap checks done here are an early rejection to spare customers a
/// failed checkout. They race with each other and are not a lock: the only
/// authoritative guard is the store's overlap constraint on appointments,
/// hit at confirmation time.
pub struct HoldManager {
    holds: Arc<dyn HoldRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    catalog: Arc<dyn ServiceCatalog>,
    availability: Arc<dyn AvailabilityResolver>,
    clock: Arc<dyn Clock>,
    policy: HoldPolicy,
}

impl HoldManager {
    pub fn new(
        holds: Arc<dyn HoldRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        catalog: Arc<dyn ServiceCatalog>,
        availability: Arc<dyn AvailabilityResolver>,
        clock: Arc<dyn Clock>,
        policy: HoldPolicy,
    ) -> Self {
        Self {
            holds,
            appointments,
            catalog,
            availability,
            clock,
            policy,
        }
    }

    /// The manager's notion of now, for timestamps that must agree with expiry.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_hold(&self, tenant: &Tenant, req: HoldRequest) -> CoreResult<Hold> {
        tenant.ensure_bookable()?;
        let now = self.clock.now();

        // 1. Request shape
        if req.service_ids.is_empty() {
            return Err(CoreError::ValidationError("at least one service is required".into()));
        }
        let mut seen = HashSet::new();
        if !req.service_ids.iter().all(|id| seen.insert(*id)) {
            return Err(CoreError::ValidationError("duplicate service in request".into()));
        }
        if req.start_time <= now {
            return Err(CoreError::ValidationError("start_time must be in the future".into()));
        }

        // 2. Services and duration
        let services = self.catalog.find_services(tenant.id, &req.service_ids).await?;
        for id in &req.service_ids {
            let known = services.iter().any(|s| s.id == *id && s.is_active);
            if !known {
                return Err(CoreError::ValidationError(format!("unknown service {id}")));
            }
        }
        let duration_minutes = req
            .duration_minutes
            .unwrap_or_else(|| total_duration_minutes(&services, &req.service_ids));
        if duration_minutes < self.policy.min_duration_minutes
            || duration_minutes > self.policy.max_duration_minutes
        {
            return Err(CoreError::ValidationError(format!(
                "duration_minutes must be between {} and {}",
                self.policy.min_duration_minutes, self.policy.max_duration_minutes
            )));
        }
        let range = TimeRange::from_minutes(req.start_time, duration_minutes)
            .ok_or_else(|| CoreError::ValidationError("invalid time range".into()))?;

        // 3. Staff
        let staff_id = match req.staff_id {
            Some(id) => id,
            None => self.assign_staff(tenant, &req).await?,
        };

        // 4. Advisory checks: confirmed work first, then other customers' holds
        let booked = self
            .appointments
            .find_active_overlapping(tenant.id, staff_id, &range)
            .await?;
        if !booked.is_empty() {
            info!("Hold rejected, staff {} already booked at {}", staff_id, range.start);
            return Err(CoreError::conflict(ConflictSource::ConfirmedAppointment));
        }

        let held = self
            .holds
            .find_live_overlapping(tenant.id, staff_id, &range, now)
            .await?;
        if held.iter().any(|h| !h.owned_by(req.session.as_ref())) {
            info!("Hold rejected, staff {} held by another session at {}", staff_id, range.start);
            return Err(CoreError::SlotConflict {
                conflict: ConflictSource::HeldByOther,
                retry_after: Some(self.policy.ttl_seconds()),
            });
        }

        let hold = Hold {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            staff_id,
            service_ids: req.service_ids,
            start_time: range.start,
            duration_minutes,
            session: req.session,
            customer_id: req.customer_id,
            created_at: now,
            expires_at: now + self.policy.ttl,
        };

        // 5. One live hold per session: a new selection abandons the old one
        match &hold.session {
            Some(session) => {
                if self.holds.replace_session_hold(&hold).await? {
                    info!("Replaced previous hold for session {:?}", session);
                }
            }
            None => self.holds.insert_hold(&hold).await?,
        }

        info!(
            "Hold {} placed for tenant {} staff {} [{}, {}) until {}",
            hold.id,
            tenant.slug,
            hold.staff_id,
            hold.start_time,
            hold.end_time(),
            hold.expires_at
        );
        Ok(hold)
    }

    /// Drops the session's hold. A missing session is `HoldNotFound`; a
    /// session without a hold is a successful no-op. Returns the removed hold
    /// when there was one.
    pub async fn release_hold(
        &self,
        tenant: &Tenant,
        session: Option<&SessionToken>,
    ) -> CoreResult<Option<Hold>> {
        let session = session.ok_or(CoreError::HoldNotFound)?;

        let existing = self.holds.find_session_hold(tenant.id, session).await?;
        let removed = self.holds.delete_session_holds(tenant.id, session).await?;
        if removed == 0 {
            return Ok(None);
        }

        info!("Released hold for session {:?} (tenant {})", session, tenant.slug);
        Ok(existing)
    }

    /// The session's live hold, for countdown display.
    pub async fn current_hold(
        &self,
        tenant: &Tenant,
        session: Option<&SessionToken>,
    ) -> CoreResult<Hold> {
        let session = session.ok_or(CoreError::HoldNotFound)?;
        let hold = self
            .holds
            .find_session_hold(tenant.id, session)
            .await?
            .ok_or(CoreError::HoldNotFound)?;

        if hold.is_expired(self.clock.now()) {
            if let Err(e) = self.holds.delete_hold(tenant.id, hold.id).await {
                warn!("Failed to drop expired hold {}: {}", hold.id, e);
            }
            return Err(CoreError::HoldNotFound);
        }
        Ok(hold)
    }

    async fn assign_staff(&self, tenant: &Tenant, req: &HoldRequest) -> CoreResult<Uuid> {
        let query = SlotQuery {
            tenant_id: tenant.id,
            service_ids: req.service_ids.clone(),
            date: req.start_time.date_naive(),
            staff_id: None,
        };
        let slots = self.availability.available_slots(&query).await?;
        pick_staff(&slots, req.start_time).ok_or_else(|| {
            info!("No staff free at {} for tenant {}", req.start_time, tenant.slug);
            CoreError::conflict(ConflictSource::ConfirmedAppointment)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::Slot;
    use crate::memory::{Fixture, InMemoryStore};
    use crate::repository::StoreResult;
    use crate::time::ManualClock;

    fn manager(store: &Arc<InMemoryStore>, clock: &Arc<ManualClock>) -> HoldManager {
        HoldManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
            HoldPolicy::default(),
        )
    }

    fn request(fx: &Fixture, start: DateTime<Utc>, minutes: i64) -> HoldRequest {
        HoldRequest {
            service_ids: vec![fx.haircut.id],
            staff_id: Some(fx.staff_id),
            start_time: start,
            duration_minutes: Some(minutes),
            session: None,
            customer_id: None,
        }
    }

    #[tokio::test]
    async fn test_hold_expires_after_ttl() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);

        let hold = holds.create_hold(&fx.tenant, request(&fx, fx.at(14, 0), 30)).await.unwrap();
        assert_eq!(hold.expires_at, fx.now + Duration::minutes(10));
        assert_eq!(hold.end_time(), fx.at(14, 30));
        assert!(!hold.is_expired(clock.now()));

        clock.advance(Duration::minutes(10));
        assert!(hold.is_expired(clock.now()));
    }

    #[tokio::test]
    async fn test_overlapping_hold_from_other_session_is_rejected() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);

        let mut first = request(&fx, fx.at(14, 0), 30);
        first.session = Some(SessionToken::generate());
        holds.create_hold(&fx.tenant, first).await.unwrap();

        let mut second = request(&fx, fx.at(14, 15), 30);
        second.session = Some(SessionToken::generate());
        let err = holds.create_hold(&fx.tenant, second).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::SlotConflict { conflict: ConflictSource::HeldByOther, retry_after: Some(600) }
        ));
    }

    #[tokio::test]
    async fn test_expired_holds_do_not_block() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);

        holds.create_hold(&fx.tenant, request(&fx, fx.at(14, 0), 30)).await.unwrap();
        clock.advance(Duration::minutes(11));

        let again = holds.create_hold(&fx.tenant, request(&fx, fx.at(14, 0), 30)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_second_hold_replaces_first_for_same_session() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);
        let session = SessionToken::generate();

        let mut first = request(&fx, fx.at(10, 0), 30);
        first.session = Some(session.clone());
        let first = holds.create_hold(&fx.tenant, first).await.unwrap();

        // overlapping its own hold is allowed: the old one is abandoned
        let mut second = request(&fx, fx.at(10, 15), 30);
        second.session = Some(session.clone());
        let second = holds.create_hold(&fx.tenant, second).await.unwrap();

        assert!(store.hold(first.id).await.is_none());
        assert_eq!(store.hold(second.id).await.map(|h| h.id), Some(second.id));
        assert_eq!(store.session_hold_count(fx.tenant.id, &session).await, 1);
    }

    #[tokio::test]
    async fn test_duration_bounds_and_derivation() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);

        for minutes in [0, 14, 481] {
            let err = holds
                .create_hold(&fx.tenant, request(&fx, fx.at(11, 0), minutes))
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::ValidationError(_)), "{minutes}");
        }

        let mut derived = request(&fx, fx.at(11, 0), 0);
        derived.duration_minutes = None;
        derived.service_ids = vec![fx.coloring.id, fx.haircut.id];
        let hold = holds.create_hold(&fx.tenant, derived).await.unwrap();
        assert_eq!(hold.duration_minutes, 120);
        assert_eq!(hold.service_ids, vec![fx.coloring.id, fx.haircut.id]);
    }

    #[tokio::test]
    async fn test_rejects_bad_requests_before_conflict_checks() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);

        let mut none = request(&fx, fx.at(11, 0), 30);
        none.service_ids.clear();
        assert!(matches!(
            holds.create_hold(&fx.tenant, none).await,
            Err(CoreError::ValidationError(_))
        ));

        let mut unknown = request(&fx, fx.at(11, 0), 30);
        unknown.service_ids = vec![Uuid::new_v4()];
        assert!(matches!(
            holds.create_hold(&fx.tenant, unknown).await,
            Err(CoreError::ValidationError(_))
        ));

        let past = request(&fx, fx.now - Duration::hours(1), 30);
        assert!(matches!(
            holds.create_hold(&fx.tenant, past).await,
            Err(CoreError::ValidationError(_))
        ));

        let mut disabled = fx.tenant.clone();
        disabled.booking_enabled = false;
        assert!(matches!(
            holds.create_hold(&disabled, request(&fx, fx.at(11, 0), 30)).await,
            Err(CoreError::BookingDisabled)
        ));
    }

    #[tokio::test]
    async fn test_staff_is_assigned_from_availability() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);

        store
            .set_slots(vec![Slot {
                start_time: fx.at(15, 0),
                end_time: fx.at(15, 30),
                staff_ids: vec![fx.staff_id],
            }])
            .await;

        let mut req = request(&fx, fx.at(15, 0), 30);
        req.staff_id = None;
        let hold = holds.create_hold(&fx.tenant, req).await.unwrap();
        assert_eq!(hold.staff_id, fx.staff_id);

        let mut unavailable = request(&fx, fx.at(16, 0), 30);
        unavailable.staff_id = None;
        assert!(matches!(
            holds.create_hold(&fx.tenant, unavailable).await,
            Err(CoreError::SlotConflict { conflict: ConflictSource::ConfirmedAppointment, .. })
        ));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);
        let session = SessionToken::generate();

        let mut req = request(&fx, fx.at(12, 0), 30);
        req.session = Some(session.clone());
        let hold = holds.create_hold(&fx.tenant, req).await.unwrap();

        let released = holds.release_hold(&fx.tenant, Some(&session)).await.unwrap();
        assert_eq!(released.map(|h| h.id), Some(hold.id));
        assert!(holds.release_hold(&fx.tenant, Some(&session)).await.unwrap().is_none());
        assert!(matches!(
            holds.release_hold(&fx.tenant, None).await,
            Err(CoreError::HoldNotFound)
        ));
    }

    #[tokio::test]
    async fn test_current_hold_hides_expired() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = manager(&store, &clock);
        let session = SessionToken::generate();

        let mut req = request(&fx, fx.at(12, 0), 30);
        req.session = Some(session.clone());
        let hold = holds.create_hold(&fx.tenant, req).await.unwrap();
        assert_eq!(holds.current_hold(&fx.tenant, Some(&session)).await.unwrap().id, hold.id);

        clock.advance(Duration::minutes(10));
        assert!(matches!(
            holds.current_hold(&fx.tenant, Some(&session)).await,
            Err(CoreError::HoldNotFound)
        ));
        assert!(store.hold(hold.id).await.is_none());
    }

    /// Hands control back to the runtime before every call, the way a
    /// network round trip would.
    struct RoundTripHolds(Arc<InMemoryStore>);

    #[async_trait::async_trait]
    impl HoldRepository for RoundTripHolds {
        async fn insert_hold(&self, hold: &Hold) -> StoreResult<()> {
            tokio::task::yield_now().await;
            self.0.insert_hold(hold).await
        }

        async fn replace_session_hold(&self, hold: &Hold) -> StoreResult<bool> {
            tokio::task::yield_now().await;
            self.0.replace_session_hold(hold).await
        }

        async fn find_hold(&self, tenant_id: Uuid, hold_id: Uuid) -> StoreResult<Option<Hold>> {
            tokio::task::yield_now().await;
            self.0.find_hold(tenant_id, hold_id).await
        }

        async fn find_session_hold(
            &self,
            tenant_id: Uuid,
            session: &SessionToken,
        ) -> StoreResult<Option<Hold>> {
            tokio::task::yield_now().await;
            self.0.find_session_hold(tenant_id, session).await
        }

        async fn find_live_overlapping(
            &self,
            tenant_id: Uuid,
            staff_id: Uuid,
            range: &TimeRange,
            now: DateTime<Utc>,
        ) -> StoreResult<Vec<Hold>> {
            tokio::task::yield_now().await;
            self.0.find_live_overlapping(tenant_id, staff_id, range, now).await
        }

        async fn delete_hold(&self, tenant_id: Uuid, hold_id: Uuid) -> StoreResult<bool> {
            tokio::task::yield_now().await;
            self.0.delete_hold(tenant_id, hold_id).await
        }

        async fn delete_session_holds(&self, tenant_id: Uuid, session: &SessionToken) -> StoreResult<u64> {
            tokio::task::yield_now().await;
            self.0.delete_session_holds(tenant_id, session).await
        }
    }

    #[tokio::test]
    async fn test_double_submit_leaves_one_hold_per_session() {
        let (store, fx) = InMemoryStore::with_fixture().await;
        let clock = Arc::new(ManualClock::new(fx.now));
        let holds = HoldManager::new(
            Arc::new(RoundTripHolds(store.clone())),
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
            HoldPolicy::default(),
        );
        let session = SessionToken::generate();

        let mut first = request(&fx, fx.at(14, 0), 30);
        first.session = Some(session.clone());
        let mut second = request(&fx, fx.at(14, 0), 30);
        second.session = Some(session.clone());

        let (a, b) = tokio::join!(
            holds.create_hold(&fx.tenant, first),
            holds.create_hold(&fx.tenant, second)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(store.session_hold_count(fx.tenant.id, &session).await, 1);
        let kept = holds.current_hold(&fx.tenant, Some(&session)).await.unwrap();
        assert!(kept.id == a.id || kept.id == b.id);
    }
}

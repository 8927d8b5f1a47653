use async_trait::async_trait;
use chrono::{DateTime, Utc};
use salon_core::hold::Hold;
use salon_core::repository::{HoldRepository, StoreResult};
use salon_core::session::SessionToken;
use salon_core::time::TimeRange;
use sqlx::{Pool, Postgres};
use tracing::warn;
use uuid::Uuid;

use crate::conflict::translate;

const HOLD_COLUMNS: &str = "id, tenant_id, staff_id, service_ids, start_time, duration_minutes, \
                            session_id, customer_id, created_at, expires_at";

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    tenant_id: Uuid,
    staff_id: Uuid,
    service_ids: Vec<Uuid>,
    start_time: DateTime<Utc>,
    duration_minutes: i32,
    session_id: Option<String>,
    customer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<HoldRow> for Hold {
    fn from(row: HoldRow) -> Self {
        let session = row.session_id.as_deref().and_then(|raw| {
            let parsed = SessionToken::parse(raw);
            if parsed.is_none() {
                warn!("hold {} carries an unparseable session id", row.id);
            }
            parsed
        });
        Hold {
            id: row.id,
            tenant_id: row.tenant_id,
            staff_id: row.staff_id,
            service_ids: row.service_ids,
            start_time: row.start_time,
            duration_minutes: i64::from(row.duration_minutes),
            session,
            customer_id: row.customer_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// `appointment_holds` table. Rows are never swept; expiry is a comparison.
#[derive(Clone)]
pub struct StoreHoldRepository {
    pool: Pool<Postgres>,
}

impl StoreHoldRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HoldRepository for StoreHoldRepository {
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO appointment_holds \
             (id, tenant_id, staff_id, service_ids, start_time, duration_minutes, session_id, customer_id, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(hold.id)
        .bind(hold.tenant_id)
        .bind(hold.staff_id)
        .bind(&hold.service_ids)
        .bind(hold.start_time)
        .bind(hold.duration_minutes as i32)
        .bind(hold.session.as_ref().map(|s| s.as_str()))
        .bind(hold.customer_id)
        .bind(hold.created_at)
        .bind(hold.expires_at)
        .execute(&self.pool)
        .await
        .map_err(translate)?;
        Ok(())
    }

    async fn replace_session_hold(&self, hold: &Hold) -> StoreResult<bool> {
        // xmax is non-zero only on the row version written by DO UPDATE
        let replaced = sqlx::query_scalar::<_, bool>(
            "INSERT INTO appointment_holds \
             (id, tenant_id, staff_id, service_ids, start_time, duration_minutes, session_id, customer_id, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (tenant_id, session_id) WHERE session_id IS NOT NULL DO UPDATE SET \
               id = EXCLUDED.id, staff_id = EXCLUDED.staff_id, service_ids = EXCLUDED.service_ids, \
               start_time = EXCLUDED.start_time, duration_minutes = EXCLUDED.duration_minutes, \
               customer_id = EXCLUDED.customer_id, created_at = EXCLUDED.created_at, \
               expires_at = EXCLUDED.expires_at \
             RETURNING (xmax <> 0)",
        )
        .bind(hold.id)
        .bind(hold.tenant_id)
        .bind(hold.staff_id)
        .bind(&hold.service_ids)
        .bind(hold.start_time)
        .bind(hold.duration_minutes as i32)
        .bind(hold.session.as_ref().map(|s| s.as_str()))
        .bind(hold.customer_id)
        .bind(hold.created_at)
        .bind(hold.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(translate)?;
        Ok(replaced)
    }

    async fn find_hold(&self, tenant_id: Uuid, hold_id: Uuid) -> StoreResult<Option<Hold>> {
        let row = sqlx::query_as::<_, HoldRow>(&format!(
            "SELECT {HOLD_COLUMNS} FROM appointment_holds WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(hold_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(translate)?;
        Ok(row.map(Hold::from))
    }

    async fn find_session_hold(&self, tenant_id: Uuid, session: &SessionToken) -> StoreResult<Option<Hold>> {
        let row = sqlx::query_as::<_, HoldRow>(&format!(
            "SELECT {HOLD_COLUMNS} FROM appointment_holds \
             WHERE tenant_id = $1 AND session_id = $2 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(tenant_id)
        .bind(session.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(translate)?;
        Ok(row.map(Hold::from))
    }

    async fn find_live_overlapping(
        &self,
        tenant_id: Uuid,
        staff_id: Uuid,
        range: &TimeRange,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Hold>> {
        let rows = sqlx::query_as::<_, HoldRow>(&format!(
            "SELECT {HOLD_COLUMNS} FROM appointment_holds \
             WHERE tenant_id = $1 AND staff_id = $2 AND expires_at > $5 \
               AND tstzrange(start_time, start_time + make_interval(mins => duration_minutes), '[)') \
                   && tstzrange($3, $4, '[)')"
        ))
        .bind(tenant_id)
        .bind(staff_id)
        .bind(range.start)
        .bind(range.end)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(translate)?;
        Ok(rows.into_iter().map(Hold::from).collect())
    }

    async fn delete_hold(&self, tenant_id: Uuid, hold_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM appointment_holds WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(hold_id)
            .execute(&self.pool)
            .await
            .map_err(translate)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_session_holds(&self, tenant_id: Uuid, session: &SessionToken) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM appointment_holds WHERE tenant_id = $1 AND session_id = $2")
            .bind(tenant_id)
            .bind(session.as_str())
            .execute(&self.pool)
            .await
            .map_err(translate)?;
        Ok(result.rows_affected())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use salon_core::booking::{Appointment, AppointmentSource, AppointmentStatus, NewAppointment};
use salon_core::repository::{AppointmentRepository, StoreError, StoreResult};
use salon_core::time::TimeRange;
use sqlx::{Pool, Postgres};
use tracing::info;
use uuid::Uuid;

use crate::conflict::translate;

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    id: Uuid,
    tenant_id: Uuid,
    customer_id: Uuid,
    staff_id: Uuid,
    service_ids: Vec<Uuid>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    source: String,
    notes: Option<String>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status: AppointmentStatus = row.status.parse().map_err(|e| StoreError::Backend(format!("{e}")))?;
        let source: AppointmentSource = row.source.parse().map_err(|e| StoreError::Backend(format!("{e}")))?;
        Ok(Appointment {
            id: row.id,
            tenant_id: row.tenant_id,
            customer_id: row.customer_id,
            staff_id: row.staff_id,
            service_ids: row.service_ids,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            source,
            notes: row.notes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CreatedRow {
    appointment_id: Uuid,
    end_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct StoreAppointmentRepository {
    pool: Pool<Postgres>,
}

impl StoreAppointmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppointmentRepository for StoreAppointmentRepository {
    async fn find_active_overlapping(
        &self,
        tenant_id: Uuid,
        staff_id: Uuid,
        range: &TimeRange,
    ) -> StoreResult<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, AppointmentRow>(
            "SELECT a.id, a.tenant_id, a.customer_id, a.staff_id, \
                    ARRAY(SELECT s.service_id FROM appointment_services s \
                          WHERE s.appointment_id = a.id ORDER BY s.position) AS service_ids, \
                    a.start_time, a.end_time, a.status, a.source, a.notes \
             FROM appointments a \
             WHERE a.tenant_id = $1 AND a.staff_id = $2 \
               AND a.status IN ('confirmed', 'requested') \
               AND tstzrange(a.start_time, a.end_time, '[)') && tstzrange($3, $4, '[)')",
        )
        .bind(tenant_id)
        .bind(staff_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(translate)?;

        rows.into_iter().map(Appointment::try_from).collect()
    }

    async fn insert_appointment(&self, appointment: &NewAppointment) -> StoreResult<Appointment> {
        let mut tx = self.pool.begin().await.map_err(translate)?;

        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO appointments \
             (tenant_id, customer_id, staff_id, start_time, end_time, status, source, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(appointment.tenant_id)
        .bind(appointment.customer_id)
        .bind(appointment.staff_id)
        .bind(appointment.start_time)
        .bind(appointment.end_time)
        .bind(appointment.status.to_string())
        .bind(appointment.source.to_string())
        .bind(&appointment.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(translate)?;

        for (position, service_id) in appointment.service_ids.iter().enumerate() {
            sqlx::query("INSERT INTO appointment_services (appointment_id, service_id, position) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(service_id)
                .bind(position as i32)
                .execute(&mut *tx)
                .await
                .map_err(translate)?;
        }

        tx.commit().await.map_err(translate)?;
        info!("Appointment {} inserted for staff {}", id, appointment.staff_id);

        Ok(stored(id, appointment, appointment.end_time))
    }

    async fn insert_multi_service_appointment(&self, appointment: &NewAppointment) -> StoreResult<Appointment> {
        let created = sqlx::query_as::<_, CreatedRow>(
            "SELECT appointment_id, end_time FROM create_appointment_multi($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(appointment.tenant_id)
        .bind(appointment.customer_id)
        .bind(appointment.staff_id)
        .bind(&appointment.service_ids)
        .bind(appointment.start_time)
        .bind(appointment.status.to_string())
        .bind(appointment.source.to_string())
        .bind(&appointment.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(translate)?;

        info!(
            "Multi-service appointment {} inserted with {} services",
            created.appointment_id,
            appointment.service_ids.len()
        );
        Ok(stored(created.appointment_id, appointment, created.end_time))
    }
}

fn stored(id: Uuid, appointment: &NewAppointment, end_time: DateTime<Utc>) -> Appointment {
    Appointment {
        id,
        tenant_id: appointment.tenant_id,
        customer_id: appointment.customer_id,
        staff_id: appointment.staff_id,
        service_ids: appointment.service_ids.clone(),
        start_time: appointment.start_time,
        end_time,
        status: appointment.status,
        source: appointment.source,
        notes: appointment.notes.clone(),
    }
}

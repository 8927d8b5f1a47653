use async_trait::async_trait;
use salon_core::repository::{ServiceCatalog, StoreResult};
use salon_core::tenant::SalonService;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::conflict::translate;

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    duration_minutes: i32,
    price_cents: i64,
    is_active: bool,
}

#[derive(Clone)]
pub struct StoreServiceCatalog {
    pool: Pool<Postgres>,
}

impl StoreServiceCatalog {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceCatalog for StoreServiceCatalog {
    async fn find_services(&self, tenant_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<SalonService>> {
        let rows = sqlx::query_as::<_, ServiceRow>(
            "SELECT id, tenant_id, name, duration_minutes, price_cents, is_active \
             FROM services WHERE tenant_id = $1 AND id = ANY($2)",
        )
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(translate)?;

        Ok(rows
            .into_iter()
            .map(|r| SalonService {
                id: r.id,
                tenant_id: r.tenant_id,
                name: r.name,
                duration_minutes: i64::from(r.duration_minutes),
                price_cents: r.price_cents,
                is_active: r.is_active,
            })
            .collect())
    }
}

use async_trait::async_trait;
use salon_core::repository::{StoreResult, TenantRepository};
use salon_core::tenant::Tenant;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::conflict::translate;

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    slug: String,
    name: String,
    has_access: bool,
    auto_confirm: bool,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            slug: row.slug,
            name: row.name,
            booking_enabled: row.has_access,
            auto_confirm: row.auto_confirm,
        }
    }
}

const SELECT_TENANT: &str = "SELECT id, slug, name, tenant_has_access(id) AS has_access, auto_confirm FROM tenants";

#[derive(Clone)]
pub struct StoreTenantRepository {
    pool: Pool<Postgres>,
}

impl StoreTenantRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for StoreTenantRepository {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!("{SELECT_TENANT} WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(translate)?;
        Ok(row.map(Tenant::from))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!("{SELECT_TENANT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(translate)?;
        Ok(row.map(Tenant::from))
    }
}

use async_trait::async_trait;
use salon_core::customer::NewCustomer;
use salon_core::repository::{CustomerRepository, StoreResult};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::conflict::translate;

#[derive(Clone)]
pub struct StoreCustomerRepository {
    pool: Pool<Postgres>,
}

impl StoreCustomerRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for StoreCustomerRepository {
    async fn upsert_customer(&self, customer: &NewCustomer) -> StoreResult<Uuid> {
        // One statement, so two first-time bookings with the same email
        // cannot both insert.
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO customers \
             (tenant_id, first_name, last_name, email, phone, marketing_consent, status, source) \
             VALUES ($1, $2, $3, $4, $5, $6, 'active', 'online') \
             ON CONFLICT (tenant_id, email) DO UPDATE SET \
               first_name = EXCLUDED.first_name, \
               last_name = EXCLUDED.last_name, \
               phone = EXCLUDED.phone, \
               marketing_consent = EXCLUDED.marketing_consent, \
               updated_at = now() \
             RETURNING id",
        )
        .bind(customer.tenant_id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.marketing_consent)
        .fetch_one(&self.pool)
        .await
        .map_err(translate)?;

        Ok(id)
    }
}

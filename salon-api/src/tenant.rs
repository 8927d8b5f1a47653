use std::collections::HashMap;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use salon_core::tenant::Tenant;
use salon_core::CoreError;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const TENANT_PATH_PARAM: &str = "tenant_slug";

/// Resolves the tenant from the `{tenant_slug}` path segment on public
/// routes, or the `x-tenant-id` header on site routes.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Tenant);

impl FromRequestParts<AppState> for CurrentTenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .ok()
            .and_then(|Path(mut params)| params.remove(TENANT_PATH_PARAM));

        let tenant = match slug {
            Some(slug) => state.tenants.find_by_slug(&slug).await?,
            None => {
                let raw = parts
                    .headers
                    .get(TENANT_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| AppError::BadRequest(format!("missing {} header", TENANT_HEADER)))?;
                let id = Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::BadRequest(format!("invalid {} header", TENANT_HEADER)))?;
                state.tenants.find_by_id(id).await?
            }
        };

        tenant.map(CurrentTenant).ok_or(AppError::Core(CoreError::TenantNotFound))
    }
}

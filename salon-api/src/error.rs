use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use salon_core::repository::StoreError;
use salon_core::{ConflictSource, CoreError};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Missing or invalid credentials")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Core(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(err) => match err {
                CoreError::ValidationError(_) | CoreError::TermsNotAccepted => StatusCode::BAD_REQUEST,
                CoreError::TenantNotFound | CoreError::HoldNotFound => StatusCode::NOT_FOUND,
                CoreError::BookingDisabled => StatusCode::FORBIDDEN,
                CoreError::HoldExpired => StatusCode::GONE,
                CoreError::SlotConflict { .. } => StatusCode::CONFLICT,
                CoreError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metrics label.
    pub fn outcome(&self) -> &'static str {
        match self {
            AppError::Core(CoreError::ValidationError(_)) | AppError::BadRequest(_) => "invalid",
            AppError::Core(CoreError::TermsNotAccepted) => "terms_not_accepted",
            AppError::Core(CoreError::TenantNotFound) => "tenant_not_found",
            AppError::Core(CoreError::BookingDisabled) => "booking_disabled",
            AppError::Core(CoreError::HoldNotFound) => "hold_not_found",
            AppError::Core(CoreError::HoldExpired) => "hold_expired",
            AppError::Core(CoreError::SlotConflict { conflict: ConflictSource::HeldByOther, .. }) => "held_by_other",
            AppError::Core(CoreError::SlotConflict { .. }) => "conflict",
            AppError::Unauthorized | AppError::Forbidden => "unauthorized",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Core(CoreError::InternalError(_)) | AppError::Anyhow(_) => "error",
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::Core(CoreError::SlotConflict { retry_after, .. }) => *retry_after,
            AppError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self.retry_after();

        let (message, details): (String, Option<Value>) = match &self {
            AppError::Core(CoreError::ValidationError(msg)) => ("Validation failed".to_string(), Some(json!(msg))),
            AppError::Core(CoreError::SlotConflict { conflict, .. }) => {
                ("Slot no longer available".to_string(), Some(json!(conflict)))
            }
            AppError::Core(CoreError::InternalError(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                ("Internal Server Error".to_string(), None)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                ("Internal Server Error".to_string(), None)
            }
            AppError::BadRequest(msg) => ("Invalid request".to_string(), Some(json!(msg))),
            other => (other.to_string(), None),
        };

        let mut body = json!({ "error": message });
        if let Some(details) = details {
            body["details"] = details;
        }
        if let Some(seconds) = retry_after {
            body["retry_after"] = json!(seconds);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_held_by_other_carries_retry_after() {
        let err = AppError::Core(CoreError::SlotConflict {
            conflict: ConflictSource::HeldByOther,
            retry_after: Some(600),
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[header::RETRY_AFTER], "600");
        let body = body_json(response).await;
        assert_eq!(body["details"], "held_by_other");
        assert_eq!(body["retry_after"], 600);
    }

    #[tokio::test]
    async fn test_store_conflict_maps_to_409_without_hint() {
        let err: AppError = StoreError::Conflict("exclusion".into()).into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
        let body = body_json(response).await;
        assert_eq!(body["details"], "confirmed_appointment");
        assert!(body.get("retry_after").is_none());
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let err: AppError = StoreError::Backend("password authentication failed".into()).into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal Server Error");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Core(CoreError::TermsNotAccepted).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Core(CoreError::HoldExpired).status(), StatusCode::GONE);
        assert_eq!(AppError::Core(CoreError::BookingDisabled).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Core(CoreError::TenantNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::RateLimited { retry_after: 60 }.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

impl CustomerClaims {
    pub fn customer_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Signed-in customer, when an `Authorization: Bearer` token is present.
/// Anonymous requests pass through; a bad token is rejected.
#[derive(Debug, Clone)]
pub struct OptionalCustomer(pub Option<CustomerClaims>);

impl OptionalCustomer {
    pub fn customer_id(&self) -> Option<Uuid> {
        self.0.as_ref().and_then(CustomerClaims::customer_id)
    }
}

impl FromRequestParts<AppState> for OptionalCustomer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get("Authorization") else {
            return Ok(Self(None));
        };
        let token = auth_header
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let claims = decode_customer(token, &state.auth.secret)?;
        Ok(Self(Some(claims)))
    }
}

pub fn decode_customer(token: &str, secret: &str) -> Result<CustomerClaims, AppError> {
    let token_data = decode::<CustomerClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    if token_data.claims.role != "CUSTOMER" {
        return Err(AppError::Forbidden);
    }
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(role: &str, secret: &str) -> String {
        let claims = CustomerClaims {
            sub: Uuid::new_v4().to_string(),
            email: "jane@example.com".into(),
            role: role.into(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_customer_token_decodes() {
        let claims = decode_customer(&token("CUSTOMER", "s3cret"), "s3cret").unwrap();
        assert!(claims.customer_id().is_some());
    }

    #[test]
    fn test_wrong_secret_or_role_is_rejected() {
        assert!(matches!(decode_customer(&token("CUSTOMER", "other"), "s3cret"), Err(AppError::Unauthorized)));
        assert!(matches!(decode_customer(&token("ADMIN", "s3cret"), "s3cret"), Err(AppError::Forbidden)));
    }
}

use salon_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Contact details submitted with a booking.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub marketing_consent: bool,
}

impl CustomerDetails {
    /// Local checks only; never touches the store.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ValidationError("name is required".into()));
        }
        let email = self.email.inner().trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(CoreError::ValidationError("email is invalid".into())),
        }
        if self.phone.inner().trim().is_empty() {
            return Err(CoreError::ValidationError("phone is required".into()));
        }
        Ok(())
    }

    pub fn to_new_customer(&self, tenant_id: Uuid) -> NewCustomer {
        let (first_name, last_name) = split_name(&self.name);
        NewCustomer {
            tenant_id,
            first_name,
            last_name,
            email: normalize_email(self.email.inner()),
            phone: self.phone.inner().trim().to_string(),
            marketing_consent: self.marketing_consent,
        }
    }
}

/// Row to upsert keyed by `(tenant_id, email)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub marketing_consent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub marketing_consent: bool,
    pub status: String,
    pub source: String,
}

/// First whitespace-separated token is the first name, the rest is the last
/// name. "Madonna" yields an empty last name.
pub fn split_name(full_name: &str) -> (String, String) {
    let trimmed = full_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

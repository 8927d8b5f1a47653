//! The single place where database failures are classified for the domain.

use salon_core::repository::StoreError;
use tracing::error;

/// `exclusion_violation`, raised by the appointments range constraint.
pub const EXCLUSION_VIOLATION: &str = "23P01";
/// `unique_violation`
pub const UNIQUE_VIOLATION: &str = "23505";

/// True when a database error means "that slot is already taken".
///
/// Unique violations only count when they hit the appointments table; a
/// duplicate customer email is not a slot conflict. Stored procedures raise
/// their own messages, so overlap wording is accepted without a code.
pub fn is_overlap_violation(code: Option<&str>, constraint: Option<&str>, message: &str) -> bool {
    let on_appointments = constraint.is_some_and(|c| c.starts_with("appointments"));
    match code {
        Some(EXCLUSION_VIOLATION) => true,
        Some(UNIQUE_VIOLATION) => on_appointments,
        _ => {
            let lower = message.to_ascii_lowercase();
            lower.contains("overlap") || (lower.contains("range") && lower.contains("conflict"))
        }
    }
}

pub fn translate(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let code = db.code();
        if is_overlap_violation(code.as_deref(), db.constraint(), db.message()) {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    error!("database error: {}", err);
    StoreError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_violation_is_conflict() {
        assert!(is_overlap_violation(
            Some("23P01"),
            Some("appointments_no_overlap"),
            "conflicting key value violates exclusion constraint"
        ));
    }

    #[test]
    fn test_unique_violation_only_on_appointments() {
        assert!(is_overlap_violation(Some("23505"), Some("appointments_staff_start_key"), "duplicate key"));
        assert!(!is_overlap_violation(Some("23505"), Some("customers_tenant_id_email_key"), "duplicate key"));
        assert!(!is_overlap_violation(Some("23505"), None, "duplicate key"));
    }

    #[test]
    fn test_procedure_wording_is_conflict() {
        assert!(is_overlap_violation(Some("P0001"), None, "Requested time overlaps an existing appointment"));
        assert!(is_overlap_violation(None, None, "time range conflict for staff"));
    }

    #[test]
    fn test_other_errors_are_backend() {
        assert!(!is_overlap_violation(Some("23503"), Some("appointments_customer_id_fkey"), "foreign key"));
        assert!(!is_overlap_violation(None, None, "connection reset by peer"));
        assert!(!is_overlap_violation(Some("22P02"), None, "invalid input syntax for type uuid"));
    }

    #[test]
    fn test_pool_errors_translate_to_backend() {
        assert!(matches!(translate(sqlx::Error::PoolTimedOut), StoreError::Backend(_)));
        assert!(matches!(translate(sqlx::Error::RowNotFound), StoreError::Backend(_)));
    }
}

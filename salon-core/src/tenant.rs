use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    /// Outcome of the subscription/access check. Tenants without access keep
    /// their public pages but cannot take online bookings.
    pub booking_enabled: bool,
    /// Direct bookings land as `confirmed` when set, `requested` otherwise.
    pub auto_confirm: bool,
}

impl Tenant {
    pub fn ensure_bookable(&self) -> crate::CoreResult<()> {
        if self.booking_enabled {
            Ok(())
        } else {
            Err(crate::CoreError::BookingDisabled)
        }
    }
}

/// A bookable salon service (cut, colour, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalonService {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub is_active: bool,
}

/// Sum of durations, in the order given. Unknown ids are skipped; callers
/// validate membership first.
pub fn total_duration_minutes(services: &[SalonService], ids: &[Uuid]) -> i64 {
    ids.iter()
        .filter_map(|id| services.iter().find(|s| s.id == *id))
        .map(|s| s.duration_minutes)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(minutes: i64) -> SalonService {
        SalonService {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: format!("{minutes} min"),
            duration_minutes: minutes,
            price_cents: 1000,
            is_active: true,
        }
    }

    #[test]
    fn test_total_duration_ignores_order() {
        let cut = service(30);
        let colour = service(90);
        let catalog = vec![cut.clone(), colour.clone()];

        assert_eq!(total_duration_minutes(&catalog, &[cut.id, colour.id]), 120);
        assert_eq!(total_duration_minutes(&catalog, &[colour.id, cut.id]), 120);
        assert_eq!(total_duration_minutes(&catalog, &[Uuid::new_v4()]), 0);
    }

    #[test]
    fn test_disabled_tenant_is_not_bookable() {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: "studio-noir".into(),
            name: "Studio Noir".into(),
            booking_enabled: false,
            auto_confirm: true,
        };
        assert!(matches!(
            tenant.ensure_bookable(),
            Err(crate::CoreError::BookingDisabled)
        ));
    }
}

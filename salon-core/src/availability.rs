use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input to the store's slot computation (`get_available_slots_multi`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotQuery {
    pub tenant_id: Uuid,
    pub service_ids: Vec<Uuid>,
    pub date: NaiveDate,
    pub staff_id: Option<Uuid>,
}

/// A candidate start time and the staff members free for the whole duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub staff_ids: Vec<Uuid>,
}

/// First staff member offered for a slot starting exactly at `start`.
pub fn pick_staff(slots: &[Slot], start: DateTime<Utc>) -> Option<Uuid> {
    slots
        .iter()
        .filter(|s| s.start_time == start)
        .find_map(|s| s.staff_ids.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pick_staff_matches_exact_start() {
        let nine = Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap();
        let half_past = Utc.with_ymd_and_hms(2026, 5, 2, 9, 30, 0).unwrap();
        let anna = Uuid::new_v4();
        let ben = Uuid::new_v4();

        let slots = vec![
            Slot { start_time: nine, end_time: half_past, staff_ids: vec![] },
            Slot { start_time: nine, end_time: half_past, staff_ids: vec![anna, ben] },
            Slot { start_time: half_past, end_time: half_past + chrono::Duration::minutes(30), staff_ids: vec![ben] },
        ];

        assert_eq!(pick_staff(&slots, nine), Some(anna));
        assert_eq!(pick_staff(&slots, half_past), Some(ben));
        assert_eq!(pick_staff(&slots, half_past + chrono::Duration::minutes(15)), None);
    }
}

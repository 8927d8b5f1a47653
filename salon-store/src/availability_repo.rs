use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use salon_core::availability::{Slot, SlotQuery};
use salon_core::repository::{AvailabilityResolver, StoreResult};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::conflict::translate;

#[derive(sqlx::FromRow)]
struct SlotRow {
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
    staff_id: Uuid,
}

/// Delegates to the `get_available_slots_multi` procedure, which returns one
/// row per (slot, free staff member).
#[derive(Clone)]
pub struct StoreAvailabilityResolver {
    pool: Pool<Postgres>,
}

impl StoreAvailabilityResolver {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AvailabilityResolver for StoreAvailabilityResolver {
    async fn available_slots(&self, query: &SlotQuery) -> StoreResult<Vec<Slot>> {
        let rows = sqlx::query_as::<_, SlotRow>(
            "SELECT slot_start, slot_end, staff_id FROM get_available_slots_multi($1, $2, $3, $4)",
        )
        .bind(query.tenant_id)
        .bind(&query.service_ids)
        .bind(query.date)
        .bind(query.staff_id)
        .fetch_all(&self.pool)
        .await
        .map_err(translate)?;

        Ok(group_slots(rows.into_iter().map(|r| (r.slot_start, r.slot_end, r.staff_id))))
    }
}

fn group_slots(rows: impl IntoIterator<Item = (DateTime<Utc>, DateTime<Utc>, Uuid)>) -> Vec<Slot> {
    let mut grouped: BTreeMap<(DateTime<Utc>, DateTime<Utc>), Vec<Uuid>> = BTreeMap::new();
    for (start, end, staff) in rows {
        let staff_ids = grouped.entry((start, end)).or_default();
        if !staff_ids.contains(&staff) {
            staff_ids.push(staff);
        }
    }
    grouped
        .into_iter()
        .map(|((start_time, end_time), staff_ids)| Slot { start_time, end_time, staff_ids })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rows_are_grouped_per_slot_in_time_order() {
        let nine = Utc.with_ymd_and_hms(2030, 6, 1, 9, 0, 0).unwrap();
        let half = Utc.with_ymd_and_hms(2030, 6, 1, 9, 30, 0).unwrap();
        let ten = Utc.with_ymd_and_hms(2030, 6, 1, 10, 0, 0).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let slots = group_slots(vec![(half, ten, a), (nine, half, a), (nine, half, b), (nine, half, b)]);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start_time, nine);
        assert_eq!(slots[0].staff_ids, vec![a, b]);
        assert_eq!(slots[1].staff_ids, vec![a]);
    }
}

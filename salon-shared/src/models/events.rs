use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slot lifecycle notifications. Published to Kafka and fanned out to the
/// per-tenant SSE stream so open booking widgets can refresh availability.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotEvent {
    HoldPlaced(HoldPlacedEvent),
    HoldReleased(HoldReleasedEvent),
    AppointmentConfirmed(AppointmentConfirmedEvent),
}

impl SlotEvent {
    pub fn tenant_id(&self) -> Uuid {
        match self {
            SlotEvent::HoldPlaced(e) => e.tenant_id,
            SlotEvent::HoldReleased(e) => e.tenant_id,
            SlotEvent::AppointmentConfirmed(e) => e.tenant_id,
        }
    }

    /// Kafka topic the event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            SlotEvent::HoldPlaced(_) => "holds.created",
            SlotEvent::HoldReleased(_) => "holds.released",
            SlotEvent::AppointmentConfirmed(_) => "appointments.confirmed",
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            SlotEvent::HoldPlaced(_) => "hold_placed",
            SlotEvent::HoldReleased(_) => "hold_released",
            SlotEvent::AppointmentConfirmed(_) => "appointment_confirmed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HoldPlacedEvent {
    pub tenant_id: Uuid,
    pub hold_id: Uuid,
    pub staff_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HoldReleasedEvent {
    pub tenant_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub released_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppointmentConfirmedEvent {
    pub tenant_id: Uuid,
    pub appointment_id: Uuid,
    pub staff_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
}
